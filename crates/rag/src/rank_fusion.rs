//! Reciprocal Rank Fusion
//!
//! A document at 1-based rank `r` in a list contributes `1 / (k + r)`;
//! contributions are summed across lists. Ties keep first-seen order,
//! with the dense list scanned before the sparse one.

use std::collections::HashMap;

use voice_agent_core::FusedRanking;

/// Merge the dense and sparse id lists into one ranking
pub fn reciprocal_rank_fusion<D, S>(dense: &[D], sparse: &[S], k: f64) -> FusedRanking
where
    D: AsRef<str>,
    S: AsRef<str>,
{
    let mut entries: Vec<(String, f64)> = Vec::with_capacity(dense.len() + sparse.len());
    let mut position: HashMap<String, usize> = HashMap::with_capacity(dense.len() + sparse.len());

    let ids = dense
        .iter()
        .map(|id| id.as_ref())
        .enumerate()
        .chain(sparse.iter().map(|id| id.as_ref()).enumerate());

    for (index, id) in ids {
        let contribution = 1.0 / (k + (index + 1) as f64);
        match position.get(id) {
            Some(&slot) => entries[slot].1 += contribution,
            None => {
                position.insert(id.to_string(), entries.len());
                entries.push((id.to_string(), contribution));
            },
        }
    }

    // sort_by is stable, so equal scores stay in first-seen order
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    FusedRanking { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn test_fuses_overlapping_lists() {
        let fused = reciprocal_rank_fusion(&["d1", "d2", "d3"], &["d2", "d4"], 20.0);
        assert_eq!(fused.ids(), vec!["d2", "d1", "d4", "d3"]);

        let d2 = fused.score_of("d2").unwrap();
        assert!((d2 - (1.0 / 22.0 + 1.0 / 21.0)).abs() < 1e-12);
    }

    #[test]
    fn test_single_list() {
        let fused = reciprocal_rank_fusion(&["d5"], NONE, 20.0);
        assert_eq!(fused.ids(), vec!["d5"]);

        let fused = reciprocal_rank_fusion(NONE, &["s1", "s2"], 60.0);
        assert_eq!(fused.ids(), vec!["s1", "s2"]);
    }

    #[test]
    fn test_empty_inputs() {
        let fused = reciprocal_rank_fusion(NONE, NONE, 20.0);
        assert!(fused.is_empty());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        // Same rank in different lists gives identical scores
        let fused = reciprocal_rank_fusion(&["a"], &["b"], 20.0);
        assert_eq!(fused.ids(), vec!["a", "b"]);

        let fused = reciprocal_rank_fusion(&["x", "y"], &["y", "x"], 20.0);
        assert_eq!(fused.ids(), vec!["x", "y"]);
    }

    #[test]
    fn test_presence_in_both_lists_scores_higher() {
        let both = reciprocal_rank_fusion(&["d"], &["d"], 20.0);
        let dense_only = reciprocal_rank_fusion(&["d"], NONE, 20.0);
        let sparse_only = reciprocal_rank_fusion(NONE, &["d"], 20.0);

        let both = both.score_of("d").unwrap();
        assert!(both > dense_only.score_of("d").unwrap());
        assert!(both > sparse_only.score_of("d").unwrap());

        // Same positions elsewhere, only the overlap differs
        let overlap = reciprocal_rank_fusion(&["a", "d"], &["b", "d"], 20.0);
        let apart = reciprocal_rank_fusion(&["a", "d"], &["b", "c"], 20.0);
        assert!(overlap.score_of("d").unwrap() > apart.score_of("d").unwrap());
    }

    #[test]
    fn test_earlier_rank_scores_higher() {
        let later = reciprocal_rank_fusion(&["a", "b", "doc"], NONE, 20.0);
        let earlier = reciprocal_rank_fusion(&["a", "doc", "b"], NONE, 20.0);
        assert!(earlier.score_of("doc").unwrap() > later.score_of("doc").unwrap());
    }

    #[test]
    fn test_deterministic() {
        let dense = ["d3", "d1", "d7", "d2"];
        let sparse = ["d7", "d9", "d3"];
        let first = reciprocal_rank_fusion(&dense, &sparse, 20.0);
        for _ in 0..10 {
            assert_eq!(reciprocal_rank_fusion(&dense, &sparse, 20.0), first);
        }
    }

    #[test]
    fn test_smaller_k_sharpens_top_rank() {
        // With small k the dense top hit beats a document present in both lists at rank 3
        let dense = ["top", "x", "both"];
        let sparse = ["y", "z", "both"];
        assert_eq!(reciprocal_rank_fusion(&dense, &sparse, 0.5).ids()[0], "top");
        assert_eq!(reciprocal_rank_fusion(&dense, &sparse, 60.0).ids()[0], "both");
    }
}
