//! Retrieval and answer types shared between the RAG stack and the pipeline

use serde::{Deserialize, Serialize};

/// Which index produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitOrigin {
    Dense,
    Sparse,
}

/// A single hit from one index.
///
/// Scores are origin-specific and must not be compared across origins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub doc_id: String,
    pub origin: HitOrigin,
    /// 1-based position within its origin's list
    pub rank: usize,
    pub score: f32,
}

/// Document ids ordered by descending fused score, with the scores kept for inspection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedRanking {
    pub entries: Vec<(String, f64)>,
}

impl FusedRanking {
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn score_of(&self, doc_id: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(id, _)| id == doc_id)
            .map(|(_, score)| *score)
    }

    /// Keep only the first `m` entries
    pub fn truncate(&mut self, m: usize) {
        self.entries.truncate(m);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one generation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub text: String,
    /// Ids supplied to the model as context, in fused order
    pub source_ids: Vec<String>,
}
