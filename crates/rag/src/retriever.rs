//! Hybrid Retriever
//!
//! Queries the dense and sparse indexes concurrently, each under its own
//! timeout, and returns whichever ranked lists come back.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use voice_agent_config::RagConfig;
use voice_agent_core::{FusedRanking, HitOrigin, RetrievalHit};

use crate::embeddings::Embedder;
use crate::rank_fusion::reciprocal_rank_fusion;
use crate::vector_store::VectorStore;
use crate::RagError;

/// Nearest-neighbour search over embedded documents.
/// Returns `(doc_id, similarity)` ordered best first.
#[async_trait]
pub trait DenseSearch: Send + Sync {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<(String, f32)>, RagError>;
}

/// Keyword search over the text index.
/// Returns `(doc_id, relevance)` ordered best first.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<(String, f32)>, RagError>;
}

/// Embeds the query, then searches the vector store
pub struct DenseRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
}

impl DenseRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl DenseSearch for DenseRetriever {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<(String, f32)>, RagError> {
        let embedding = self.embedder.embed_query(query).await?;
        self.store.search(&embedding, n).await
    }
}

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub dense_timeout: Duration,
    pub sparse_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

impl From<&RagConfig> for RetrievalConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            dense_timeout: Duration::from_millis(config.dense_timeout_ms),
            sparse_timeout: Duration::from_millis(config.sparse_timeout_ms),
        }
    }
}

/// Per-index ranked hit lists for one query
#[derive(Debug, Clone, Default)]
pub struct RetrievalResults {
    pub dense: Vec<RetrievalHit>,
    pub sparse: Vec<RetrievalHit>,
}

impl RetrievalResults {
    pub fn dense_ids(&self) -> Vec<&str> {
        self.dense.iter().map(|h| h.doc_id.as_str()).collect()
    }

    pub fn sparse_ids(&self) -> Vec<&str> {
        self.sparse.iter().map(|h| h.doc_id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty() && self.sparse.is_empty()
    }

    /// Reciprocal Rank Fusion over the two lists
    pub fn fuse(&self, k: f64) -> FusedRanking {
        reciprocal_rank_fusion(&self.dense_ids(), &self.sparse_ids(), k)
    }
}

/// Hybrid retrieval engine
pub struct RetrievalEngine {
    dense: Arc<dyn DenseSearch>,
    sparse: Arc<dyn KeywordSearch>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        dense: Arc<dyn DenseSearch>,
        sparse: Arc<dyn KeywordSearch>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            dense,
            sparse,
            config,
        }
    }

    /// Run both searches concurrently.
    ///
    /// A failed or timed-out index contributes an empty list; the call only
    /// fails when neither index answered.
    pub async fn retrieve(&self, query: &str, n: usize) -> Result<RetrievalResults, RagError> {
        let start = Instant::now();

        let (dense, sparse) = tokio::join!(
            bounded("dense", self.config.dense_timeout, self.dense.search(query, n)),
            bounded("sparse", self.config.sparse_timeout, self.sparse.search(query, n)),
        );

        let results = match (dense, sparse) {
            (Ok(dense), Ok(sparse)) => RetrievalResults {
                dense: to_hits(dense, HitOrigin::Dense, n),
                sparse: to_hits(sparse, HitOrigin::Sparse, n),
            },
            (Ok(dense), Err(e)) => {
                tracing::warn!(stage = "sparse", error = %e, "Sparse retrieval failed, using dense hits only");
                RetrievalResults {
                    dense: to_hits(dense, HitOrigin::Dense, n),
                    sparse: Vec::new(),
                }
            },
            (Err(e), Ok(sparse)) => {
                tracing::warn!(stage = "dense", error = %e, "Dense retrieval failed, using sparse hits only");
                RetrievalResults {
                    dense: Vec::new(),
                    sparse: to_hits(sparse, HitOrigin::Sparse, n),
                }
            },
            (Err(dense_err), Err(sparse_err)) => {
                return Err(RagError::Unavailable(format!(
                    "dense: {}; sparse: {}",
                    dense_err, sparse_err
                )));
            },
        };

        tracing::debug!(
            stage = "retrieval",
            dense = results.dense.len(),
            sparse = results.sparse.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Hybrid retrieval complete"
        );

        Ok(results)
    }
}

async fn bounded<F>(
    stage: &'static str,
    limit: Duration,
    search: F,
) -> Result<Vec<(String, f32)>, RagError>
where
    F: Future<Output = Result<Vec<(String, f32)>, RagError>>,
{
    match tokio::time::timeout(limit, search).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout {
            stage,
            ms: limit.as_millis() as u64,
        }),
    }
}

fn to_hits(raw: Vec<(String, f32)>, origin: HitOrigin, n: usize) -> Vec<RetrievalHit> {
    raw.into_iter()
        .take(n)
        .enumerate()
        .map(|(index, (doc_id, score))| RetrievalHit {
            doc_id,
            origin,
            rank: index + 1,
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl DenseSearch for Fixed {
        async fn search(&self, _query: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, id)| (id.to_string(), 1.0 - i as f32 * 0.1))
                .collect())
        }
    }

    #[async_trait]
    impl KeywordSearch for Fixed {
        async fn search(&self, _query: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, id)| (id.to_string(), 10.0 - i as f32))
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl KeywordSearch for Failing {
        async fn search(&self, _query: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
            Err(RagError::Search("index offline".to_string()))
        }
    }

    #[async_trait]
    impl DenseSearch for Failing {
        async fn search(&self, _query: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
            Err(RagError::Connection("qdrant unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ranks_are_one_based_and_truncated() {
        let engine = RetrievalEngine::new(
            Arc::new(Fixed(vec!["a", "b", "c"])),
            Arc::new(Fixed(vec!["c", "d"])),
            RetrievalConfig::default(),
        );

        let results = engine.retrieve("router", 2).await.unwrap();
        assert_eq!(results.dense_ids(), vec!["a", "b"]);
        assert_eq!(results.dense[0].rank, 1);
        assert_eq!(results.dense[1].rank, 2);
        assert_eq!(results.sparse[0].origin, HitOrigin::Sparse);
        assert_eq!(results.sparse_ids(), vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_one_failure_keeps_other_list() {
        let engine = RetrievalEngine::new(
            Arc::new(Fixed(vec!["d5"])),
            Arc::new(Failing),
            RetrievalConfig::default(),
        );

        let results = engine.retrieve("signal", 10).await.unwrap();
        assert_eq!(results.dense_ids(), vec!["d5"]);
        assert!(results.sparse.is_empty());
        assert_eq!(results.fuse(20.0).ids(), vec!["d5"]);
    }

    #[tokio::test]
    async fn test_both_failures_is_error() {
        let engine = RetrievalEngine::new(
            Arc::new(Failing),
            Arc::new(Failing),
            RetrievalConfig::default(),
        );

        let err = engine.retrieve("signal", 10).await.unwrap_err();
        assert!(matches!(err, RagError::Unavailable(_)));
    }
}
