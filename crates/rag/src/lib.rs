//! RAG (Retrieval-Augmented Generation) with hybrid search
//!
//! Features:
//! - Dense vector search via Qdrant
//! - Sparse BM25 search via Tantivy
//! - Reciprocal Rank Fusion of the two ranked lists
//! - Grounded answer generation through an LLM backend
//! - Knowledge base chunking and ingestion into both indexes

pub mod answer;
pub mod embeddings;
pub mod knowledge_loader;
pub mod prompt;
pub mod rank_fusion;
pub mod retriever;
pub mod sparse_search;
pub mod vector_store;

pub use answer::{AnswerConfig, AnswerGenerator, DocumentStore};
pub use embeddings::{create_embedder, Embedder, GeminiEmbedder, OllamaEmbedder};
pub use knowledge_loader::{chunk_words, IngestReport, KnowledgeChunk, KnowledgeLoader};
pub use prompt::build_grounding_prompt;
pub use rank_fusion::reciprocal_rank_fusion;
pub use retriever::{
    DenseRetriever, DenseSearch, KeywordSearch, RetrievalConfig, RetrievalEngine,
    RetrievalResults,
};
pub use sparse_search::{SparseConfig, SparseIndex};
pub use vector_store::{VectorStore, VectorStoreConfig};

use thiserror::Error;
use voice_agent_llm::LlmError;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{stage} search timed out after {ms}ms")]
    Timeout { stage: &'static str, ms: u64 },

    /// Neither index produced a result list
    #[error("Retrieval unavailable: {0}")]
    Unavailable(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error(transparent)]
    Generation(#[from] LlmError),
}

impl From<RagError> for voice_agent_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Generation(e) => e.into(),
            other => voice_agent_core::Error::Retrieval(other.to_string()),
        }
    }
}
