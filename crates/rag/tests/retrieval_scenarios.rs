//! End-to-end retrieval and answering against in-memory indexes

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use voice_agent_core::Responder;
use voice_agent_llm::{FinishReason, GenerationResult, LlmBackend, LlmError, Message};
use voice_agent_rag::{
    reciprocal_rank_fusion, AnswerConfig, AnswerGenerator, DenseSearch, KeywordSearch,
    KnowledgeChunk, RagError, RetrievalConfig, RetrievalEngine, SparseIndex,
};

struct StaticDense(Vec<&'static str>);

#[async_trait]
impl DenseSearch for StaticDense {
    async fn search(&self, _query: &str, n: usize) -> Result<Vec<(String, f32)>, RagError> {
        Ok(self
            .0
            .iter()
            .take(n)
            .map(|id| (id.to_string(), 0.9))
            .collect())
    }
}

struct StalledSparse;

#[async_trait]
impl KeywordSearch for StalledSparse {
    async fn search(&self, _query: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![("late".to_string(), 1.0)])
    }
}

struct EchoContextLlm {
    prompts: Mutex<Vec<String>>,
    reply: &'static str,
}

#[async_trait]
impl LlmBackend for EchoContextLlm {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.prompts.lock().push(messages[0].content.clone());
        Ok(GenerationResult {
            text: self.reply.to_string(),
            tokens: 1,
            total_time_ms: 1,
            finish_reason: FinishReason::Stop,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

fn chunk(id: &str, content: &str) -> KnowledgeChunk {
    KnowledgeChunk {
        id: id.to_string(),
        content: content.to_string(),
        source: format!("{}.txt", id),
    }
}

fn fast_timeouts() -> RetrievalConfig {
    RetrievalConfig {
        dense_timeout: Duration::from_millis(200),
        sparse_timeout: Duration::from_millis(50),
    }
}

#[test]
fn fusion_of_overlapping_lists() {
    let fused = reciprocal_rank_fusion(&["d1", "d2", "d3"], &["d2", "d4"], 20.0);
    assert_eq!(fused.ids(), vec!["d2", "d1", "d4", "d3"]);
}

#[tokio::test]
async fn sparse_timeout_keeps_dense_hits() {
    let sparse_docs = SparseIndex::in_memory().unwrap();
    sparse_docs
        .index_documents(&[chunk("d5", "Toggle airplane mode to reconnect to the network")])
        .unwrap();

    let llm = Arc::new(EchoContextLlm {
        prompts: Mutex::new(Vec::new()),
        reply: "Try toggling airplane mode.",
    });

    let generator = AnswerGenerator::new(
        RetrievalEngine::new(
            Arc::new(StaticDense(vec!["d5"])),
            Arc::new(StalledSparse),
            fast_timeouts(),
        ),
        Arc::new(sparse_docs),
        llm.clone(),
        AnswerConfig::default(),
    );

    let ids = generator.context_ids("no signal").await;
    assert_eq!(ids, vec!["d5"]);

    let answer = generator.respond("no signal", &[]).await.unwrap();
    assert_eq!(answer.source_ids, vec!["d5"]);
    assert!(llm.prompts.lock()[0].contains("Toggle airplane mode"));
}

#[tokio::test]
async fn empty_retrieval_still_answers() {
    let sparse = SparseIndex::in_memory().unwrap();
    let llm = Arc::new(EchoContextLlm {
        prompts: Mutex::new(Vec::new()),
        reply: "",
    });

    let generator = AnswerGenerator::new(
        RetrievalEngine::new(
            Arc::new(StaticDense(Vec::new())),
            Arc::new(sparse.clone()),
            fast_timeouts(),
        ),
        Arc::new(sparse),
        llm,
        AnswerConfig::default(),
    );

    let answer = generator.respond("hello", &[]).await.unwrap();
    assert!(!answer.text.trim().is_empty());
    assert!(answer.source_ids.is_empty());
}

#[tokio::test]
async fn sparse_index_feeds_hybrid_ranking() {
    let sparse = SparseIndex::in_memory().unwrap();
    sparse
        .index_documents(&[
            chunk("router", "Restart the router to fix slow internet"),
            chunk("billing", "Pay your bill online"),
            chunk("speed", "Slow internet speeds can come from interference"),
        ])
        .unwrap();

    let engine = RetrievalEngine::new(
        Arc::new(StaticDense(vec!["speed", "billing"])),
        Arc::new(sparse),
        fast_timeouts(),
    );

    let results = engine.retrieve("slow internet", 10).await.unwrap();
    assert!(results.sparse_ids().contains(&"router"));
    assert!(!results.sparse_ids().contains(&"billing"));

    // speed appears in both lists and must lead the fused ranking
    let fused = results.fuse(20.0);
    assert_eq!(fused.ids()[0], "speed");
}
