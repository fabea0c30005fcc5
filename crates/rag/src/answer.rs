//! Grounded answer generation
//!
//! Retrieve from both indexes, fuse, keep the top `m`, fetch their text and
//! make one model call.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use voice_agent_config::{constants::rag, RagConfig};
use voice_agent_core::{AnswerResult, HistoryEntry, Responder};
use voice_agent_llm::{LlmBackend, Message};

use crate::prompt::build_grounding_prompt;
use crate::retriever::RetrievalEngine;
use crate::RagError;

/// Article text by document id
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `(id, text)` pairs in the requested order; unknown ids are skipped
    async fn fetch(&self, ids: &[String]) -> Result<Vec<(String, String)>, RagError>;
}

#[derive(Debug, Clone)]
pub struct AnswerConfig {
    /// Hits requested from each index
    pub retrieve_n: usize,
    /// Fused documents kept as context
    pub top_m: usize,
    pub rrf_k: f64,
    /// Replaces a blank model reply
    pub insufficient_answer: String,
}

impl From<&RagConfig> for AnswerConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            retrieve_n: config.retrieve_n,
            top_m: config.fusion_top_m,
            rrf_k: config.rrf_k,
            insufficient_answer: rag::INSUFFICIENT_INFORMATION_ANSWER.to_string(),
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

pub struct AnswerGenerator {
    engine: RetrievalEngine,
    documents: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmBackend>,
    config: AnswerConfig,
}

impl AnswerGenerator {
    pub fn new(
        engine: RetrievalEngine,
        documents: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmBackend>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            engine,
            documents,
            llm,
            config,
        }
    }

    /// Answer `query` from the documents in `ids` (already fused and truncated).
    ///
    /// A document fetch failure degrades to an empty context. A model failure
    /// is returned as `RagError::Generation`.
    pub async fn generate(
        &self,
        query: &str,
        history: &[HistoryEntry],
        ids: &[String],
    ) -> Result<AnswerResult, RagError> {
        let documents = if ids.is_empty() {
            Vec::new()
        } else {
            match self.documents.fetch(ids).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!(error = %e, "Document fetch failed, answering without context");
                    Vec::new()
                },
            }
        };

        let (source_ids, articles): (Vec<String>, Vec<String>) = documents.into_iter().unzip();
        let prompt = build_grounding_prompt(query, history, &articles);

        let start = Instant::now();
        let result = self.llm.generate(&[Message::user(prompt)]).await?;

        tracing::debug!(
            stage = "generation",
            model = self.llm.model_name(),
            context_docs = source_ids.len(),
            tokens = result.tokens,
            latency_ms = start.elapsed().as_millis() as u64,
            "Answer generated"
        );

        let text = match result.text.trim() {
            "" => {
                tracing::warn!("Model returned an empty answer");
                self.config.insufficient_answer.clone()
            },
            text => text.to_string(),
        };

        Ok(AnswerResult { text, source_ids })
    }

    /// Retrieve, fuse and truncate; a retrieval failure yields no ids
    pub async fn context_ids(&self, query: &str) -> Vec<String> {
        match self.engine.retrieve(query, self.config.retrieve_n).await {
            Ok(results) => {
                let mut fused = results.fuse(self.config.rrf_k);
                fused.truncate(self.config.top_m);
                fused.ids()
            },
            Err(e) => {
                tracing::warn!(stage = "retrieval", error = %e, "Retrieval failed, answering without grounding");
                Vec::new()
            },
        }
    }
}

#[async_trait]
impl Responder for AnswerGenerator {
    async fn respond(
        &self,
        query: &str,
        history: &[HistoryEntry],
    ) -> voice_agent_core::Result<AnswerResult> {
        let ids = self.context_ids(query).await;
        Ok(self.generate(query, history, &ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::{DenseSearch, KeywordSearch, RetrievalConfig};
    use parking_lot::Mutex;
    use voice_agent_llm::{FinishReason, GenerationResult, LlmError};

    struct ScriptedLlm {
        reply: Result<String, LlmError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedLlm {
        async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
            self.prompts.lock().push(messages[0].content.clone());
            self.reply.clone().map(|text| GenerationResult {
                text,
                tokens: 0,
                total_time_ms: 0,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct Docs;

    #[async_trait]
    impl DocumentStore for Docs {
        async fn fetch(&self, ids: &[String]) -> Result<Vec<(String, String)>, RagError> {
            Ok(ids
                .iter()
                .filter(|id| id.as_str() != "missing")
                .map(|id| (id.clone(), format!("article {}", id)))
                .collect())
        }
    }

    struct Hits(&'static [&'static str]);

    #[async_trait]
    impl DenseSearch for Hits {
        async fn search(&self, _q: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
            Ok(self.0.iter().map(|id| (id.to_string(), 1.0)).collect())
        }
    }

    #[async_trait]
    impl KeywordSearch for Hits {
        async fn search(&self, _q: &str, _n: usize) -> Result<Vec<(String, f32)>, RagError> {
            Ok(self.0.iter().map(|id| (id.to_string(), 1.0)).collect())
        }
    }

    fn generator(
        dense: &'static [&'static str],
        sparse: &'static [&'static str],
        llm: Arc<ScriptedLlm>,
    ) -> AnswerGenerator {
        AnswerGenerator::new(
            RetrievalEngine::new(
                Arc::new(Hits(dense)),
                Arc::new(Hits(sparse)),
                RetrievalConfig::default(),
            ),
            Arc::new(Docs),
            llm,
            AnswerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_respond_uses_fused_top_m() {
        let llm = ScriptedLlm::replying("Restart the router.");
        let gen = generator(
            &["d1", "d2", "d3", "d4", "d5", "d6"],
            &["d6", "d7"],
            llm.clone(),
        );

        let answer = gen.respond("slow internet", &[]).await.unwrap();
        assert_eq!(answer.text, "Restart the router.");
        // d6 is in both lists; d2 and d7 tie and keep first-seen order
        assert_eq!(answer.source_ids, vec!["d6", "d1", "d2", "d7", "d3"]);

        let prompts = llm.prompts.lock();
        assert!(prompts[0].contains("article d1"));
        assert!(prompts[0].contains("User's Question: \"slow internet\""));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_reported_as_sources() {
        let llm = ScriptedLlm::replying("ok");
        let gen = generator(&[], &[], llm);

        let ids = vec!["a".to_string(), "missing".to_string()];
        let answer = gen.generate("q", &[], &ids).await.unwrap();
        assert_eq!(answer.source_ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_blank_reply_becomes_insufficient_answer() {
        let llm = ScriptedLlm::replying("   ");
        let gen = generator(&[], &[], llm);

        let answer = gen.respond("hello", &[]).await.unwrap();
        assert_eq!(answer.text, rag::INSUFFICIENT_INFORMATION_ANSWER);
        assert!(answer.source_ids.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_surfaced() {
        let llm = Arc::new(ScriptedLlm {
            reply: Err(LlmError::Api("quota exceeded".to_string())),
            prompts: Mutex::new(Vec::new()),
        });
        let gen = generator(&["d1"], &[], llm);

        let err = gen.respond("hello", &[]).await.unwrap_err();
        assert!(matches!(err, voice_agent_core::Error::Generation(_)));
    }
}
