//! Answer capability consumed by the pipeline

use crate::{AnswerResult, HistoryEntry, Result};
use async_trait::async_trait;

/// Produces a grounded answer for a finished user query.
///
/// The retrieval-augmented generator implements this; the pipeline only
/// sees the trait.
#[async_trait]
pub trait Responder: Send + Sync + 'static {
    async fn respond(&self, query: &str, history: &[HistoryEntry]) -> Result<AnswerResult>;
}
