//! Query and document embeddings
//!
//! Gemini `embedContent` for the cloud deployment and Ollama's `/api/embed`
//! for self-hosted models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use voice_agent_config::{ModelProvider, RagConfig};

use crate::RagError;

const EMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// Text embedder
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a user query for retrieval
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError>;

    /// Embed a knowledge base passage for indexing
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, RagError>;

    fn model_name(&self) -> &str;
}

/// Build the configured embedder
pub fn create_embedder(config: &RagConfig) -> Result<Arc<dyn Embedder>, RagError> {
    match config.embedding_provider {
        ModelProvider::Gemini => {
            let api_key = config
                .embedding_api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    RagError::Embedding("Gemini embeddings require an API key".to_string())
                })?;
            Ok(Arc::new(GeminiEmbedder::new(
                &config.embedding_endpoint,
                &config.embedding_model,
                api_key,
            )?))
        },
        ModelProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            &config.embedding_endpoint,
            &config.embedding_model,
        )?)),
    }
}

fn http_client() -> Result<Client, RagError> {
    Client::builder()
        .timeout(EMBED_TIMEOUT)
        .build()
        .map_err(|e| RagError::Embedding(e.to_string()))
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, RagError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(RagError::Embedding(format!(
            "{} embedding failed: {} - {}",
            provider, status, text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RagError::Embedding(format!("Failed to parse {} response: {}", provider, e)))
}

/// Gemini embedder
pub struct GeminiEmbedder {
    client: Client,
    endpoint: String,
    /// Always carries the `models/` prefix
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: [EmbedPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(endpoint: &str, model: &str, api_key: String) -> Result<Self, RagError> {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    async fn embed(&self, text: &str, task_type: &'static str) -> Result<Vec<f32>, RagError> {
        let request = EmbedContentRequest {
            model: &self.model,
            content: EmbedContent {
                parts: [EmbedPart { text }],
            },
            task_type,
        };

        let url = format!("{}/{}:embedContent", self.endpoint, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Gemini request failed: {}", e)))?;

        let body: EmbedContentResponse = read_json("Gemini", response).await?;
        if body.embedding.values.is_empty() {
            return Err(RagError::Embedding("No embedding returned".to_string()));
        }
        Ok(body.embedding.values)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        self.embed(query, "RETRIEVAL_QUERY").await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed(text, "RETRIEVAL_DOCUMENT").await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Ollama embedder
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(endpoint: &str, model: &str) -> Result<Self, RagError> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: text,
        };

        let url = format!("{}/api/embed", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Ollama request failed: {}", e)))?;

        let body: OllamaEmbedResponse = read_json("Ollama", response).await?;
        body.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        self.embed(query).await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed(text).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_gemini_query_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:embedContent"))
            .and(header("x-goog-api-key", "k"))
            .and(body_partial_json(serde_json::json!({
                "taskType": "RETRIEVAL_QUERY",
                "content": {"parts": [{"text": "slow internet"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": {"values": [0.1, 0.2, 0.3]}
            })))
            .mount(&server)
            .await;

        let embedder = GeminiEmbedder::new(&server.uri(), "text-embedding-004", "k".into()).unwrap();
        assert_eq!(embedder.model_name(), "models/text-embedding-004");

        let values = embedder.embed_query("slow internet").await.unwrap();
        assert_eq!(values, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_gemini_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let embedder =
            GeminiEmbedder::new(&server.uri(), "models/text-embedding-004", "k".into()).unwrap();
        let err = embedder.embed_document("text").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_ollama_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({"model": "nomic-embed-text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.5, 0.25]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&server.uri(), "nomic-embed-text").unwrap();
        assert_eq!(embedder.embed_query("apn").await.unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = RagConfig {
            embedding_api_key: None,
            ..RagConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
