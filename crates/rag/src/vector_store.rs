//! Vector Store using Qdrant
//!
//! Dense vector storage and similarity search. Knowledge base ids are kept
//! in the `doc_id` payload; the Qdrant point id is a name-based UUID derived
//! from it so lookups by document id need no scroll.

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, CreateCollectionBuilder, Distance,
        GetPointsBuilder, PointId, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value,
        VectorParamsBuilder,
    },
    Qdrant,
};
use std::collections::HashMap;
use uuid::Uuid;

use voice_agent_config::RagConfig;

use crate::answer::DocumentStore;
use crate::knowledge_loader::KnowledgeChunk;
use crate::RagError;

const DOC_ID_KEY: &str = "doc_id";
const TEXT_KEY: &str = "text";
const SOURCE_KEY: &str = "source";

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Collection name
    pub collection: String,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl From<&RagConfig> for VectorStoreConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            endpoint: config.qdrant_endpoint.clone(),
            collection: config.qdrant_collection.clone(),
            api_key: config.qdrant_api_key.clone(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

/// Point id for a knowledge base document id
pub fn point_id_for(doc_id: &str) -> PointId {
    PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string())
}

/// Vector store client
pub struct VectorStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStore {
    /// Create a new vector store client. No request is made until first use.
    pub fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Create the collection with cosine distance if it does not exist
    pub async fn ensure_collection(&self, vector_dim: usize) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if !exists {
            tracing::info!(
                collection = %self.config.collection,
                vector_dim,
                "Creating Qdrant collection"
            );
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        Ok(())
    }

    /// Insert or replace chunks with their embeddings
    pub async fn upsert(
        &self,
        chunks: &[KnowledgeChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RagError> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::VectorStore(
                "Chunk and embedding count mismatch".to_string(),
            ));
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                let mut payload: HashMap<String, Value> = HashMap::new();
                payload.insert(DOC_ID_KEY.to_string(), chunk.id.clone().into());
                payload.insert(TEXT_KEY.to_string(), chunk.content.clone().into());
                payload.insert(SOURCE_KEY.to_string(), chunk.source.clone().into());

                PointStruct::new(point_id_for(&chunk.id), embedding.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points).wait(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    /// Nearest neighbours of `embedding`, best first
    pub async fn search(
        &self,
        embedding: &[f32],
        n: usize,
    ) -> Result<Vec<(String, f32)>, RagError> {
        let request =
            SearchPointsBuilder::new(&self.config.collection, embedding.to_vec(), n as u64)
                .with_payload(true);

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let id = string_payload(&point.payload, DOC_ID_KEY)
                    .or_else(|| point.id.and_then(point_id_string))
                    .unwrap_or_default();
                (id, point.score)
            })
            .filter(|(id, _)| !id.is_empty())
            .collect())
    }

    /// Stored text for `ids`, in the requested order; unknown ids are skipped
    pub async fn fetch_contents(&self, ids: &[String]) -> Result<Vec<(String, String)>, RagError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| point_id_for(id)).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.config.collection, point_ids).with_payload(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        let mut by_id: HashMap<String, String> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = string_payload(&point.payload, DOC_ID_KEY)?;
                let text = string_payload(&point.payload, TEXT_KEY)?;
                Some((id, text))
            })
            .collect();

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id).map(|text| (id.clone(), text)))
            .collect())
    }

    /// Number of stored points
    pub async fn point_count(&self) -> Result<u64, RagError> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0))
    }
}

#[async_trait]
impl DocumentStore for VectorStore {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<(String, String)>, RagError> {
        self.fetch_contents(ids).await
    }
}

fn string_payload(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn point_id_string(id: PointId) -> Option<String> {
    match id.point_id_options? {
        PointIdOptions::Uuid(u) => Some(u),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = RagConfig {
            qdrant_collection: "kb_test".to_string(),
            qdrant_api_key: Some("secret".to_string()),
            ..RagConfig::default()
        };
        let config = VectorStoreConfig::from(&settings);
        assert_eq!(config.collection, "kb_test");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(point_id_for("router_chunk_0"), point_id_for("router_chunk_0"));
        assert_ne!(point_id_for("router_chunk_0"), point_id_for("router_chunk_1"));
    }

    #[test]
    fn test_string_payload() {
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert(DOC_ID_KEY.to_string(), "d1".to_string().into());
        payload.insert("count".to_string(), Value::from(3_i64));

        assert_eq!(string_payload(&payload, DOC_ID_KEY).as_deref(), Some("d1"));
        assert_eq!(string_payload(&payload, "count"), None);
        assert_eq!(string_payload(&payload, "missing"), None);
    }
}
