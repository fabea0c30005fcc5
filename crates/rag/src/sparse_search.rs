//! Sparse Search using Tantivy (BM25)
//!
//! Keyword side of hybrid retrieval. Also serves as the document store the
//! answer generator reads article text from.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tantivy::{
    collector::TopDocs,
    query::{QueryParser, TermQuery},
    schema::{
        Field, IndexRecordOption, OwnedValue, Schema, TextFieldIndexing, TextOptions, STORED,
        STRING,
    },
    tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer},
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};

use voice_agent_config::RagConfig;

use crate::answer::DocumentStore;
use crate::knowledge_loader::KnowledgeChunk;
use crate::retriever::KeywordSearch;
use crate::RagError;

const TOKENIZER: &str = "en_stem";
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Sparse search configuration
#[derive(Debug, Clone, Default)]
pub struct SparseConfig {
    /// Index directory (use RAM if None)
    pub index_path: Option<String>,
}

impl From<&RagConfig> for SparseConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            index_path: config.sparse_index_path.clone(),
        }
    }
}

struct Inner {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    id_field: Field,
    content_field: Field,
}

/// Sparse index for BM25 search
#[derive(Clone)]
pub struct SparseIndex {
    inner: Arc<Inner>,
}

impl SparseIndex {
    /// Open (or create) the index
    pub fn new(config: SparseConfig) -> Result<Self, RagError> {
        let mut schema_builder = Schema::builder();

        let content_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(TOKENIZER)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let content_field = schema_builder.add_text_field("content", content_options);
        let schema = schema_builder.build();

        let index = match config.index_path {
            Some(ref path) => {
                std::fs::create_dir_all(path).map_err(|e| RagError::Index(e.to_string()))?;
                let dir = tantivy::directory::MmapDirectory::open(Path::new(path))
                    .map_err(|e| RagError::Index(e.to_string()))?;
                Index::open_or_create(dir, schema).map_err(|e| RagError::Index(e.to_string()))?
            },
            None => Index::create_in_ram(schema),
        };

        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(100))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();
        index.tokenizers().register(TOKENIZER, analyzer);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| RagError::Index(e.to_string()))?;

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| RagError::Index(e.to_string()))?;

        tracing::info!(
            path = config.index_path.as_deref().unwrap_or("<ram>"),
            docs = reader.searcher().num_docs(),
            "Sparse index opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                index,
                reader,
                writer: Mutex::new(writer),
                id_field,
                content_field,
            }),
        })
    }

    /// In-memory index, mostly for tests and tooling
    pub fn in_memory() -> Result<Self, RagError> {
        Self::new(SparseConfig::default())
    }

    /// Add chunks, replacing any existing entry with the same id
    pub fn index_documents(&self, chunks: &[KnowledgeChunk]) -> Result<(), RagError> {
        let inner = &self.inner;
        let mut writer = inner.writer.lock();

        for chunk in chunks {
            writer.delete_term(Term::from_field_text(inner.id_field, &chunk.id));

            let mut doc = TantivyDocument::default();
            doc.add_text(inner.id_field, &chunk.id);
            doc.add_text(inner.content_field, &chunk.content);
            writer
                .add_document(doc)
                .map_err(|e| RagError::Index(e.to_string()))?;
        }

        writer.commit().map_err(|e| RagError::Index(e.to_string()))?;
        inner
            .reader
            .reload()
            .map_err(|e| RagError::Index(e.to_string()))?;

        Ok(())
    }

    /// BM25 search, best first.
    ///
    /// Parsing is lenient: syntax the query language does not understand is
    /// dropped rather than failing the search.
    pub fn search_blocking(&self, query: &str, n: usize) -> Result<Vec<(String, f32)>, RagError> {
        let inner = &self.inner;
        let searcher = inner.reader.searcher();

        let parser = QueryParser::for_index(&inner.index, vec![inner.content_field]);
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "Ignored unparseable query fragments");
        }

        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(n.max(1)))
            .map_err(|e| RagError::Search(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs.into_iter().take(n) {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| RagError::Search(e.to_string()))?;
            if let Some(id) = text_value(&doc, inner.id_field) {
                results.push((id, score));
            }
        }

        Ok(results)
    }

    /// Stored content for one id
    pub fn get_content(&self, id: &str) -> Result<Option<String>, RagError> {
        let inner = &self.inner;
        let searcher = inner.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(inner.id_field, id),
            IndexRecordOption::Basic,
        );

        let top = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(|e| RagError::Search(e.to_string()))?;

        match top.first() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher
                    .doc(*address)
                    .map_err(|e| RagError::Search(e.to_string()))?;
                Ok(text_value(&doc, inner.content_field))
            },
            None => Ok(None),
        }
    }

    /// Get document count
    pub fn doc_count(&self) -> u64 {
        self.inner.reader.searcher().num_docs()
    }
}

fn text_value(doc: &TantivyDocument, field: Field) -> Option<String> {
    match doc.get_first(field) {
        Some(OwnedValue::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl KeywordSearch for SparseIndex {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<(String, f32)>, RagError> {
        // Tantivy search is CPU-bound; keep it off the async executor
        let index = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || index.search_blocking(&query, n))
            .await
            .map_err(|e| RagError::Search(format!("Sparse search task failed: {}", e)))?
    }
}

#[async_trait]
impl DocumentStore for SparseIndex {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<(String, String)>, RagError> {
        let index = self.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(content) = index.get_content(&id)? {
                    found.push((id, content));
                }
            }
            Ok::<_, RagError>(found)
        })
        .await
        .map_err(|e| RagError::Search(format!("Document fetch task failed: {}", e)))?
    }
}
