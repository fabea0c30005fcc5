//! Knowledge Base Loader
//!
//! Reads plain-text articles from a directory, cuts them into overlapping
//! word windows and writes the chunks into the sparse index and, when
//! configured, the vector store.

use std::path::Path;

use crate::embeddings::Embedder;
use crate::sparse_search::SparseIndex;
use crate::vector_store::VectorStore;
use crate::RagError;

/// One indexed passage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeChunk {
    /// `<file stem>_chunk_<n>`
    pub id: String,
    pub content: String,
    /// File the chunk came from
    pub source: String,
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub chunks: usize,
    pub embedded: usize,
}

/// Split `text` into windows of `size` words that start every `size - overlap` words.
///
/// `overlap` must be smaller than `size`.
pub fn chunk_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = size.saturating_sub(overlap).max(1);

    (0..words.len())
        .step_by(step)
        .map(|start| words[start..(start + size).min(words.len())].join(" "))
        .collect()
}

/// Knowledge loader for populating the indexes
pub struct KnowledgeLoader {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl KnowledgeLoader {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk every `.txt` file in `dir`, in file-name order
    pub fn load_directory(&self, dir: &Path) -> Result<(usize, Vec<KnowledgeChunk>), RagError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            RagError::KnowledgeBase(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();

        let mut chunks = Vec::new();
        for path in &files {
            let content = std::fs::read_to_string(path).map_err(|e| {
                RagError::KnowledgeBase(format!("cannot read {}: {}", path.display(), e))
            })?;

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let source = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            for (i, text) in chunk_words(&content, self.chunk_size, self.chunk_overlap)
                .into_iter()
                .enumerate()
            {
                chunks.push(KnowledgeChunk {
                    id: format!("{}_chunk_{}", stem, i),
                    content: text,
                    source: source.clone(),
                });
            }

            tracing::debug!(file = %source, "Chunked knowledge article");
        }

        Ok((files.len(), chunks))
    }

    /// Load `dir` and write it into the indexes
    pub async fn ingest(
        &self,
        dir: &Path,
        sparse: &SparseIndex,
        dense: Option<(&VectorStore, &dyn Embedder)>,
    ) -> Result<IngestReport, RagError> {
        let (files, chunks) = self.load_directory(dir)?;
        tracing::info!(files, chunks = chunks.len(), "Ingesting knowledge base");

        sparse.index_documents(&chunks)?;

        let mut embedded = 0;
        if let Some((store, embedder)) = dense {
            let mut embeddings = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                embeddings.push(embedder.embed_document(&chunk.content).await?);
            }

            if let Some(first) = embeddings.first() {
                store.ensure_collection(first.len()).await?;
                store.upsert(&chunks, &embeddings).await?;
            }
            embedded = embeddings.len();
        }

        Ok(IngestReport {
            files,
            chunks: chunks.len(),
            embedded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_words_overlap() {
        let text = "a b c d e f g";
        assert_eq!(chunk_words(text, 3, 1), vec!["a b c", "c d e", "e f g", "g"]);
    }

    #[test]
    fn test_chunk_words_short_text() {
        assert_eq!(chunk_words("reset the router", 768, 100), vec!["reset the router"]);
        assert!(chunk_words("   ", 768, 100).is_empty());
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("router.txt"), "Unplug the router and wait").unwrap();
        std::fs::write(dir.path().join("apn.txt"), "Open settings then mobile network").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let loader = KnowledgeLoader::new(3, 1);
        let (files, chunks) = loader.load_directory(dir.path()).unwrap();

        assert_eq!(files, 2);
        assert_eq!(chunks[0].id, "apn_chunk_0");
        assert_eq!(chunks[0].content, "Open settings then");
        assert_eq!(chunks[0].source, "apn.txt");
        assert!(chunks.iter().any(|c| c.id == "router_chunk_2"));
    }

    #[test]
    fn test_missing_directory() {
        let loader = KnowledgeLoader::new(768, 100);
        let err = loader.load_directory(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, RagError::KnowledgeBase(_)));
    }

    #[tokio::test]
    async fn test_ingest_sparse_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wifi.txt"), "Move the modem away from the microwave").unwrap();

        let sparse = SparseIndex::in_memory().unwrap();
        let report = KnowledgeLoader::new(768, 100)
            .ingest(dir.path(), &sparse, None)
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                files: 1,
                chunks: 1,
                embedded: 0
            }
        );
        assert_eq!(sparse.search_blocking("microwave", 5).unwrap()[0].0, "wifi_chunk_0");
    }
}
