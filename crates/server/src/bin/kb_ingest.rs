//! Knowledge base ingestion
//!
//! Chunks the support articles and writes them into the keyword index and,
//! unless `--sparse-only` is given, embeds them into the vector collection.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use voice_agent_config::load_settings;
use voice_agent_rag::{
    create_embedder, KnowledgeLoader, SparseConfig, SparseIndex, VectorStore, VectorStoreConfig,
};

#[derive(Parser)]
#[command(name = "kb-ingest")]
#[command(about = "Load knowledge base articles into the retrieval indexes", long_about = None)]
struct Cli {
    /// Directory of `.txt` articles (defaults to rag.kb_documents_path)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Only build the keyword index
    #[arg(long)]
    sparse_only: bool,

    /// Print the chunk count without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let env = std::env::var("VOICE_AGENT_ENV").ok();
    let config = load_settings(env.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("voice_agent={}", config.observability.log_level).into()),
        )
        .init();

    let dir = cli
        .dir
        .unwrap_or_else(|| PathBuf::from(&config.rag.kb_documents_path));
    let loader = KnowledgeLoader::new(config.rag.chunk_size, config.rag.chunk_overlap);

    if cli.dry_run {
        let (files, chunks) = loader.load_directory(&dir)?;
        println!("{} files, {} chunks in {}", files, chunks.len(), dir.display());
        return Ok(());
    }

    if config.rag.sparse_index_path.is_none() {
        tracing::warn!("rag.sparse_index_path is not set; the keyword index will not outlive this run");
    }
    let sparse = SparseIndex::new(SparseConfig::from(&config.rag))?;

    let report = if cli.sparse_only {
        loader.ingest(&dir, &sparse, None).await?
    } else {
        let store = VectorStore::new(VectorStoreConfig::from(&config.rag))?;
        let embedder = create_embedder(&config.rag)?;
        loader
            .ingest(&dir, &sparse, Some((&store, embedder.as_ref())))
            .await?
    };

    println!(
        "Ingested {} files: {} chunks indexed, {} embedded",
        report.files, report.chunks, report.embedded
    );
    Ok(())
}
