//! Voice Agent Server Entry Point

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_agent_config::{load_settings, Settings};
use voice_agent_core::Responder;
use voice_agent_llm::create_backend;
use voice_agent_pipeline::{create_recognizer, create_synthesizer};
use voice_agent_rag::{
    create_embedder, AnswerConfig, AnswerGenerator, DenseRetriever, KnowledgeLoader, RetrievalConfig,
    RetrievalEngine, SparseConfig, SparseIndex, VectorStore, VectorStoreConfig,
};
use voice_agent_server::{create_router, init_metrics, AppState, HttpMediaEngine};

const MEDIA_ENGINE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: flat deployment vars > VOICE_AGENT__ vars > config/{env} > config/default > defaults
    let env = std::env::var("VOICE_AGENT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing needs the settings, so report directly
            eprintln!("Fatal configuration error: {}", e);
            return Err(e.into());
        },
    };

    init_tracing(&config);

    tracing::info!("Starting Voice Agent Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        stt = ?config.providers.stt,
        tts = ?config.providers.tts,
        "Configuration loaded"
    );
    if let Some(agent_url) = &config.agent_url {
        tracing::info!(agent_url = %agent_url, "Agent URL recorded");
    }

    if config.observability.metrics_enabled {
        init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let recognizer = create_recognizer(&config)?;
    let synthesizer = create_synthesizer(&config)?;
    let responder = build_responder(&config).await?;

    let mut state = AppState::new(config.clone(), recognizer, synthesizer, responder);
    if let Some(engine_url) = &config.media.engine_url {
        state = state.with_media_engine(Arc::new(HttpMediaEngine::new(engine_url, MEDIA_ENGINE_TIMEOUT)?));
        tracing::info!(engine_url = %engine_url, "Media engine configured");
    } else {
        tracing::warn!("No media engine configured; SDP offers will be rejected");
    }

    let sessions = state.sessions.clone();
    let cleanup_shutdown = sessions.start_cleanup_task();

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = cleanup_shutdown.send(true);
    sessions.close_all();

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Retrieval engine plus generator behind the `Responder` seam
async fn build_responder(config: &Settings) -> Result<Arc<dyn Responder>, Box<dyn std::error::Error>> {
    let llm = create_backend(&config.llm)?;
    let embedder = create_embedder(&config.rag)?;
    let vector_store = Arc::new(VectorStore::new(VectorStoreConfig::from(&config.rag))?);
    let sparse = Arc::new(SparseIndex::new(SparseConfig::from(&config.rag))?);

    // An in-memory keyword index starts empty; fill it from the articles on disk
    if sparse.doc_count() == 0 {
        let kb_dir = Path::new(&config.rag.kb_documents_path);
        if kb_dir.is_dir() {
            let loader = KnowledgeLoader::new(config.rag.chunk_size, config.rag.chunk_overlap);
            match loader.ingest(kb_dir, &sparse, None).await {
                Ok(report) => tracing::info!(
                    files = report.files,
                    chunks = report.chunks,
                    "Keyword index loaded from knowledge base"
                ),
                Err(e) => tracing::warn!(error = %e, "Knowledge base load failed, keyword search is empty"),
            }
        } else {
            tracing::warn!(path = %kb_dir.display(), "Knowledge base directory not found, keyword search is empty");
        }
    }

    let dense = Arc::new(DenseRetriever::new(embedder, vector_store));
    let engine = RetrievalEngine::new(dense, sparse.clone(), RetrievalConfig::from(&config.rag));

    tracing::info!(
        collection = %config.rag.qdrant_collection,
        model = llm.model_name(),
        retrieve_n = config.rag.retrieve_n,
        top_m = config.rag.fusion_top_m,
        rrf_k = config.rag.rrf_k,
        "Answer generator ready"
    );

    Ok(Arc::new(AnswerGenerator::new(
        engine,
        sparse,
        llm,
        AnswerConfig::from(&config.rag),
    )))
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_agent={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
