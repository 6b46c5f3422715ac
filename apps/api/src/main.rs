mod chat;
mod config;
mod embeddings;
mod errors;
mod ingest;
mod llm_client;
mod rag;
mod routes;
mod state;
mod vector_store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chat::dispatcher::SpecialistDispatcher;
use crate::chat::intent::IntentRouter;
use crate::chat::session::SessionStore;
use crate::config::Config;
use crate::embeddings::OpenAiEmbedder;
use crate::ingest::IngestPipeline;
use crate::llm_client::ChatCompletionClient;
use crate::rag::chunker::Chunker;
use crate::rag::retriever::Retriever;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vector_store::VectorStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Compass API v{}", env!("CARGO_PKG_VERSION"));

    // Capabilities
    let embedder = Arc::new(OpenAiEmbedder::from_config(&config));
    let completion = Arc::new(ChatCompletionClient::from_config(&config));
    info!(
        "Completion client initialized (provider: {}, model: {})",
        config.completion_provider, config.completion_model
    );

    // In-process vector index with its fixed collections
    let store = Arc::new(VectorStore::new());

    // Ingestion pipeline
    let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
    let ingest = Arc::new(IngestPipeline::new(
        chunker,
        embedder.clone(),
        store.clone(),
        config.ingest_concurrency,
    ));

    // Supervisor + specialists
    let intent_router = Arc::new(IntentRouter::new(
        completion.clone(),
        config.classifier_confidence_threshold,
    ));
    let retriever = Retriever::new(embedder.clone(), store.clone());
    let dispatcher = Arc::new(SpecialistDispatcher::new(
        retriever,
        store.clone(),
        embedder,
        completion,
        config.clone(),
    ));

    let sessions = Arc::new(SessionStore::new(config.history_max_turns));

    let state = AppState {
        config: config.clone(),
        store,
        sessions,
        intent_router,
        dispatcher,
        ingest,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
