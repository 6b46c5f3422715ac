pub mod chat;
pub mod corpus;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat API
        .route("/api/v1/chat", post(chat::handle_chat))
        // Corpus API
        .route("/api/v1/ingest", post(corpus::handle_ingest))
        .route("/api/v1/corpus/stats", get(corpus::handle_stats))
        .route("/api/v1/corpus/:collection/clear", post(corpus::handle_clear))
        .with_state(state)
}
