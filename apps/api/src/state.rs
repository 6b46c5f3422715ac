use std::sync::Arc;

use crate::chat::dispatcher::SpecialistDispatcher;
use crate::chat::intent::IntentRouter;
use crate::chat::session::SessionStore;
use crate::config::Config;
use crate::ingest::IngestPipeline;
use crate::vector_store::VectorStore;

/// Shared application state, cloned per request by Axum.
/// Components are constructed once at startup and injected here; handlers
/// reach capabilities only through this state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<VectorStore>,
    pub sessions: Arc<SessionStore>,
    pub intent_router: Arc<IntentRouter>,
    pub dispatcher: Arc<SpecialistDispatcher>,
    pub ingest: Arc<IngestPipeline>,
}
