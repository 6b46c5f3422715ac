//! POST /api/v1/chat — one conversational turn.
//!
//! A turn optionally carries a resume upload; the upload is applied to the
//! session before routing so the same request can upload and ask. Routing
//! and dispatch run under the session's own lock, so concurrent turns for
//! one session serialize without blocking other sessions.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::dispatcher::TurnOutcome;
use crate::chat::intent::Intent;
use crate::errors::AppError;
use crate::ingest::DocumentUpload;
use crate::rag::models::SourceKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Absent or unknown ids start a fresh session.
    pub session_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub resume_text: Option<String>,
    /// Narrows interview preparation to one posting.
    #[serde(default)]
    pub target_job_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub intent: Intent,
    pub outcome: TurnOutcome,
}

pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let (session_id, session) = state.sessions.get_or_create(request.session_id);
    let mut session = session.lock().await;

    if let Some(resume_text) = &request.resume_text {
        if resume_text.trim().is_empty() {
            return Err(AppError::Validation(
                "resume_text cannot be empty".to_string(),
            ));
        }
        session.set_resume(resume_text.clone());

        // The session holds the authoritative resume text; the corpus copy
        // only enables similarity lookups, so an indexing failure does not
        // fail the turn.
        let report = state
            .ingest
            .ingest(
                SourceKind::Resume,
                vec![DocumentUpload {
                    id: session_id.to_string(),
                    text: resume_text.clone(),
                    title: None,
                    company: None,
                }],
            )
            .await;
        if let Some(skipped) = report.skipped.first() {
            warn!(
                "Resume for session {session_id} not indexed: {}",
                skipped.reason
            );
        }
    }

    let intent = state.intent_router.route(&request.message, &mut session).await;
    info!("Session {session_id} routed to {}", intent.as_str());

    let response = state
        .dispatcher
        .dispatch(
            intent,
            &request.message,
            request.target_job_id.as_deref(),
            &mut session,
        )
        .await?;

    Ok(Json(ChatResponse {
        session_id,
        intent: response.intent,
        outcome: response.outcome,
    }))
}
