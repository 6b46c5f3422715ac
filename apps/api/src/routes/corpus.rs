//! Corpus management endpoints: bulk ingestion, stats, and clearing.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::ingest::{DocumentUpload, IngestReport};
use crate::rag::models::SourceKind;
use crate::state::AppState;
use crate::vector_store::{VectorStoreError, JOBS_COLLECTION, RESUMES_COLLECTION};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub collection: String,
    pub documents: Vec<DocumentUpload>,
}

#[derive(Debug, Serialize)]
pub struct CollectionStats {
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct CorpusStats {
    pub collections: BTreeMap<String, CollectionStats>,
}

fn source_kind_for(collection: &str) -> Result<SourceKind, AppError> {
    match collection {
        JOBS_COLLECTION => Ok(SourceKind::Job),
        RESUMES_COLLECTION => Ok(SourceKind::Resume),
        other => Err(AppError::VectorStore(VectorStoreError::UnknownCollection(
            other.to_string(),
        ))),
    }
}

/// POST /api/v1/ingest
/// Ingests a document batch into a named collection. Per-document failures
/// are reported in the response, not surfaced as an HTTP error.
pub async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let kind = source_kind_for(&request.collection)?;

    if request.documents.is_empty() {
        return Err(AppError::Validation(
            "documents must not be empty".to_string(),
        ));
    }
    if let Some(doc) = request.documents.iter().find(|d| d.id.trim().is_empty()) {
        return Err(AppError::Validation(format!(
            "document with text of length {} has an empty id",
            doc.text.len()
        )));
    }

    let report = state.ingest.ingest(kind, request.documents).await;
    Ok(Json(report))
}

/// GET /api/v1/corpus/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<CorpusStats>, AppError> {
    let mut collections = BTreeMap::new();
    for name in state.store.collection_names() {
        let chunks = state.store.len(name)?;
        collections.insert(name.to_string(), CollectionStats { chunks });
    }
    Ok(Json(CorpusStats { collections }))
}

/// POST /api/v1/corpus/:collection/clear
/// Empties one collection. Clearing an already-empty collection succeeds.
pub async fn handle_clear(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.clear(&collection)?;
    Ok(Json(json!({
        "collection": collection,
        "cleared": true
    })))
}
