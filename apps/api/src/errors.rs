use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::llm_client::CompletionError;
use crate::vector_store::VectorStoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every surfaced failure names the stage that failed, so the caller can
/// render a specific message instead of a generic one.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidDocument(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_DOCUMENT",
                msg.clone(),
            ),
            AppError::Embedding(e) => {
                tracing::error!("Embedding capability failed: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "EMBEDDING_UNAVAILABLE",
                    "The embedding service is unavailable, try again".to_string(),
                )
            }
            AppError::Classification(msg) => {
                tracing::error!("Classification failed: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CLASSIFICATION_UNAVAILABLE",
                    "Intent classification is unavailable, try again".to_string(),
                )
            }
            AppError::Completion(e) => {
                tracing::error!("Completion capability failed: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "COMPLETION_UNAVAILABLE",
                    "The completion service is unavailable, try again".to_string(),
                )
            }
            AppError::VectorStore(e) => match e {
                VectorStoreError::UnknownCollection(name) => (
                    StatusCode::NOT_FOUND,
                    "UNKNOWN_COLLECTION",
                    format!("Unknown collection '{name}'"),
                ),
                VectorStoreError::DimensionMismatch { expected, got } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "DIMENSION_MISMATCH",
                    format!(
                        "Vector dimension {got} does not match collection dimension {expected}"
                    ),
                ),
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
