//! Embedding capability — maps text to fixed-dimension vectors.
//!
//! Production backend is OpenAI `text-embedding-3-small` (1536 dimensions).
//! Tests use deterministic in-process stubs; nothing outside this module
//! talks to the embeddings API.

#[cfg(test)]
pub mod stub;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Dimension produced by `text-embedding-3-small`.
pub const EMBEDDING_DIMENSION: usize = 1536;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

/// The embedding capability. Deterministic for a fixed model version:
/// identical input yields an identical vector.
///
/// `embed_batch` preserves input order; a partial provider failure fails the
/// whole batch rather than silently skipping entries. Callers must not
/// assume retries beyond what the implementation performs internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Fixed output dimension of this provider's model.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// OpenAI embeddings client with bounded exponential backoff on 429/5xx and
/// a per-call timeout from config.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.capability_timeout_secs))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: config.openai_api_key.clone(),
        }
    }

    async fn request_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request_body = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: texts,
        };

        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbeddingError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, body);
                last_error = Some(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: EmbeddingResponse = response.json().await?;

            if parsed.data.len() != texts.len() {
                // Partial batch result: fail the whole batch, never skip silently.
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: format!(
                        "provider returned {} embeddings for {} inputs",
                        parsed.data.len(),
                        texts.len()
                    ),
                });
            }

            // The provider tags each vector with its input index; reassemble
            // in original order.
            let mut data = parsed.data;
            data.sort_by_key(|d| d.index);
            let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

            debug!("Embedded {} text(s)", vectors.len());
            return Ok(vectors);
        }

        Err(last_error.unwrap_or(EmbeddingError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::MalformedInput(
                "input text cannot be empty".to_string(),
            ));
        }
        let vectors = self.request_embeddings(&[text.to_string()]).await?;
        Ok(vectors.into_iter().next().expect("one vector per input"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::MalformedInput(
                "input batch cannot be empty".to_string(),
            ));
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::MalformedInput(format!(
                "input text at index {pos} is empty"
            )));
        }
        self.request_embeddings(texts).await
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}
