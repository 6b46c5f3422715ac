//! Completion capability — the single point of entry for all chat-model calls.
//!
//! ARCHITECTURAL RULE: no other module may call a completion provider
//! directly. Specialists bind to `Arc<dyn CompletionCapability>` and never to
//! a concrete provider type; the provider identity ("openai" | "groq") is a
//! configuration value resolved once at startup.

#[cfg(test)]
pub mod stub;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Completion was blocked by the provider's content filter")]
    ContentFiltered,

    #[error("Completion returned empty content")]
    EmptyContent,
}

/// The completion capability every specialist reasons through.
///
/// Implementations must apply their own bounded retries and per-call timeout;
/// callers treat a returned error as retries-exhausted and degrade.
#[async_trait]
pub trait CompletionCapability: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// OpenAI-compatible chat-completions client (OpenAI and Groq speak the same
/// wire format). Wraps the API with bounded exponential backoff on 429/5xx.
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    api_url: &'static str,
    model: String,
    api_key: String,
}

impl ChatCompletionClient {
    /// Builds a client for the provider named in config.
    /// `Config::validate` has already rejected unknown providers and a
    /// missing Groq key, so this cannot mis-select.
    pub fn from_config(config: &Config) -> Self {
        let (api_url, api_key) = match config.completion_provider.as_str() {
            "groq" => (
                GROQ_CHAT_URL,
                config
                    .groq_api_key
                    .clone()
                    .unwrap_or_else(|| config.openai_api_key.clone()),
            ),
            _ => (OPENAI_CHAT_URL, config.openai_api_key.clone()),
        };

        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.capability_timeout_secs))
                .build()
                .expect("Failed to build HTTP client"),
            api_url,
            model: config.completion_model.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl CompletionCapability for ChatCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let request_body = ChatRequest {
            model: &self.model,
            max_tokens,
            temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut last_error: Option<CompletionError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Completion call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.api_url)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(CompletionError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Completion API returned {}: {}", status, body);
                last_error = Some(CompletionError::Api {
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
                return Err(CompletionError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let chat_response: ChatResponse = response.json().await?;
            let choice = chat_response
                .choices
                .into_iter()
                .next()
                .ok_or(CompletionError::EmptyContent)?;

            if choice.finish_reason.as_deref() == Some("content_filter") {
                return Err(CompletionError::ContentFiltered);
            }

            let text = choice.message.content.ok_or(CompletionError::EmptyContent)?;
            if text.trim().is_empty() {
                return Err(CompletionError::EmptyContent);
            }

            debug!("Completion call succeeded ({} chars)", text.len());
            return Ok(text);
        }

        Err(last_error.unwrap_or(CompletionError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
/// Used by callers that instruct the model to return bare JSON but must
/// tolerate a fenced reply.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
