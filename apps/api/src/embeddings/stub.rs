//! Deterministic embedding doubles for tests. No network, identical input
//! always yields the identical vector.

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};

/// Bag-of-keywords embedder over a fixed vocabulary: dimension `i` is 1.0
/// when vocabulary word `i` occurs in the text. Texts sharing keywords get
/// high cosine similarity, which is exactly what retrieval tests need.
pub struct KeywordStubEmbedder {
    vocabulary: Vec<String>,
}

impl KeywordStubEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Vocabulary covering the tech keywords used across the test corpus.
    pub fn tech() -> Self {
        Self::new(&[
            "python",
            "django",
            "aws",
            "rust",
            "react",
            "typescript",
            "postgresql",
            "docker",
            "kubernetes",
            "machine",
            "learning",
        ])
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        self.vocabulary
            .iter()
            .map(|word| {
                if tokens.iter().any(|t| t == word) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordStubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::MalformedInput(
                "input text cannot be empty".to_string(),
            ));
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    Err(EmbeddingError::MalformedInput(
                        "input text cannot be empty".to_string(),
                    ))
                } else {
                    Ok(self.vector_for(t))
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Embedder whose every call fails, for exercising degraded paths.
pub struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::RateLimited { retries: 3 })
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::RateLimited { retries: 3 })
    }

    fn dimension(&self) -> usize {
        0
    }
}
