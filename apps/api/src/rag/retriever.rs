//! Evidence retrieval — embeds a query and ranks collection entries by
//! cosine similarity.
//!
//! An empty result is a valid outcome ("no sufficiently relevant evidence"),
//! distinct from a retrieval failure; callers must handle the two
//! differently.

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::errors::AppError;
use crate::rag::models::{MetadataFilter, RetrievedEvidence};
use crate::vector_store::VectorStore;

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embeds `query_text` and returns up to `k` pieces of evidence from
    /// `collection`, ranked descending by score with ascending-id ties,
    /// dropping results below `min_score` when given.
    ///
    /// Deterministic for a fixed index state and embedding provider.
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: usize,
        collection: &str,
        min_score: Option<f32>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedEvidence>, AppError> {
        let query_vector = self.embedder.embed(query_text).await?;
        self.retrieve_with_embedding(&query_vector, k, collection, min_score, filter)
    }

    /// Retrieval against a precomputed query vector — used when the caller
    /// already holds an embedding (e.g. a session's cached resume vector).
    pub fn retrieve_with_embedding(
        &self,
        query_vector: &[f32],
        k: usize,
        collection: &str,
        min_score: Option<f32>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedEvidence>, AppError> {
        let hits = self.store.query(collection, query_vector, k, filter)?;

        let evidence = hits
            .into_iter()
            .filter(|hit| min_score.map_or(true, |threshold| hit.score >= threshold))
            .map(|hit| RetrievedEvidence {
                id: hit.id,
                text: hit.text,
                metadata: hit.metadata,
                score: hit.score,
            })
            .collect();

        Ok(evidence)
    }
}
