//! In-process vector index over named collections.
//!
//! Each collection is an independently locked partition: mutations
//! (`upsert`, `delete`, `clear`) serialize on the collection's write lock
//! while queries share the read lock, so a query concurrent with an upsert
//! observes the old or the new entry, never a torn one.
//!
//! Brute-force cosine scan — collections here are corpus-sized (thousands of
//! chunks), not web-scale. A durable engine can replace this behind the same
//! operations.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;
use thiserror::Error;

use crate::rag::models::{ChunkMetadata, MetadataFilter};

/// Collection holding job posting chunks.
pub const JOBS_COLLECTION: &str = "jobs";
/// Collection holding resume chunks.
pub const RESUMES_COLLECTION: &str = "resumes";

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("vector dimension {got} does not match collection dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

struct StoredEntry {
    vector: Vec<f32>,
    metadata: ChunkMetadata,
    text: String,
}

#[derive(Default)]
struct Collection {
    /// Established by the first upsert; mixing dimensions is rejected.
    dimension: Option<usize>,
    /// BTreeMap keeps iteration in ascending id order, which makes
    /// equal-score ties resolve deterministically.
    entries: BTreeMap<String, StoredEntry>,
}

/// A single nearest-neighbor query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
    pub text: String,
}

pub struct VectorStore {
    collections: BTreeMap<&'static str, RwLock<Collection>>,
}

impl VectorStore {
    /// Creates the store with its two fixed partitions. Queries never cross
    /// partitions implicitly; resume-vs-jobs comparison happens in the
    /// retriever by querying `jobs` with a resume embedding.
    pub fn new() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(JOBS_COLLECTION, RwLock::new(Collection::default()));
        collections.insert(RESUMES_COLLECTION, RwLock::new(Collection::default()));
        Self { collections }
    }

    fn collection(&self, name: &str) -> Result<&RwLock<Collection>, VectorStoreError> {
        self.collections
            .get(name)
            .ok_or_else(|| VectorStoreError::UnknownCollection(name.to_string()))
    }

    /// Inserts or atomically replaces the entry for `id`.
    /// The first upsert establishes the collection's dimension.
    pub fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        metadata: ChunkMetadata,
        text: String,
    ) -> Result<(), VectorStoreError> {
        let lock = self.collection(collection)?;
        let mut guard = lock.write().expect("vector store lock poisoned");

        match guard.dimension {
            Some(expected) if expected != vector.len() => {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
            None => guard.dimension = Some(vector.len()),
            _ => {}
        }

        guard.entries.insert(
            id.to_string(),
            StoredEntry {
                vector,
                metadata,
                text,
            },
        );
        Ok(())
    }

    /// Removes one entry. Deleting a non-existent id is a no-op.
    pub fn delete(&self, collection: &str, id: &str) -> Result<(), VectorStoreError> {
        let lock = self.collection(collection)?;
        let mut guard = lock.write().expect("vector store lock poisoned");
        guard.entries.remove(id);
        Ok(())
    }

    /// Removes all entries and forgets the established dimension, so a
    /// refreshed corpus may use a different embedding model.
    pub fn clear(&self, collection: &str) -> Result<(), VectorStoreError> {
        let lock = self.collection(collection)?;
        let mut guard = lock.write().expect("vector store lock poisoned");
        guard.entries.clear();
        guard.dimension = None;
        Ok(())
    }

    pub fn len(&self, collection: &str) -> Result<usize, VectorStoreError> {
        let lock = self.collection(collection)?;
        let guard = lock.read().expect("vector store lock poisoned");
        Ok(guard.entries.len())
    }

    pub fn collection_names(&self) -> Vec<&'static str> {
        self.collections.keys().copied().collect()
    }

    /// Returns the `k` nearest entries by cosine similarity, descending,
    /// ties broken by ascending id. The metadata filter is applied BEFORE
    /// ranking, so a filtered query still returns up to `k` results.
    pub fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>, VectorStoreError> {
        let lock = self.collection(collection)?;
        let guard = lock.read().expect("vector store lock poisoned");

        if let Some(expected) = guard.dimension {
            if expected != vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
        }

        let mut hits: Vec<QueryHit> = guard
            .entries
            .iter()
            .filter(|(_, entry)| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .map(|(id, entry)| QueryHit {
                id: id.clone(),
                score: cosine_similarity(vector, &entry.vector),
                metadata: entry.metadata.clone(),
                text: entry.text.clone(),
            })
            .collect();

        // Stable sort over id-ordered input: equal scores stay in ascending
        // id order.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity in [-1, 1]. Zero-magnitude vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
