//! Data models shared across the retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Which corpus partition a chunk came from. Fixed, closed set — queries
/// never cross partitions implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Resume,
    Job,
}

impl SourceKind {
    /// Name of the collection this kind of chunk lives in.
    pub fn collection(&self) -> &'static str {
        match self {
            SourceKind::Resume => crate::vector_store::RESUMES_COLLECTION,
            SourceKind::Job => crate::vector_store::JOBS_COLLECTION,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Resume => write!(f, "resume"),
            SourceKind::Job => write!(f, "job"),
        }
    }
}

/// Fixed, validated metadata record attached to every chunk. Optional fields
/// are explicit; unknown metadata is rejected at ingestion rather than
/// propagated opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_kind: SourceKind,
    /// Id of the document this chunk was split from.
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Position of this chunk within its document, from 0.
    pub sequence_index: u32,
}

/// A bounded passage of source text plus metadata. Immutable once created;
/// destroyed on corpus refresh/clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Source document descriptor handed to the chunker. The chunker propagates
/// these fields unchanged onto every derived chunk.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub source_kind: SourceKind,
    pub source_id: String,
    pub title: Option<String>,
    pub company: Option<String>,
}

/// Key/value equality constraints applied by the vector store BEFORE ranking,
/// so a filtered query still returns up to `k` results.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub source_kind: Option<SourceKind>,
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
}

impl MetadataFilter {
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(kind) = self.source_kind {
            if metadata.source_kind != kind {
                return false;
            }
        }
        if let Some(source_id) = &self.source_id {
            if &metadata.source_id != source_id {
                return false;
            }
        }
        if let Some(title) = &self.title {
            if metadata.title.as_deref() != Some(title.as_str()) {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if metadata.company.as_deref() != Some(company.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A retrieved chunk cited as support for a generated claim.
/// Score is cosine similarity in [-1, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedEvidence {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}
