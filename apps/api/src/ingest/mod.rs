//! Corpus ingestion pipeline: chunk, embed, index.
//!
//! Documents are independent units of work. A document that fails any stage
//! is skipped with a recorded reason and the rest of the batch proceeds; the
//! report accounts for every input either as ingested or as skipped.
//! Embedding runs with bounded parallelism so a large batch cannot flood the
//! provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::embeddings::EmbeddingProvider;
use crate::rag::chunker::Chunker;
use crate::rag::models::{Chunk, DocumentSource, SourceKind};
use crate::vector_store::VectorStore;

/// One raw document submitted for ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub id: String,
    pub reason: String,
}

/// Ingestion summary. `documents_ingested + skipped.len()` always equals the
/// number of submitted documents.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub documents_ingested: usize,
    pub chunks_ingested: usize,
    pub skipped: Vec<SkippedDocument>,
}

#[derive(Debug, Clone)]
enum DocOutcome {
    Ingested { chunks: usize },
    Skipped { reason: String },
}

pub struct IngestPipeline {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
    concurrency: usize,
}

impl IngestPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<VectorStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingests a batch into the collection for `kind`. Never fails as a
    /// whole: per-document failures land in the report's `skipped` list.
    ///
    /// Re-ingesting an id replaces its chunks at matching positions via
    /// upsert.
    pub async fn ingest(&self, kind: SourceKind, documents: Vec<DocumentUpload>) -> IngestReport {
        let collection = kind.collection();
        let total = documents.len();
        let mut outcomes: Vec<Option<(String, DocOutcome)>> = Vec::new();
        outcomes.resize_with(total, || None);

        let mut workers: JoinSet<(usize, String, DocOutcome)> = JoinSet::new();

        for (index, doc) in documents.into_iter().enumerate() {
            if doc.text.trim().is_empty() {
                outcomes[index] = Some((
                    doc.id,
                    DocOutcome::Skipped {
                        reason: "document text is empty".to_string(),
                    },
                ));
                continue;
            }

            // Chunking is cheap and synchronous; only embed + index run on
            // the worker.
            let source = DocumentSource {
                source_kind: kind,
                source_id: doc.id.clone(),
                title: doc.title,
                company: doc.company,
            };
            let chunks = self.chunker.chunk_document(&source, &doc.text);

            while workers.len() >= self.concurrency {
                drain_one(&mut workers, &mut outcomes).await;
            }

            let embedder = self.embedder.clone();
            let store = self.store.clone();
            let id = doc.id;
            workers.spawn(async move {
                let outcome = embed_and_index(collection, chunks, embedder, store).await;
                (index, id, outcome)
            });
        }

        while !workers.is_empty() {
            drain_one(&mut workers, &mut outcomes).await;
        }

        let mut report = IngestReport {
            collection: collection.to_string(),
            documents_ingested: 0,
            chunks_ingested: 0,
            skipped: Vec::new(),
        };
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                (_, DocOutcome::Ingested { chunks }) => {
                    report.documents_ingested += 1;
                    report.chunks_ingested += chunks;
                }
                (id, DocOutcome::Skipped { reason }) => {
                    warn!("Skipped document '{id}': {reason}");
                    report.skipped.push(SkippedDocument { id, reason });
                }
            }
        }

        info!(
            "Ingested {}/{} document(s) into '{}' ({} chunks)",
            report.documents_ingested, total, collection, report.chunks_ingested
        );
        report
    }
}

async fn drain_one(
    workers: &mut JoinSet<(usize, String, DocOutcome)>,
    outcomes: &mut [Option<(String, DocOutcome)>],
) {
    if let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, id, outcome)) => outcomes[index] = Some((id, outcome)),
            Err(e) => warn!("Ingestion worker failed: {e}"),
        }
    }
}

/// Embeds one document's chunks as a single batch and indexes them. An
/// indexing failure rolls back the chunks already written for this document
/// so a document is either fully present or fully absent.
async fn embed_and_index(
    collection: &'static str,
    chunks: Vec<Chunk>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
) -> DocOutcome {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = match embedder.embed_batch(&texts).await {
        Ok(v) => v,
        Err(e) => {
            return DocOutcome::Skipped {
                reason: format!("embedding failed: {e}"),
            };
        }
    };

    let mut written: Vec<String> = Vec::with_capacity(chunks.len());
    for (chunk, vector) in chunks.into_iter().zip(vectors) {
        let chunk_id = chunk.id.clone();
        if let Err(e) = store.upsert(collection, &chunk.id, vector, chunk.metadata, chunk.text) {
            for id in &written {
                // Best effort: the collection itself is known to exist.
                let _ = store.delete(collection, id);
            }
            return DocOutcome::Skipped {
                reason: format!("indexing failed: {e}"),
            };
        }
        written.push(chunk_id);
    }

    DocOutcome::Ingested {
        chunks: written.len(),
    }
}
