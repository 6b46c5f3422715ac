//! Context assembly — turns ranked evidence into a token-bounded, citation
//! tagged prompt block.
//!
//! Inclusion is greedy in rank order and stops once the budget would be
//! exceeded; a chunk is never truncated mid-text, so the specialist never
//! sees a corrupted citation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::rag::models::RetrievedEvidence;

/// Rough token estimate for English text.
const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// A piece of evidence admitted into the context, tagged with its citation
/// identifier (`E1`, `E2`, … — unique within one context).
#[derive(Debug, Clone, Serialize)]
pub struct CitedEvidence {
    pub citation_id: String,
    pub evidence: RetrievedEvidence,
}

/// The bounded, citation-tagged input assembled for one specialist call.
/// Built fresh per turn; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceContext {
    pub query_text: String,
    pub evidence: Vec<CitedEvidence>,
    /// citation id -> chunk id, returned to the caller so responses can be
    /// traced back to corpus entries.
    pub citations: BTreeMap<String, String>,
    /// Set when the budget admitted no evidence at all. Specialists must
    /// check this instead of proceeding as if evidence existed.
    pub no_evidence: bool,
    pub estimated_tokens: usize,
}

impl EvidenceContext {
    /// Renders the evidence section of a specialist prompt.
    pub fn render(&self) -> String {
        if self.no_evidence {
            return "(no evidence included)".to_string();
        }
        let blocks: Vec<String> = self
            .evidence
            .iter()
            .map(|cited| evidence_block(&cited.citation_id, &cited.evidence))
            .collect();
        blocks.join("\n\n")
    }
}

fn evidence_block(citation_id: &str, evidence: &RetrievedEvidence) -> String {
    let meta = &evidence.metadata;
    let mut header = format!(
        "[{citation_id}] {} {}",
        meta.source_kind, evidence.id
    );
    if let Some(title) = &meta.title {
        header.push_str(&format!(" — {title}"));
    }
    if let Some(company) = &meta.company {
        header.push_str(&format!(" at {company}"));
    }
    header.push_str(&format!(" (match {:.2})", evidence.score));
    format!("{header}\n{}", evidence.text)
}

/// Builds a context from ranked evidence under `max_tokens`.
///
/// The query's own estimate counts against the budget, so the returned
/// context as a whole never exceeds it.
pub fn build(
    query_text: &str,
    evidence: &[RetrievedEvidence],
    max_tokens: usize,
) -> EvidenceContext {
    let mut used = estimate_tokens(query_text);
    let mut included = Vec::new();
    let mut citations = BTreeMap::new();

    for item in evidence {
        let citation_id = format!("E{}", included.len() + 1);
        let cost = estimate_tokens(&evidence_block(&citation_id, item));
        if used + cost > max_tokens {
            break;
        }
        used += cost;
        citations.insert(citation_id.clone(), item.id.clone());
        included.push(CitedEvidence {
            citation_id,
            evidence: item.clone(),
        });
    }

    EvidenceContext {
        query_text: query_text.to_string(),
        no_evidence: included.is_empty(),
        evidence: included,
        citations,
        estimated_tokens: used,
    }
}
