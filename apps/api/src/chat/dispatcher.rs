//! Specialist dispatch — binds a routed intent to its evidence requirements
//! and prompt template, then invokes the completion capability.
//!
//! Flow per turn: resolve specialist spec → check required inputs → retrieve
//! evidence → build bounded context → complete → record history. History is
//! appended only after the dispatch resolves (success or explicitly failed
//! outcome), so a cancelled turn leaves no partial session writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::chat::intent::Intent;
use crate::chat::prompts::{
    GENERAL_PROMPT_TEMPLATE, GENERAL_SYSTEM, INTERVIEW_PREP_PROMPT_TEMPLATE,
    INTERVIEW_PREP_SYSTEM, JOB_MATCH_PROMPT_TEMPLATE, JOB_MATCH_SYSTEM,
    RESUME_REVIEW_PROMPT_TEMPLATE, RESUME_REVIEW_SYSTEM,
};
use crate::chat::session::{Role, SessionState};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::errors::AppError;
use crate::llm_client::CompletionCapability;
use crate::rag::context_builder;
use crate::rag::models::{MetadataFilter, RetrievedEvidence};
use crate::rag::retriever::Retriever;
use crate::vector_store::{VectorStore, JOBS_COLLECTION};

/// Turns of history included in a general-assistant prompt.
const HISTORY_TURNS_IN_PROMPT: usize = 6;
/// Evidence cap for interview preparation (a few target roles, not a list).
const INTERVIEW_PREP_MAX_K: usize = 3;

/// What a specialist needs before it can reason.
struct SpecialistProfile {
    collection: Option<&'static str>,
    requires_resume: bool,
    evidence_k: usize,
    min_score: Option<f32>,
}

/// The resolved result of one turn. `missing_input` and `no_matches` are
/// normal control-flow outcomes, not errors; `unavailable` is the degraded,
/// labeled response after capability retries exhausted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    Answer {
        text: String,
        /// citation id (E1, E2, …) -> chunk id backing the claim.
        citations: BTreeMap<String, String>,
    },
    MissingInput {
        message: String,
    },
    NoMatches {
        message: String,
    },
    Unavailable {
        stage: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StructuredResponse {
    pub intent: Intent,
    pub outcome: TurnOutcome,
}

pub struct SpecialistDispatcher {
    retriever: Retriever,
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionCapability>,
    config: Config,
}

impl SpecialistDispatcher {
    pub fn new(
        retriever: Retriever,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionCapability>,
        config: Config,
    ) -> Self {
        Self {
            retriever,
            store,
            embedder,
            completion,
            config,
        }
    }

    fn profile_for(&self, intent: Intent) -> SpecialistProfile {
        match intent {
            Intent::JobMatch => SpecialistProfile {
                collection: Some(JOBS_COLLECTION),
                requires_resume: true,
                evidence_k: self.config.top_k,
                min_score: Some(self.config.min_match_score),
            },
            Intent::ResumeReview => SpecialistProfile {
                collection: None,
                requires_resume: true,
                evidence_k: 0,
                min_score: None,
            },
            Intent::InterviewPrep => SpecialistProfile {
                collection: Some(JOBS_COLLECTION),
                requires_resume: true,
                evidence_k: self.config.top_k.clamp(1, INTERVIEW_PREP_MAX_K),
                min_score: None,
            },
            Intent::General => SpecialistProfile {
                collection: None,
                requires_resume: false,
                evidence_k: 0,
                min_score: None,
            },
        }
    }

    /// Runs one turn for an already-routed intent.
    ///
    /// `target_job_id` narrows interview preparation to one posting's chunks.
    pub async fn dispatch(
        &self,
        intent: Intent,
        user_text: &str,
        target_job_id: Option<&str>,
        session: &mut SessionState,
    ) -> Result<StructuredResponse, AppError> {
        let profile = self.profile_for(intent);

        if profile.requires_resume && session.resume_text.is_none() {
            // Not an error: instruct the caller to request an upload instead
            // of invoking the completion capability with empty evidence.
            let outcome = TurnOutcome::MissingInput {
                message: "Please upload your resume first so I can work from your actual \
                          experience."
                    .to_string(),
            };
            self.record(session, user_text, &outcome);
            return Ok(StructuredResponse { intent, outcome });
        }

        let outcome = match intent {
            Intent::General => self.run_general(user_text, session).await,
            Intent::ResumeReview => self.run_resume_review(user_text, session).await,
            Intent::JobMatch | Intent::InterviewPrep => {
                self.run_evidence_specialist(intent, &profile, user_text, target_job_id, session)
                    .await?
            }
        };

        self.record(session, user_text, &outcome);
        Ok(StructuredResponse { intent, outcome })
    }

    async fn run_general(&self, user_text: &str, session: &SessionState) -> TurnOutcome {
        let prompt = GENERAL_PROMPT_TEMPLATE
            .replace("{history}", &session.render_recent_history(HISTORY_TURNS_IN_PROMPT))
            .replace("{question}", user_text);
        self.complete_or_degrade(GENERAL_SYSTEM, &prompt, BTreeMap::new())
            .await
    }

    async fn run_resume_review(&self, user_text: &str, session: &SessionState) -> TurnOutcome {
        let resume = session.resume_text.as_deref().unwrap_or_default();
        let prompt = RESUME_REVIEW_PROMPT_TEMPLATE
            .replace("{resume_text}", resume)
            .replace("{question}", user_text);
        self.complete_or_degrade(RESUME_REVIEW_SYSTEM, &prompt, BTreeMap::new())
            .await
    }

    async fn run_evidence_specialist(
        &self,
        intent: Intent,
        profile: &SpecialistProfile,
        user_text: &str,
        target_job_id: Option<&str>,
        session: &mut SessionState,
    ) -> Result<TurnOutcome, AppError> {
        let collection = profile.collection.unwrap_or(JOBS_COLLECTION);

        if self.store.len(collection)? == 0 {
            return Ok(TurnOutcome::NoMatches {
                message: "The job corpus is empty — load job postings before asking for \
                          matches."
                    .to_string(),
            });
        }

        // Cross-partition comparison is explicit: query the jobs collection
        // with the resume's embedding.
        let query_vector = match self.resume_embedding(session).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Resume embedding failed after retries: {e}");
                return Ok(TurnOutcome::Unavailable {
                    stage: "embedding".to_string(),
                    message: "Matches are unavailable right now, try again.".to_string(),
                });
            }
        };

        let filter = target_job_id.map(|id| MetadataFilter {
            source_id: Some(id.to_string()),
            ..Default::default()
        });

        let evidence = self.retriever.retrieve_with_embedding(
            &query_vector,
            profile.evidence_k,
            collection,
            profile.min_score,
            filter.as_ref(),
        )?;

        if evidence.is_empty() {
            // Honest empty outcome — never fabricate evidence.
            return Ok(TurnOutcome::NoMatches {
                message: "No sufficiently close matches found in the current job corpus."
                    .to_string(),
            });
        }

        info!(
            "{} retrieved {} evidence chunk(s), best score {:.3}",
            intent.as_str(),
            evidence.len(),
            evidence[0].score
        );

        Ok(self.complete_with_evidence(intent, user_text, session, &evidence).await)
    }

    async fn complete_with_evidence(
        &self,
        intent: Intent,
        user_text: &str,
        session: &SessionState,
        evidence: &[RetrievedEvidence],
    ) -> TurnOutcome {
        let context =
            context_builder::build(user_text, evidence, self.config.max_context_tokens);

        if context.no_evidence {
            // Budget too small for even one chunk.
            return TurnOutcome::NoMatches {
                message: "Matching postings were found but none fit the context budget."
                    .to_string(),
            };
        }

        let resume = session.resume_text.as_deref().unwrap_or_default();
        let (system, template) = match intent {
            Intent::JobMatch => (JOB_MATCH_SYSTEM, JOB_MATCH_PROMPT_TEMPLATE),
            Intent::InterviewPrep => (INTERVIEW_PREP_SYSTEM, INTERVIEW_PREP_PROMPT_TEMPLATE),
            _ => unreachable!("only evidence specialists reach here"),
        };
        let prompt = template
            .replace("{resume_text}", resume)
            .replace("{evidence}", &context.render())
            .replace("{question}", user_text);

        self.complete_or_degrade(system, &prompt, context.citations)
            .await
    }

    /// Invokes the completion capability; a failure after its internal
    /// retries becomes a labeled degraded outcome, never a fabricated
    /// answer.
    async fn complete_or_degrade(
        &self,
        system: &str,
        prompt: &str,
        citations: BTreeMap<String, String>,
    ) -> TurnOutcome {
        match self
            .completion
            .complete(
                system,
                prompt,
                self.config.agent_temperature,
                self.config.completion_max_tokens,
            )
            .await
        {
            Ok(text) => TurnOutcome::Answer { text, citations },
            Err(e) => {
                warn!("Completion failed after retries: {e}");
                TurnOutcome::Unavailable {
                    stage: "completion".to_string(),
                    message: "The assistant is unavailable right now, try again.".to_string(),
                }
            }
        }
    }

    /// Embeds the session's resume once and caches the vector for later
    /// turns; a new upload invalidates the cache.
    async fn resume_embedding(
        &self,
        session: &mut SessionState,
    ) -> Result<Vec<f32>, crate::embeddings::EmbeddingError> {
        if let Some(vector) = &session.resume_embedding {
            return Ok(vector.clone());
        }
        let text = session.resume_text.clone().unwrap_or_default();
        let vector = self.embedder.embed(&text).await?;
        session.resume_embedding = Some(vector.clone());
        Ok(vector)
    }

    fn record(&self, session: &mut SessionState, user_text: &str, outcome: &TurnOutcome) {
        session.record_turn(Role::User, user_text);
        let assistant_text = match outcome {
            TurnOutcome::Answer { text, .. } => text,
            TurnOutcome::MissingInput { message }
            | TurnOutcome::NoMatches { message }
            | TurnOutcome::Unavailable { message, .. } => message,
        };
        session.record_turn(Role::Assistant, assistant_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::stub::KeywordStubEmbedder;
    use crate::llm_client::stub::{StubCompletion, UnavailableCompletion};
    use crate::rag::models::{ChunkMetadata, SourceKind};
    use crate::vector_store::VectorStore;

    fn test_config() -> Config {
        Config {
            openai_api_key: "test".to_string(),
            completion_provider: "openai".to_string(),
            completion_model: "gpt-4o-mini".to_string(),
            groq_api_key: None,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            min_match_score: 0.6,
            max_context_tokens: 3000,
            agent_temperature: 0.7,
            completion_max_tokens: 2000,
            classifier_confidence_threshold: 0.6,
            history_max_turns: 20,
            capability_timeout_secs: 60,
            ingest_concurrency: 2,
            port: 0,
            rust_log: "info".to_string(),
        }
    }

    fn job_metadata(source_id: &str) -> ChunkMetadata {
        ChunkMetadata {
            source_kind: SourceKind::Job,
            source_id: source_id.to_string(),
            title: Some("Senior Python Developer".to_string()),
            company: Some("TechCorp".to_string()),
            sequence_index: 0,
        }
    }

    struct Fixture {
        dispatcher: SpecialistDispatcher,
        completion: Arc<StubCompletion>,
        store: Arc<VectorStore>,
        embedder: Arc<KeywordStubEmbedder>,
    }

    fn fixture() -> Fixture {
        let embedder = Arc::new(KeywordStubEmbedder::tech());
        let store = Arc::new(VectorStore::new());
        let completion = Arc::new(StubCompletion::new(
            "The strongest match is [E1], a Senior Python Developer role.",
        ));
        let retriever = Retriever::new(embedder.clone(), store.clone());
        let dispatcher = SpecialistDispatcher::new(
            retriever,
            store.clone(),
            embedder.clone(),
            completion.clone(),
            test_config(),
        );
        Fixture {
            dispatcher,
            completion,
            store,
            embedder,
        }
    }

    async fn seed_job(fixture: &Fixture, id: &str, text: &str) {
        let vector = fixture.embedder.embed(text).await.unwrap();
        fixture
            .store
            .upsert(JOBS_COLLECTION, id, vector, job_metadata(id), text.to_string())
            .unwrap();
    }

    fn session_with_resume() -> SessionState {
        let mut session = SessionState::new(20);
        session.set_resume("5 years Python, Django projects, AWS deployment".to_string());
        session
    }

    #[tokio::test]
    async fn test_job_match_cites_the_matching_posting() {
        let f = fixture();
        seed_job(
            &f,
            "j1",
            "Senior Python Developer wanted. Django and AWS experience required.",
        )
        .await;

        let mut session = session_with_resume();
        let response = f
            .dispatcher
            .dispatch(Intent::JobMatch, "which jobs fit me?", None, &mut session)
            .await
            .unwrap();

        match response.outcome {
            TurnOutcome::Answer { citations, .. } => {
                assert!(
                    citations.values().any(|chunk_id| chunk_id == "j1"),
                    "expected j1 cited, got {citations:?}"
                );
            }
            other => panic!("expected answer, got {other:?}"),
        }
        assert_eq!(f.completion.call_count(), 1);
        // History recorded after dispatch: user turn + assistant turn.
        assert_eq!(session.history().count(), 2);
    }

    #[tokio::test]
    async fn test_job_match_on_empty_corpus_is_honest() {
        let f = fixture();
        let mut session = session_with_resume();
        let response = f
            .dispatcher
            .dispatch(Intent::JobMatch, "find me jobs", None, &mut session)
            .await
            .unwrap();

        assert!(matches!(response.outcome, TurnOutcome::NoMatches { .. }));
        assert_eq!(f.completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_below_threshold_matches_yield_no_matches() {
        let f = fixture();
        // A posting with no keyword overlap with the resume.
        seed_job(&f, "j2", "Frontend Engineer: React and TypeScript.").await;

        let mut session = session_with_resume();
        let response = f
            .dispatcher
            .dispatch(Intent::JobMatch, "find me jobs", None, &mut session)
            .await
            .unwrap();

        assert!(matches!(response.outcome, TurnOutcome::NoMatches { .. }));
        assert_eq!(f.completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_review_without_resume_is_missing_input() {
        let f = fixture();
        let mut session = SessionState::new(20);
        let response = f
            .dispatcher
            .dispatch(Intent::ResumeReview, "review my resume", None, &mut session)
            .await
            .unwrap();

        assert!(matches!(response.outcome, TurnOutcome::MissingInput { .. }));
        // The completion capability is never invoked for a missing input.
        assert_eq!(f.completion.call_count(), 0);
        assert_eq!(session.history().count(), 2);
    }

    #[tokio::test]
    async fn test_resume_review_uses_resume_text_directly() {
        let f = fixture();
        let mut session = session_with_resume();
        let response = f
            .dispatcher
            .dispatch(Intent::ResumeReview, "review my resume", None, &mut session)
            .await
            .unwrap();

        match response.outcome {
            TurnOutcome::Answer { citations, .. } => assert!(citations.is_empty()),
            other => panic!("expected answer, got {other:?}"),
        }
        assert_eq!(f.completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_general_answers_without_retrieval_or_resume() {
        let f = fixture();
        let mut session = SessionState::new(20);
        let response = f
            .dispatcher
            .dispatch(Intent::General, "hello!", None, &mut session)
            .await
            .unwrap();

        assert!(matches!(response.outcome, TurnOutcome::Answer { .. }));
        assert_eq!(f.completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_completion_failure_degrades_with_stage_label() {
        let embedder = Arc::new(KeywordStubEmbedder::tech());
        let store = Arc::new(VectorStore::new());
        let completion = Arc::new(UnavailableCompletion::new());
        let retriever = Retriever::new(embedder.clone(), store.clone());
        let dispatcher = SpecialistDispatcher::new(
            retriever,
            store.clone(),
            embedder.clone(),
            completion.clone(),
            test_config(),
        );

        let vector = embedder
            .embed("Senior Python Developer, Django, AWS")
            .await
            .unwrap();
        store
            .upsert(
                JOBS_COLLECTION,
                "j1",
                vector,
                job_metadata("j1"),
                "Senior Python Developer, Django, AWS".to_string(),
            )
            .unwrap();

        let mut session = session_with_resume();
        let response = dispatcher
            .dispatch(Intent::JobMatch, "find me jobs", None, &mut session)
            .await
            .unwrap();

        match response.outcome {
            TurnOutcome::Unavailable { stage, .. } => assert_eq!(stage, "completion"),
            other => panic!("expected unavailable, got {other:?}"),
        }
        // Degraded outcome still lands in history as an explicit failure.
        assert_eq!(session.history().count(), 2);
    }

    #[tokio::test]
    async fn test_interview_prep_filter_narrows_to_target_job() {
        let f = fixture();
        seed_job(&f, "j1", "Senior Python Developer. Django, AWS.").await;
        seed_job(&f, "j2", "Python platform role. Django, AWS, Docker.").await;

        let mut session = session_with_resume();
        let response = f
            .dispatcher
            .dispatch(
                Intent::InterviewPrep,
                "prep me for an interview",
                Some("j2"),
                &mut session,
            )
            .await
            .unwrap();

        match response.outcome {
            TurnOutcome::Answer { citations, .. } => {
                assert!(citations.values().all(|chunk_id| chunk_id == "j2"));
            }
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resume_embedding_cached_across_turns() {
        let f = fixture();
        seed_job(&f, "j1", "Senior Python Developer. Django, AWS.").await;

        let mut session = session_with_resume();
        f.dispatcher
            .dispatch(Intent::JobMatch, "find me jobs", None, &mut session)
            .await
            .unwrap();
        let cached = session.resume_embedding.clone();
        assert!(cached.is_some());

        f.dispatcher
            .dispatch(Intent::JobMatch, "any more jobs?", None, &mut session)
            .await
            .unwrap();
        assert_eq!(session.resume_embedding, cached);
    }
}
