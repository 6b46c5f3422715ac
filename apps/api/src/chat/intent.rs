//! Intent routing — the supervisor that decides which specialist handles an
//! utterance.
//!
//! Routing is layered: a deterministic keyword pass first (cheap, covers the
//! common phrasings), then an LLM classifier fallback constrained to the
//! closed intent set. The router never errors and never invents an intent
//! outside the set: a classifier failure or an out-of-set answer falls back
//! to the session's last intent, then to `general`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chat::prompts::{INTENT_CLASSIFIER_PROMPT_TEMPLATE, INTENT_CLASSIFIER_SYSTEM};
use crate::chat::session::SessionState;
use crate::llm_client::{strip_json_fences, CompletionCapability};

/// The closed intent set. Out-of-set classifier output is rejected at
/// deserialization and treated as a classification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    General,
    JobMatch,
    ResumeReview,
    InterviewPrep,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::General => "general",
            Intent::JobMatch => "job_match",
            Intent::ResumeReview => "resume_review",
            Intent::InterviewPrep => "interview_prep",
        }
    }
}

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "howdy",
    "greetings",
];

const CASUAL: &[&str] = &[
    "how are you",
    "whats up",
    "what's up",
    "thanks",
    "thank you",
    "bye",
    "goodbye",
    "ok",
    "okay",
    "yes",
    "no",
];

const JOB_MATCH_PHRASES: &[&str] = &[
    "find job",
    "find me job",
    "search job",
    "match job",
    "matching job",
    "show job",
    "get job",
    "jobs for",
    "jobs that match",
];

const RESUME_PHRASES: &[&str] = &[
    "review resume",
    "review my resume",
    "check resume",
    "improve resume",
    "feedback on resume",
    "resume review",
    "resume feedback",
];

const INTERVIEW_PHRASES: &[&str] = &[
    "interview prep",
    "interview question",
    "prepare interview",
    "prepare for an interview",
    "interview help",
    "practice interview",
];

const JOB_WORDS: &[&str] = &[
    "job", "jobs", "position", "positions", "role", "roles", "opening", "vacancy",
];

#[derive(Debug, Deserialize)]
struct Classification {
    intent: Intent,
    confidence: f32,
}

pub struct IntentRouter {
    completion: Arc<dyn CompletionCapability>,
    confidence_threshold: f32,
}

impl IntentRouter {
    pub fn new(completion: Arc<dyn CompletionCapability>, confidence_threshold: f32) -> Self {
        Self {
            completion,
            confidence_threshold,
        }
    }

    /// Classifies `utterance` and records the transition into
    /// `session.last_intent`. Re-entered every turn; there is no terminal
    /// state.
    pub async fn route(&self, utterance: &str, session: &mut SessionState) -> Intent {
        let intent = match rule_based_intent(utterance) {
            Some(intent) => intent,
            None => match self.classify(utterance).await {
                Some((intent, confidence)) if confidence >= self.confidence_threshold => {
                    debug!(
                        "Classifier routed to {} (confidence {confidence:.2})",
                        intent.as_str()
                    );
                    intent
                }
                Some((intent, confidence)) => {
                    debug!(
                        "Classifier confidence {confidence:.2} below threshold for {}, falling back",
                        intent.as_str()
                    );
                    session.last_intent.unwrap_or(Intent::General)
                }
                None => session.last_intent.unwrap_or(Intent::General),
            },
        };

        session.last_intent = Some(intent);
        intent
    }

    /// LLM classifier fallback. Returns `None` on any failure — capability
    /// error, unparseable output, out-of-set intent, or a confidence outside
    /// [0, 1] — so the caller takes the fallback path instead of surfacing
    /// an error to the user.
    async fn classify(&self, utterance: &str) -> Option<(Intent, f32)> {
        let prompt = INTENT_CLASSIFIER_PROMPT_TEMPLATE.replace("{utterance}", utterance);
        let raw = match self
            .completion
            .complete(INTENT_CLASSIFIER_SYSTEM, &prompt, 0.1, 50)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Intent classification call failed: {e}");
                return None;
            }
        };

        let parsed: Classification = match serde_json::from_str(strip_json_fences(&raw)) {
            Ok(c) => c,
            Err(e) => {
                warn!("Intent classifier returned unusable output: {e}");
                return None;
            }
        };

        if !(0.0..=1.0).contains(&parsed.confidence) {
            warn!(
                "Intent classifier returned out-of-range confidence {}",
                parsed.confidence
            );
            return None;
        }

        Some((parsed.intent, parsed.confidence))
    }
}

/// Deterministic keyword pass, ported phrase-for-phrase from the routing
/// rules this service replaces. Returns `None` when inconclusive.
fn rule_based_intent(utterance: &str) -> Option<Intent> {
    let lower = utterance.trim().to_lowercase();

    if lower.is_empty() {
        return Some(Intent::General);
    }

    // Short greetings and conversational filler stay with the general
    // assistant.
    if lower.split_whitespace().count() <= 3 {
        if GREETINGS.iter().any(|g| lower.contains(g)) {
            return Some(Intent::General);
        }
        if CASUAL.iter().any(|c| lower.contains(c)) {
            return Some(Intent::General);
        }
    }

    // Phrase matches first, most reliable.
    if JOB_MATCH_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(Intent::JobMatch);
    }
    if RESUME_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(Intent::ResumeReview);
    }
    if INTERVIEW_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(Intent::InterviewPrep);
    }

    // Single-word checks, in precedence order.
    if lower.contains("resume") && !lower.contains("job") {
        return Some(Intent::ResumeReview);
    }
    if lower.contains("interview") {
        return Some(Intent::InterviewPrep);
    }
    if JOB_WORDS
        .iter()
        .any(|w| lower.split_whitespace().any(|t| t.trim_matches(|c: char| !c.is_alphanumeric()) == *w))
    {
        return Some(Intent::JobMatch);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::stub::{StubCompletion, UnavailableCompletion};

    fn router_with(completion: Arc<dyn CompletionCapability>) -> IntentRouter {
        IntentRouter::new(completion, 0.6)
    }

    fn session() -> SessionState {
        SessionState::new(10)
    }

    #[tokio::test]
    async fn test_greeting_routes_to_general() {
        let router = router_with(Arc::new(UnavailableCompletion::new()));
        let mut s = session();
        assert_eq!(router.route("hello there", &mut s).await, Intent::General);
        assert_eq!(s.last_intent, Some(Intent::General));
    }

    #[tokio::test]
    async fn test_empty_utterance_routes_to_general() {
        let router = router_with(Arc::new(UnavailableCompletion::new()));
        let mut s = session();
        assert_eq!(router.route("   ", &mut s).await, Intent::General);
    }

    #[tokio::test]
    async fn test_keyword_routing_covers_each_specialist() {
        let router = router_with(Arc::new(UnavailableCompletion::new()));
        let cases = [
            ("Which jobs match my resume?", Intent::JobMatch),
            ("Can you review my resume?", Intent::ResumeReview),
            ("Help me prepare for an interview at Google", Intent::InterviewPrep),
            ("What are the best positions for a Python developer?", Intent::JobMatch),
            ("My resume needs work, can you help?", Intent::ResumeReview),
            ("Generate interview questions for a data scientist", Intent::InterviewPrep),
        ];
        for (utterance, expected) in cases {
            let mut s = session();
            assert_eq!(
                router.route(utterance, &mut s).await,
                expected,
                "misrouted: {utterance}"
            );
        }
    }

    #[tokio::test]
    async fn test_routing_is_stable_across_repeated_calls() {
        let router = router_with(Arc::new(UnavailableCompletion::new()));
        let utterance = "find me jobs in backend development";
        let first = router.route(utterance, &mut session()).await;
        let second = router.route(utterance, &mut session()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_classifier_fallback_used_when_rules_inconclusive() {
        let stub = Arc::new(StubCompletion::new(
            r#"{"intent": "resume_review", "confidence": 0.9}"#,
        ));
        let router = router_with(stub.clone());
        let mut s = session();
        let intent = router.route("can you look at what I've written?", &mut s).await;
        assert_eq!(intent, Intent::ResumeReview);
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_falls_back_to_last_intent() {
        let stub = Arc::new(StubCompletion::new(
            r#"{"intent": "resume_review", "confidence": 0.2}"#,
        ));
        let router = router_with(stub);
        let mut s = session();
        s.last_intent = Some(Intent::InterviewPrep);
        let intent = router.route("and what about the second one?", &mut s).await;
        assert_eq!(intent, Intent::InterviewPrep);
    }

    #[tokio::test]
    async fn test_low_confidence_without_history_falls_back_to_general() {
        let stub = Arc::new(StubCompletion::new(
            r#"{"intent": "job_match", "confidence": 0.1}"#,
        ));
        let router = router_with(stub);
        let mut s = session();
        let intent = router.route("hmm, not sure what I need", &mut s).await;
        assert_eq!(intent, Intent::General);
    }

    #[tokio::test]
    async fn test_out_of_set_classifier_answer_takes_fallback_path() {
        let stub = Arc::new(StubCompletion::new(
            r#"{"intent": "salary_negotiator", "confidence": 0.95}"#,
        ));
        let router = router_with(stub);
        let mut s = session();
        s.last_intent = Some(Intent::JobMatch);
        let intent = router.route("what should I do next in my career?", &mut s).await;
        assert_eq!(intent, Intent::JobMatch);
    }

    #[tokio::test]
    async fn test_classifier_failure_takes_fallback_path() {
        let router = router_with(Arc::new(UnavailableCompletion::new()));
        let mut s = session();
        let intent = router.route("what should I do next in my career?", &mut s).await;
        assert_eq!(intent, Intent::General);
    }

    #[tokio::test]
    async fn test_fenced_classifier_output_is_accepted() {
        let stub = Arc::new(StubCompletion::new(
            "```json\n{\"intent\": \"interview_prep\", \"confidence\": 0.8}\n```",
        ));
        let router = router_with(stub);
        let mut s = session();
        let intent = router.route("how do I get better at talking to people?", &mut s).await;
        assert_eq!(intent, Intent::InterviewPrep);
    }
}
