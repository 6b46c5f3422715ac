//! Per-conversation state.
//!
//! A session is owned by exactly one active conversation and never shared
//! across users; it is created on first use and discarded with the process.
//! The conversation log is size-bounded: beyond `max_turns` records the
//! oldest are evicted, so a long-lived session cannot grow without bound.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::chat::intent::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionState {
    pub resume_text: Option<String>,
    /// Cached embedding of `resume_text`, computed lazily at the first turn
    /// that needs it and invalidated when a new resume is uploaded.
    pub resume_embedding: Option<Vec<f32>>,
    pub last_intent: Option<Intent>,
    history: VecDeque<TurnRecord>,
    max_turns: usize,
}

impl SessionState {
    pub fn new(max_turns: usize) -> Self {
        Self {
            resume_text: None,
            resume_embedding: None,
            last_intent: None,
            history: VecDeque::new(),
            max_turns,
        }
    }

    /// Replaces the session's resume and drops the stale embedding.
    pub fn set_resume(&mut self, text: String) {
        self.resume_text = Some(text);
        self.resume_embedding = None;
    }

    /// Appends one turn, evicting the oldest records beyond the bound.
    pub fn record_turn(&mut self, role: Role, text: &str) {
        self.history.push_back(TurnRecord {
            role,
            text: text.to_string(),
            at: Utc::now(),
        });
        while self.history.len() > self.max_turns {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &TurnRecord> {
        self.history.iter()
    }

    /// Renders the most recent turns for inclusion in a specialist prompt.
    pub fn render_recent_history(&self, turns: usize) -> String {
        let skip = self.history.len().saturating_sub(turns);
        self.history
            .iter()
            .skip(skip)
            .map(|t| {
                let who = match t.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{who}: {}", t.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Registry of live sessions. The outer map lock is held only for lookup;
/// each session carries its own async mutex so one session's slow turn
/// never blocks another's.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<SessionState>>>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// Looks up the session for `id`, creating a fresh one when `id` is
    /// absent or unknown. Returns the id actually used.
    pub fn get_or_create(
        &self,
        id: Option<Uuid>,
    ) -> (Uuid, Arc<tokio::sync::Mutex<SessionState>>) {
        let id = id.unwrap_or_else(Uuid::new_v4);
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        let session = sessions
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(SessionState::new(self.max_turns))))
            .clone();
        (id, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_evicts_oldest_beyond_bound() {
        let mut session = SessionState::new(3);
        for i in 0..5 {
            session.record_turn(Role::User, &format!("message {i}"));
        }
        let texts: Vec<&str> = session.history().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_set_resume_invalidates_cached_embedding() {
        let mut session = SessionState::new(10);
        session.set_resume("first resume".to_string());
        session.resume_embedding = Some(vec![1.0, 0.0]);
        session.set_resume("second resume".to_string());
        assert!(session.resume_embedding.is_none());
        assert_eq!(session.resume_text.as_deref(), Some("second resume"));
    }

    #[test]
    fn test_render_recent_history_takes_tail() {
        let mut session = SessionState::new(10);
        session.record_turn(Role::User, "find me jobs");
        session.record_turn(Role::Assistant, "here are matches");
        session.record_turn(Role::User, "tell me more");

        let rendered = session.render_recent_history(2);
        assert_eq!(rendered, "Assistant: here are matches\nUser: tell me more");
    }

    #[test]
    fn test_store_returns_same_session_for_same_id() {
        let store = SessionStore::new(10);
        let (id, first) = store.get_or_create(None);
        let (_, second) = store.get_or_create(Some(id));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_store_creates_distinct_sessions() {
        let store = SessionStore::new(10);
        let (id_a, a) = store.get_or_create(None);
        let (id_b, b) = store.get_or_create(None);
        assert_ne!(id_a, id_b);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
