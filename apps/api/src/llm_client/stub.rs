//! Completion doubles for tests. Track call counts so tests can assert the
//! completion capability was (or was not) invoked.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{CompletionCapability, CompletionError};

/// Returns a canned response and counts invocations.
pub struct StubCompletion {
    response: String,
    calls: AtomicUsize,
}

impl StubCompletion {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionCapability for StubCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Fails every call, as if retries were already exhausted.
pub struct UnavailableCompletion {
    calls: AtomicUsize,
}

impl UnavailableCompletion {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for UnavailableCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionCapability for UnavailableCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CompletionError::RateLimited { retries: 3 })
    }
}
