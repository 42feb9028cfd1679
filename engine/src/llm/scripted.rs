//! Scripted LLM Provider
//!
//! A pre-scripted provider for tests and offline demos. Each call to
//! `complete` pops the next step from the front of the queue, so a test can
//! spell out the exact sequence of model replies (including garbage, errors
//! and stalls) without network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CompletionRequest, LLMError, LLMProvider, Result};

/// One scripted model reply
#[derive(Debug)]
pub enum ScriptStep {
    /// Return this raw text
    Reply(String),

    /// Fail with this error
    Fail(LLMError),

    /// Sleep before answering; used to exercise call timeouts
    Stall(Duration, String),
}

/// Provider that replays a fixed script
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    steps: Arc<Mutex<VecDeque<ScriptStep>>>,
    /// Every request seen, in order
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider that answers with these replies in order
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for reply in replies {
            provider.push(ScriptStep::Reply(reply.into()));
        }
        provider
    }

    /// Append a step to the script
    pub fn push(&self, step: ScriptStep) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
    }

    /// Append a plain reply to the script
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.push(ScriptStep::Reply(reply.into()));
    }

    /// Steps not yet consumed
    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Snapshot of every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let step = self
            .steps
            .lock()
            .map_err(|_| LLMError::ProviderUnavailable("script lock poisoned".to_string()))?
            .pop_front();

        match step {
            Some(ScriptStep::Reply(text)) => Ok(text),
            Some(ScriptStep::Fail(err)) => Err(err),
            Some(ScriptStep::Stall(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(LLMError::ProviderUnavailable(
                "script exhausted".to_string(),
            )),
        }
    }
}
