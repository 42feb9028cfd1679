//! Agent Core
//!
//! This module implements the per-turn agent loop. A turn moves through a
//! small state machine:
//!
//! ```text
//! AwaitingUser → AwaitingModel ⇄ Dispatching
//!                     │
//!                     ├─→ Done     (model emitted an output)
//!                     └─→ Aborted  (turn-local failure)
//! ```
//!
//! 1. Append the user entry to history
//! 2. Render the (windowed) history, call the model under a timeout,
//!    extract one action from the reply
//! 3. Append the action to history as an assistant entry
//! 4. Act on it: return an output, dispatch a tool call and append the
//!    observation, or note a plan or observation and ask again
//!
//! # Limits
//!
//! - `max_retries` rejected replies (no JSON, bad shape, timeout) per turn
//! - `max_iterations` model calls per turn
//! - `llm_timeout_secs` per model call
//!
//! Aborts end only the current turn; history recorded so far is kept.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::llm::{CompletionRequest, LLMProvider};
use crate::tools::ToolRegistry;
use sdk::errors::EngineError;

use super::action::{Action, ActionKind, ConversationEntry};
use super::codec;
use super::WorkingMemory;

/// Injected when the model reports an observation nobody asked for
pub const SPURIOUS_OBSERVATION_NOTICE: &str =
    "No action was run, so there is nothing to observe. Reply with an action or an output.";

/// Where a turn currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingUser,
    AwaitingModel,
    Dispatching,
    Done,
    Aborted,
}

/// Result of one completed turn
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Turn ID, also recorded on the turn's tracing span
    pub turn_id: String,

    /// The model's final reply
    pub output: String,

    /// Model calls made, including rejected ones
    pub model_calls: usize,

    /// Tool calls dispatched
    pub tool_calls: usize,

    /// Replies rejected and re-requested
    pub retries: usize,

    /// Duration in milliseconds
    pub duration_ms: i64,
}

/// Per-turn counters
#[derive(Debug, Default)]
struct TurnCounters {
    model_calls: usize,
    tool_calls: usize,
    retries: usize,
}

/// Agent Core that runs conversation turns
pub struct AgentCore {
    /// Model back end
    provider: Arc<dyn LLMProvider>,

    /// Tool registry for dispatching tool calls
    tools: Arc<ToolRegistry>,

    /// Conversation history for the session
    memory: WorkingMemory,

    /// System prompt sent with every call
    instructions: String,

    settings: AgentConfig,

    /// Per-call model timeout
    llm_timeout: Duration,

    state: TurnState,
}

impl AgentCore {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        settings: AgentConfig,
    ) -> Self {
        let instructions = tools.system_prompt();
        Self {
            provider,
            tools,
            memory: WorkingMemory::with_window(settings.history_window),
            instructions,
            llm_timeout: settings.llm_timeout(),
            settings,
            state: TurnState::AwaitingUser,
        }
    }

    /// Override the per-call model timeout
    pub fn with_llm_timeout(mut self, llm_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self
    }

    /// Full conversation history
    pub fn history(&self) -> &[ConversationEntry] {
        self.memory.entries()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Forget the conversation
    pub fn reset(&mut self) {
        self.memory.clear();
        self.transition(TurnState::AwaitingUser);
        info!("Conversation history cleared");
    }

    /// Run one user turn to completion
    ///
    /// Returns the model's output, or the error that aborted the turn. Either
    /// way the agent is ready for the next turn afterwards.
    pub async fn process_turn(&mut self, input: &str) -> Result<TurnResult, EngineError> {
        let turn_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("turn", turn_id = %turn_id);

        let result = self.run_turn(&turn_id, input).instrument(span).await;

        // Ready for the next utterance regardless of how this one ended
        self.state = TurnState::AwaitingUser;
        result
    }

    async fn run_turn(&mut self, turn_id: &str, input: &str) -> Result<TurnResult, EngineError> {
        let start_time = Instant::now();
        let mut counters = TurnCounters::default();
        let mut last_kind: Option<ActionKind> = None;

        info!("Starting turn: {}", input);
        self.memory.push(ConversationEntry::user(input));

        loop {
            if counters.model_calls >= self.settings.max_iterations {
                error!(
                    "Turn exceeded max iterations ({})",
                    self.settings.max_iterations
                );
                return Err(self.abort(EngineError::MaxIterationsExceeded));
            }

            self.transition(TurnState::AwaitingModel);
            counters.model_calls += 1;
            debug!(
                "Model call {}/{}",
                counters.model_calls, self.settings.max_iterations
            );

            let value = match self.request_reply().await {
                Ok(value) => value,
                Err(e) => {
                    self.note_rejection(&mut counters, e)?;
                    continue;
                }
            };

            let action = match codec::decode_action(&value) {
                Ok(action) => action,
                Err(e) if e.is_retryable() => {
                    self.note_rejection(&mut counters, e)?;
                    continue;
                }
                Err(e) => {
                    // Keep the rejected reply so the history shows what happened
                    self.memory.push(ConversationEntry::assistant_raw(&value));
                    return Err(self.abort(e));
                }
            };

            self.memory.push(ConversationEntry::assistant(&action));
            let kind = action.kind();

            match action {
                Action::Output { output } => {
                    self.transition(TurnState::Done);
                    let duration_ms = start_time.elapsed().as_millis() as i64;
                    info!(
                        "Turn completed in {}ms ({} model calls, {} tool calls)",
                        duration_ms, counters.model_calls, counters.tool_calls
                    );
                    return Ok(TurnResult {
                        turn_id: turn_id.to_string(),
                        output,
                        model_calls: counters.model_calls,
                        tool_calls: counters.tool_calls,
                        retries: counters.retries,
                        duration_ms,
                    });
                }
                Action::Call {
                    function,
                    input: tool_input,
                } => {
                    self.transition(TurnState::Dispatching);
                    debug!("Tool call: {} ({})", function, tool_input);

                    let observation = match self.tools.dispatch(&function, &tool_input).await {
                        Ok(observation) => observation,
                        Err(e) => {
                            warn!("Tool {} failed: {}", function, e);
                            return Err(self.abort(e));
                        }
                    };
                    counters.tool_calls += 1;
                    self.memory.push(ConversationEntry::observation(observation));
                }
                Action::Plan { plan } => {
                    if last_kind == Some(ActionKind::Plan) {
                        debug!("Repeated plan, asking the model to act");
                    } else {
                        debug!("Plan: {}", plan);
                    }
                }
                Action::Observation { .. } => {
                    if last_kind != Some(ActionKind::Call) {
                        warn!("Observation without a preceding action; correcting the model");
                        self.memory
                            .push(ConversationEntry::observation(SPURIOUS_OBSERVATION_NOTICE));
                    }
                }
            }

            last_kind = Some(kind);
        }
    }

    /// Call the model once and extract a JSON object from the reply
    async fn request_reply(&self) -> Result<serde_json::Value, EngineError> {
        let transcript = codec::serialize_history(self.memory.transcript_window());
        let request = CompletionRequest::new(
            self.instructions.clone(),
            transcript,
            self.settings.sampling(),
        );

        let reply = match timeout(self.llm_timeout, self.provider.complete(&request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(EngineError::LLMTimeout),
        };

        codec::extract_action(&reply).ok_or_else(|| {
            EngineError::MalformedResponse(format!(
                "no JSON object in reply: {}",
                truncate(&reply, 120)
            ))
        })
    }

    /// Count a rejected reply against the retry budget, or abort the turn
    fn note_rejection(
        &mut self,
        counters: &mut TurnCounters,
        err: EngineError,
    ) -> Result<(), EngineError> {
        if !err.is_retryable() {
            error!("Model call failed: {}", err);
            return Err(self.abort(err));
        }

        counters.retries += 1;
        if counters.retries > self.settings.max_retries {
            error!("Retry budget exhausted: {}", err);
            return Err(self.abort(EngineError::RetryBudgetExhausted {
                attempts: counters.retries,
            }));
        }

        warn!(
            "Rejected model reply ({}/{}): {}",
            counters.retries, self.settings.max_retries, err
        );
        Ok(())
    }

    fn abort(&mut self, err: EngineError) -> EngineError {
        self.transition(TurnState::Aborted);
        err
    }

    fn transition(&mut self, next: TurnState) {
        if self.state != next {
            debug!("Turn state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
