//! Agent Loop
//!
//! The conversation model (actions and history entries), the codec that
//! turns history into a transcript and model replies into actions, and the
//! per-turn loop that ties them to the model and the tool registry.

pub mod action;
pub mod codec;
pub mod core;
pub mod working_memory;

pub use action::{Action, ActionKind, ConversationEntry, Role};
pub use self::core::{AgentCore, TurnResult, TurnState};
pub use working_memory::WorkingMemory;
