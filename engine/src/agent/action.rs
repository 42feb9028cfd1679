//! Conversation data model
//!
//! `Action` is the one structured decision the model emits per loop
//! iteration. It is a closed sum type: dispatch matches on it exhaustively,
//! and any tag outside the four shapes is rejected while decoding.
//!
//! Wire format (exact keys):
//!
//! ```text
//! {"type":"plan","plan":"<string>"}
//! {"type":"action","function":"<tool name>","input":"<string>"}
//! {"type":"observation","observation":<any>}
//! {"type":"output","output":"<string>"}
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Tags the protocol accepts in the `type` field
pub const ACTION_TYPES: [&str; 4] = ["plan", "action", "observation", "output"];

/// A model decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Narrates intent; no side effect
    Plan { plan: String },

    /// Asks for a tool call
    #[serde(rename = "action")]
    Call {
        function: String,
        #[serde(default)]
        input: Value,
    },

    /// Model-authored echo of a tool result
    Observation { observation: Value },

    /// Final reply for the user; ends the turn
    Output { output: String },
}

/// Variant of an `Action` without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Plan,
    Call,
    Observation,
    Output,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Plan => write!(f, "plan"),
            ActionKind::Call => write!(f, "action"),
            ActionKind::Observation => write!(f, "observation"),
            ActionKind::Output => write!(f, "output"),
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Plan { .. } => ActionKind::Plan,
            Action::Call { .. } => ActionKind::Call,
            Action::Observation { .. } => ActionKind::Observation,
            Action::Output { .. } => ActionKind::Output,
        }
    }

    /// Decode a JSON object into an action
    ///
    /// - missing or non-string `type`: `MalformedResponse`
    /// - a `type` outside the protocol: `UnknownActionType`
    /// - a known `type` with missing or ill-typed fields: `MalformedResponse`
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        let tag = value.get("type").and_then(Value::as_str).ok_or_else(|| {
            EngineError::MalformedResponse("JSON object has no \"type\" field".to_string())
        })?;

        if !ACTION_TYPES.contains(&tag) {
            return Err(EngineError::UnknownActionType(tag.to_string()));
        }

        serde_json::from_value(value.clone()).map_err(|e| {
            EngineError::MalformedResponse(format!("invalid \"{}\" action: {}", tag, e))
        })
    }

    /// Wire representation
    pub fn to_json(&self) -> Value {
        match self {
            Action::Plan { plan } => json!({ "type": "plan", "plan": plan }),
            Action::Call { function, input } => {
                json!({ "type": "action", "function": function, "input": input })
            }
            Action::Observation { observation } => {
                json!({ "type": "observation", "observation": observation })
            }
            Action::Output { output } => json!({ "type": "output", "output": output }),
        }
    }
}

/// Who authored a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person at the console
    User,

    /// The model
    Assistant,

    /// The agent itself: tool results and corrections
    Developer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Developer => write!(f, "developer"),
        }
    }
}

/// One history entry; `content` is always a JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

impl ConversationEntry {
    /// `{"type":"user","user":<text>}`
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            content: json!({ "type": "user", "user": text }).to_string(),
        }
    }

    /// The parsed action, re-encoded
    pub fn assistant(action: &Action) -> Self {
        Self {
            role: Role::Assistant,
            content: action.to_json().to_string(),
        }
    }

    /// A model reply that was valid JSON but not a usable action
    pub fn assistant_raw(value: &Value) -> Self {
        Self {
            role: Role::Assistant,
            content: value.to_string(),
        }
    }

    /// `{"type":"observation","observation":<value>}`
    pub fn observation(value: impl Into<Value>) -> Self {
        Self {
            role: Role::Developer,
            content: json!({ "type": "observation", "observation": value.into() }).to_string(),
        }
    }

    /// The action this entry records, if it is an assistant entry holding one
    pub fn action(&self) -> Option<Action> {
        if self.role != Role::Assistant {
            return None;
        }
        let value: Value = serde_json::from_str(&self.content).ok()?;
        Action::from_value(&value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_each_shape() {
        let plan = Action::from_value(&json!({"type": "plan", "plan": "check todos"})).unwrap();
        assert_eq!(
            plan,
            Action::Plan {
                plan: "check todos".into()
            }
        );

        let call = Action::from_value(
            &json!({"type": "action", "function": "createTodo", "input": "Buy milk"}),
        )
        .unwrap();
        assert_eq!(
            call,
            Action::Call {
                function: "createTodo".into(),
                input: json!("Buy milk")
            }
        );

        let obs = Action::from_value(&json!({"type": "observation", "observation": [1, 2]})).unwrap();
        assert_eq!(obs.kind(), ActionKind::Observation);

        let out = Action::from_value(&json!({"type": "output", "output": "Done!"})).unwrap();
        assert_eq!(out.kind(), ActionKind::Output);
    }

    #[test]
    fn test_call_input_defaults_to_null() {
        let call = Action::from_value(&json!({"type": "action", "function": "getAllTodos"})).unwrap();
        assert_eq!(
            call,
            Action::Call {
                function: "getAllTodos".into(),
                input: Value::Null
            }
        );
    }

    #[test]
    fn test_missing_type_is_malformed() {
        let err = Action::from_value(&json!({"plan": "no tag"})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));

        let err = Action::from_value(&json!({"type": 7})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = Action::from_value(&json!({"type": "dance", "moves": 3})).unwrap_err();
        assert!(matches!(err, EngineError::UnknownActionType(ref t) if t == "dance"));
    }

    #[test]
    fn test_known_type_missing_field_is_malformed() {
        let err = Action::from_value(&json!({"type": "output"})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));

        let err = Action::from_value(&json!({"type": "plan", "plan": {"nested": true}})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));
    }

    #[test]
    fn test_wire_format_keys() {
        let call = Action::Call {
            function: "searchTodo".into(),
            input: json!("milk"),
        };
        assert_eq!(
            call.to_json(),
            json!({"type": "action", "function": "searchTodo", "input": "milk"})
        );
        assert_eq!(serde_json::to_value(&call).unwrap(), call.to_json());
    }

    #[test]
    fn test_entry_constructors() {
        let user = ConversationEntry::user("Buy milk");
        assert_eq!(user.role, Role::User);
        let value: Value = serde_json::from_str(&user.content).unwrap();
        assert_eq!(value, json!({"type": "user", "user": "Buy milk"}));

        let obs = ConversationEntry::observation("3");
        assert_eq!(obs.role, Role::Developer);
        let value: Value = serde_json::from_str(&obs.content).unwrap();
        assert_eq!(value["observation"], "3");

        let action = Action::Output {
            output: "hi".into(),
        };
        let entry = ConversationEntry::assistant(&action);
        assert_eq!(entry.action(), Some(action));
        assert_eq!(user.action(), None);
    }
}
