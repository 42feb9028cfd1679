//! Protocol codec
//!
//! Two directions:
//! - history → transcript: each entry becomes one role-prefixed line, with
//!   the JSON envelope unwrapped so the model reads plain text;
//! - model reply → action: the first balanced `{...}` object is cut out of
//!   whatever prose surrounds it and decoded.

use sdk::errors::EngineError;
use serde_json::Value;

use super::action::{Action, ConversationEntry, Role};

/// Render history as the transcript sent to the model
///
/// Never fails: content that isn't the expected JSON envelope is rendered
/// raw.
pub fn serialize_history(entries: &[ConversationEntry]) -> String {
    let mut transcript = String::new();
    for entry in entries {
        transcript.push_str(&render_entry(entry));
        transcript.push('\n');
    }
    transcript
}

/// Render a single entry without the trailing newline
pub fn render_entry(entry: &ConversationEntry) -> String {
    match entry.role {
        Role::User => format!("User: {}", unwrap_field(&entry.content, "user")),
        Role::Assistant => format!("Assistant: {}", entry.content),
        Role::Developer => format!("Observation: {}", unwrap_field(&entry.content, "observation")),
    }
}

/// Pull `field` out of a JSON object; strings render bare, anything else as
/// JSON. Falls back to the raw content.
fn unwrap_field(content: &str, field: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => match map.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => content.to_string(),
        },
        _ => content.to_string(),
    }
}

/// Find the first JSON object embedded in `response`
///
/// Scans to the first `{`, then matches braces (ignoring braces inside
/// string literals) to its partner and parses that slice. Returns `None`
/// when there is no `{`, the object never closes, or the slice isn't JSON.
pub fn extract_action(response: &str) -> Option<Value> {
    let start = response.find('{')?;
    let candidate = extract_balanced_json(&response[start..])?;
    serde_json::from_str(candidate).ok()
}

/// Decode an extracted object into an `Action`
pub fn decode_action(value: &Value) -> Result<Action, EngineError> {
    Action::from_value(value)
}

/// Extract the reply and decode it into an `Action`
pub fn parse_action(response: &str) -> Result<Action, EngineError> {
    let value = extract_action(response).ok_or_else(|| {
        EngineError::MalformedResponse("no balanced JSON object in reply".to_string())
    })?;
    decode_action(&value)
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_history_unwraps_envelopes() {
        let entries = vec![
            ConversationEntry::user("Buy milk"),
            ConversationEntry::assistant(&Action::Call {
                function: "createTodo".into(),
                input: json!("Buy milk"),
            }),
            ConversationEntry::observation("1"),
        ];

        let transcript = serialize_history(&entries);
        let lines: Vec<&str> = transcript.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "User: Buy milk");
        assert!(lines[1].starts_with("Assistant: {"));
        assert!(lines[1].contains("\"function\":\"createTodo\""));
        assert_eq!(lines[2], "Observation: 1");
        assert!(transcript.ends_with('\n'));
    }

    #[test]
    fn test_structured_observation_renders_as_json() {
        let entry = ConversationEntry::observation(json!([{"id": 1, "todo": "Buy milk"}]));
        assert_eq!(
            render_entry(&entry),
            r#"Observation: [{"id":1,"todo":"Buy milk"}]"#
        );
    }

    #[test]
    fn test_malformed_content_falls_back_to_raw() {
        let entry = ConversationEntry {
            role: Role::User,
            content: "not json at all".into(),
        };
        assert_eq!(render_entry(&entry), "User: not json at all");

        let entry = ConversationEntry {
            role: Role::Developer,
            content: r#"{"other": 1}"#.into(),
        };
        assert_eq!(render_entry(&entry), r#"Observation: {"other": 1}"#);
    }

    #[test]
    fn test_extract_from_prose() {
        let reply = r#"Sure! Here is my answer: {"type": "output", "output": "Done"} Hope that helps."#;
        assert_eq!(
            extract_action(reply),
            Some(json!({"type": "output", "output": "Done"}))
        );
    }

    #[test]
    fn test_extract_takes_first_object_only() {
        let reply = r#"{"type":"plan","plan":"a"}
{"type":"action","function":"getAllTodos","input":""}"#;
        assert_eq!(
            extract_action(reply),
            Some(json!({"type": "plan", "plan": "a"}))
        );
    }

    #[test]
    fn test_extract_nested_and_braces_in_strings() {
        let reply = r#"{"type":"observation","observation":{"items":[{"id":1}]},"note":"a } brace"}"#;
        let value = extract_action(reply).unwrap();
        assert_eq!(value["observation"]["items"][0]["id"], 1);
        assert_eq!(value["note"], "a } brace");
    }

    #[test]
    fn test_extract_rejects_absent_or_unbalanced() {
        assert_eq!(extract_action("no json here"), None);
        assert_eq!(extract_action(r#"{"type": "plan", "plan": "cut off"#), None);
        assert_eq!(extract_action("{not json}"), None);
        assert_eq!(extract_action(""), None);
    }

    #[test]
    fn test_parse_action_errors() {
        assert!(matches!(
            parse_action("nothing"),
            Err(EngineError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_action(r#"{"type":"sing"}"#),
            Err(EngineError::UnknownActionType(_))
        ));
        assert_eq!(
            parse_action(r#"```json
{"type":"output","output":"ok"}
```"#)
            .unwrap(),
            Action::Output { output: "ok".into() }
        );
    }
}
