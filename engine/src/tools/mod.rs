//! Tool Registry
//!
//! The fixed set of operations the model may invoke. Each tool takes the
//! single `input` value of an `action` and returns a string observation:
//! ids as decimal text, item lists as a JSON array of `{"id","todo"}`.

pub mod prompt;

pub use prompt::PROMPT_VERSION;

use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::db::{TodoItem, TodoRepository};
use sdk::errors::EngineError;

/// The four tool names, exactly as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetAllTodos,
    CreateTodo,
    DeleteTodoById,
    SearchTodo,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::GetAllTodos,
        ToolName::CreateTodo,
        ToolName::DeleteTodoById,
        ToolName::SearchTodo,
    ];

    /// Case-sensitive lookup
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| EngineError::UnknownTool(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetAllTodos => "getAllTodos",
            ToolName::CreateTodo => "createTodo",
            ToolName::DeleteTodoById => "deleteTodoById",
            ToolName::SearchTodo => "searchTodo",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry of the todo tools, bound to one store.
pub struct ToolRegistry {
    todos: TodoRepository,
}

impl ToolRegistry {
    pub fn new(todos: TodoRepository) -> Self {
        Self { todos }
    }

    /// Dispatch a tool call by name.
    ///
    /// Unknown names fail with `UnknownTool`; bad inputs with `Validation`;
    /// database failures with `StoreUnavailable`.
    pub async fn dispatch(&self, name: &str, input: &Value) -> Result<String, EngineError> {
        let tool = ToolName::parse(name).map_err(|e| {
            warn!("Unknown tool requested: {}", name);
            e
        })?;
        debug!("Dispatching tool '{}' with input: {}", tool, input);

        match tool {
            ToolName::GetAllTodos => {
                let items = self.todos.get_all_todos().await?;
                Ok(render_items(&items))
            }
            ToolName::CreateTodo => {
                let text = input.as_str().ok_or_else(|| {
                    EngineError::Validation("Todo text must be a string".to_string())
                })?;
                let id = self.todos.create_todo(text).await?;
                Ok(id.to_string())
            }
            ToolName::DeleteTodoById => {
                let id = parse_todo_id(input)?;
                let deleted = self.todos.delete_todo_by_id(id).await?;
                Ok(if deleted {
                    format!("Deleted todo {}", id)
                } else {
                    format!("No todo with id {}", id)
                })
            }
            ToolName::SearchTodo => {
                let query = match input {
                    Value::String(s) => s.as_str(),
                    Value::Null => "",
                    _ => {
                        return Err(EngineError::Validation(
                            "Search text must be a string".to_string(),
                        ))
                    }
                };
                if query.is_empty() {
                    return Err(EngineError::Validation(
                        "Search text cannot be empty".to_string(),
                    ));
                }
                let items = self.todos.search_todo(query).await?;
                Ok(render_items(&items))
            }
        }
    }

    /// Instructions sent as the system prompt on every model call
    pub fn system_prompt(&self) -> String {
        prompt::system_prompt()
    }
}

/// Accepts integers and strings holding an integer
fn parse_todo_id(input: &Value) -> Result<i64, EngineError> {
    let not_a_number = || EngineError::Validation("Todo ID must be a number".to_string());
    match input {
        Value::Null => Err(EngineError::Validation(
            "Todo ID cannot be empty".to_string(),
        )),
        Value::Number(n) => n.as_i64().ok_or_else(not_a_number),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_a_number()),
        _ => Err(not_a_number()),
    }
}

/// `[{"id":1,"todo":"Buy milk"}, ...]`
fn render_items(items: &[TodoItem]) -> String {
    Value::Array(
        items
            .iter()
            .map(|item| json!({ "id": item.id, "todo": item.text }))
            .collect(),
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_registry() -> (Database, ToolRegistry) {
        let db = Database::in_memory().await.unwrap();
        let registry = ToolRegistry::new(db.todos());
        (db, registry)
    }

    #[test]
    fn test_tool_names_are_case_sensitive() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()).unwrap(), tool);
        }
        assert!(matches!(
            ToolName::parse("getalltodos"),
            Err(EngineError::UnknownTool(_))
        ));
        assert!(matches!(
            ToolName::parse("doStuff"),
            Err(EngineError::UnknownTool(ref n)) if n == "doStuff"
        ));
    }

    #[test]
    fn test_parse_todo_id() {
        assert_eq!(parse_todo_id(&json!(3)).unwrap(), 3);
        assert_eq!(parse_todo_id(&json!("42")).unwrap(), 42);
        assert_eq!(parse_todo_id(&json!(" 7 ")).unwrap(), 7);

        let err = parse_todo_id(&Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Todo ID cannot be empty");

        for bad in [json!("abc"), json!(""), json!(1.5), json!([1]), json!(true)] {
            assert!(matches!(
                parse_todo_id(&bad),
                Err(EngineError::Validation(ref m)) if m == "Todo ID must be a number"
            ));
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (_db, registry) = setup_registry().await;

        let id = registry
            .dispatch("createTodo", &json!("Buy milk"))
            .await
            .unwrap();
        assert_eq!(id, "1");

        let listing = registry.dispatch("getAllTodos", &json!("")).await.unwrap();
        assert_eq!(listing, r#"[{"id":1,"todo":"Buy milk"}]"#);
    }

    #[tokio::test]
    async fn test_create_requires_string() {
        let (_db, registry) = setup_registry().await;

        let err = registry.dispatch("createTodo", &json!(5)).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = registry.dispatch("createTodo", &json!("  ")).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_reports_outcome() {
        let (_db, registry) = setup_registry().await;
        registry.dispatch("createTodo", &json!("a")).await.unwrap();

        assert_eq!(
            registry.dispatch("deleteTodoById", &json!("1")).await.unwrap(),
            "Deleted todo 1"
        );
        assert_eq!(
            registry.dispatch("deleteTodoById", &json!(1)).await.unwrap(),
            "No todo with id 1"
        );
    }

    #[tokio::test]
    async fn test_search() {
        let (_db, registry) = setup_registry().await;
        registry.dispatch("createTodo", &json!("Buy milk")).await.unwrap();
        registry.dispatch("createTodo", &json!("Walk dog")).await.unwrap();

        let found = registry.dispatch("searchTodo", &json!("MILK")).await.unwrap();
        assert_eq!(found, r#"[{"id":1,"todo":"Buy milk"}]"#);

        let none = registry.dispatch("searchTodo", &json!("cat")).await.unwrap();
        assert_eq!(none, "[]");

        for bad in [json!(""), Value::Null, json!(3)] {
            assert!(matches!(
                registry.dispatch("searchTodo", &bad).await,
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_db, registry) = setup_registry().await;
        let err = registry.dispatch("doStuff", &json!("")).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownTool(_)));
    }
}
