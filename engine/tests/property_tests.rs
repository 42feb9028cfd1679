use proptest::prelude::*;
use serde_json::{json, Value};

use todo_engine::agent::codec::{extract_action, parse_action, serialize_history};
use todo_engine::agent::{Action, ConversationEntry};
use todo_engine::db::Database;

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        any::<String>().prop_map(|plan| Action::Plan { plan }),
        (
            prop_oneof![
                Just("getAllTodos"),
                Just("createTodo"),
                Just("deleteTodoById"),
                Just("searchTodo")
            ],
            any::<String>()
        )
            .prop_map(|(function, input)| Action::Call {
                function: function.to_string(),
                input: json!(input),
            }),
        any::<String>().prop_map(|o| Action::Observation {
            observation: json!(o)
        }),
        any::<String>().prop_map(|output| Action::Output { output }),
    ]
}

/// Prose that can't open an object of its own
fn arb_prose() -> impl Strategy<Value = String> {
    "[^{]{0,40}"
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn test_extract_recovers_embedded_action(
        action in arb_action(),
        before in arb_prose(),
        after in ".{0,40}",
    ) {
        let reply = format!("{}{}{}", before, action.to_json(), after);

        prop_assert_eq!(extract_action(&reply), Some(action.to_json()));
        prop_assert_eq!(parse_action(&reply).unwrap(), action);
    }

    #[test]
    fn test_extract_rejects_truncated_objects(action in arb_action(), cut in 1usize..20) {
        let encoded = action.to_json().to_string();
        let mut end = encoded.len().saturating_sub(cut).max(1);
        while !encoded.is_char_boundary(end) {
            end -= 1;
        }

        prop_assert_eq!(extract_action(&encoded[..end]), None);
    }

    #[test]
    fn test_extract_without_brace_is_none(text in "[^{]*") {
        prop_assert_eq!(extract_action(&text), None);
    }

    #[test]
    fn test_serialize_history_one_line_per_entry(
        texts in prop::collection::vec("[^\r\n]{0,30}", 0..10),
    ) {
        let entries: Vec<ConversationEntry> =
            texts.iter().map(|t| ConversationEntry::user(t)).collect();
        let transcript = serialize_history(&entries);

        prop_assert_eq!(transcript.matches('\n').count(), entries.len());
        for (line, text) in transcript.lines().zip(&texts) {
            prop_assert_eq!(line, format!("User: {}", text));
        }
    }

    #[test]
    fn test_serialize_history_never_fails_on_garbage(content in ".*") {
        let entries = vec![
            ConversationEntry { role: todo_engine::agent::Role::User, content: content.clone() },
            ConversationEntry { role: todo_engine::agent::Role::Developer, content },
        ];
        let transcript = serialize_history(&entries);
        prop_assert!(transcript.starts_with("User: "));
        prop_assert!(transcript.contains("Observation: "));
    }

    #[test]
    fn test_observation_structured_values_render_as_json(ids in prop::collection::vec(1i64..1000, 0..5)) {
        let value: Value = ids.iter().map(|id| json!({"id": id, "todo": "x"})).collect();
        let transcript = serialize_history(&[ConversationEntry::observation(value.clone())]);
        prop_assert_eq!(transcript, format!("Observation: {}\n", value));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_created_todo_is_listed_verbatim(text in "[a-zA-Z0-9 %_']{0,30}[a-zA-Z0-9]") {
        runtime().block_on(async {
            let db = Database::in_memory().await.unwrap();
            let todos = db.todos();

            let id = todos.create_todo(&text).await.unwrap();
            let second = todos.create_todo(&text).await.unwrap();
            prop_assert_ne!(id, second);

            let all = todos.get_all_todos().await.unwrap();
            prop_assert!(all.iter().any(|item| item.id == id && item.text == text));
            Ok(())
        })?;
    }

    #[test]
    fn test_delete_twice_never_errors(count in 1usize..5, target in 0i64..10) {
        runtime().block_on(async {
            let db = Database::in_memory().await.unwrap();
            let todos = db.todos();
            for i in 0..count {
                todos.create_todo(&format!("todo {}", i)).await.unwrap();
            }

            let first = todos.delete_todo_by_id(target).await.unwrap();
            let second = todos.delete_todo_by_id(target).await.unwrap();
            prop_assert_eq!(first, target >= 1 && target as usize <= count);
            prop_assert!(!second);
            Ok(())
        })?;
    }

    #[test]
    fn test_search_is_case_insensitive_substring(
        texts in prop::collection::vec("[a-zA-ZéÉöÖüÜßçÇ%_ ]{1,12}", 1..6),
        query in "[a-zA-ZéÉöÖüÜßçÇ%_]{1,3}",
    ) {
        runtime().block_on(async {
            let db = Database::in_memory().await.unwrap();
            let todos = db.todos();
            for text in &texts {
                todos.create_todo(text).await.ok();
            }

            let expected: Vec<String> = todos
                .get_all_todos()
                .await
                .unwrap()
                .into_iter()
                .map(|item| item.text)
                .filter(|text| text.to_lowercase().contains(&query.to_lowercase()))
                .collect();

            let found: Vec<String> = todos
                .search_todo(&query)
                .await
                .unwrap()
                .into_iter()
                .map(|item| item.text)
                .collect();

            prop_assert_eq!(found, expected);
            Ok(())
        })?;
    }
}
