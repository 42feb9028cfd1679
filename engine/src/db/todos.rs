/// Todo persistence operations
///
/// Every operation runs in its own transaction and commits before returning,
/// so a tool call is either fully applied or not applied at all.
/// All queries use parameterized queries for SQL injection prevention.
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Todo record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: i64,
    pub text: String,
    /// Unix seconds
    pub created_at: i64,
}

impl TodoItem {
    fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            text: row.get("todo"),
            created_at: row.get("created_at"),
        }
    }
}

fn store_error(context: &str) -> impl FnOnce(sqlx::Error) -> EngineError + '_ {
    move |e| EngineError::StoreUnavailable(format!("{}: {}", context, e))
}

/// Todo repository for database operations
#[derive(Clone)]
pub struct TodoRepository {
    pool: SqlitePool,
}

impl TodoRepository {
    /// Create a new todo repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new todo and return its id
    ///
    /// The text is stored exactly as given; it only has to contain something
    /// other than whitespace.
    pub async fn create_todo(&self, text: &str) -> Result<i64, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::Validation(
                "Todo text cannot be empty".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        let result = sqlx::query("INSERT INTO todos (todo) VALUES (?)")
            .bind(text)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to create todo"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit todo"))?;

        let id = result.last_insert_rowid();
        debug!("Created todo {}", id);
        Ok(id)
    }

    /// Get all todos in insertion order
    pub async fn get_all_todos(&self) -> Result<Vec<TodoItem>, EngineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        let rows = sqlx::query("SELECT id, todo, created_at FROM todos ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await
            .map_err(store_error("Failed to fetch todos"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit read"))?;

        Ok(rows.iter().map(TodoItem::from_row).collect())
    }

    /// Get a single todo by id
    pub async fn get_todo(&self, id: i64) -> Result<Option<TodoItem>, EngineError> {
        let row = sqlx::query("SELECT id, todo, created_at FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error("Failed to fetch todo"))?;

        Ok(row.as_ref().map(TodoItem::from_row))
    }

    /// Delete a todo by id
    ///
    /// Deleting an id that doesn't exist is a no-op. Returns whether a row
    /// was removed.
    pub async fn delete_todo_by_id(&self, id: i64) -> Result<bool, EngineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to delete todo"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit delete"))?;

        let deleted = result.rows_affected() > 0;
        debug!("Delete todo {}: removed={}", id, deleted);
        Ok(deleted)
    }

    /// Case-insensitive substring search over todo text
    ///
    /// Matching uses Unicode lowercasing on both sides, so `éclair` finds
    /// `Éclair kaufen`. `%` and `_` in the query match literally.
    pub async fn search_todo(&self, query: &str) -> Result<Vec<TodoItem>, EngineError> {
        if query.is_empty() {
            return Err(EngineError::Validation(
                "Search text cannot be empty".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        // SQLite's lower() only folds ASCII
        let rows = sqlx::query("SELECT id, todo, created_at FROM todos ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await
            .map_err(store_error("Failed to search todos"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit read"))?;

        let needle = query.to_lowercase();
        let hits: Vec<TodoItem> = rows
            .iter()
            .map(TodoItem::from_row)
            .filter(|item| item.text.to_lowercase().contains(&needle))
            .collect();

        debug!("Search {:?}: {} hit(s)", query, hits.len());
        Ok(hits)
    }
}
