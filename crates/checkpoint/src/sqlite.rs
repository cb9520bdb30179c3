//! SQLite checkpoint store.
//!
//! One table, `checkpoints`, with one row per committed snapshot. The
//! autoincrement `iid` column fixes insertion order, so the newest row of a
//! thread is its authoritative state.

use std::str::FromStr;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use syllabot_core::checkpoint::{Checkpoint, CheckpointHeader, CheckpointStore};
use syllabot_core::error::CheckpointError;
use syllabot_core::message::ThreadId;
use syllabot_core::state::ConversationState;
use tracing::{debug, info};

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) a store at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| CheckpointError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to an in-memory database sees its own copy.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite checkpoint store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CheckpointError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                iid                INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id          TEXT NOT NULL,
                checkpoint_id      TEXT UNIQUE NOT NULL,
                created_at         TEXT NOT NULL,
                conversation_title TEXT,
                state              TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::MigrationFailed(format!("checkpoints table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id, iid DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::MigrationFailed(format!("thread index: {e}")))?;

        debug!("SQLite checkpoint migrations complete");
        Ok(())
    }

    fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<Checkpoint, CheckpointError> {
        let checkpoint_id: String = row
            .try_get("checkpoint_id")
            .map_err(|e| CheckpointError::QueryFailed(format!("checkpoint_id column: {e}")))?;
        let thread_id: String = row
            .try_get("thread_id")
            .map_err(|e| CheckpointError::QueryFailed(format!("thread_id column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| CheckpointError::QueryFailed(format!("created_at column: {e}")))?;
        let state_json: String = row
            .try_get("state")
            .map_err(|e| CheckpointError::QueryFailed(format!("state column: {e}")))?;

        let state: ConversationState =
            serde_json::from_str(&state_json).map_err(|e| CheckpointError::Corrupt {
                checkpoint_id: checkpoint_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Checkpoint {
            checkpoint_id,
            thread_id: ThreadId(thread_id),
            created_at: parse_timestamp(&created_at),
            state,
        })
    }
}

fn parse_timestamp(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, state: &ConversationState) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Checkpoint::new(state.clone());
        let state_json = serde_json::to_string(&checkpoint.state)
            .map_err(|e| CheckpointError::Storage(format!("State serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, checkpoint_id, created_at, conversation_title, state)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(checkpoint.thread_id.as_str())
        .bind(&checkpoint.checkpoint_id)
        .bind(checkpoint.created_at.to_rfc3339())
        .bind(&checkpoint.state.conversation_title)
        .bind(&state_json)
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(format!("INSERT failed: {e}")))?;

        debug!(thread_id = %checkpoint.thread_id, checkpoint_id = %checkpoint.checkpoint_id, "Stored checkpoint");
        Ok(checkpoint)
    }

    async fn latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError> {
        let row = sqlx::query(
            "SELECT * FROM checkpoints WHERE thread_id = ?1 ORDER BY iid DESC LIMIT 1",
        )
        .bind(thread_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckpointError::QueryFailed(format!("latest: {e}")))?;

        row.as_ref().map(Self::row_to_checkpoint).transpose()
    }

    async fn list(&self) -> Result<Vec<CheckpointHeader>, CheckpointError> {
        let rows = sqlx::query(
            "SELECT thread_id, created_at, conversation_title FROM checkpoints ORDER BY iid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CheckpointError::QueryFailed(format!("list: {e}")))?;

        rows.iter()
            .map(|row| {
                let thread_id: String = row
                    .try_get("thread_id")
                    .map_err(|e| CheckpointError::QueryFailed(format!("thread_id column: {e}")))?;
                let created_at: String = row
                    .try_get("created_at")
                    .map_err(|e| CheckpointError::QueryFailed(format!("created_at column: {e}")))?;
                let conversation_title: Option<String> = row
                    .try_get("conversation_title")
                    .map_err(|e| CheckpointError::QueryFailed(format!("title column: {e}")))?;
                Ok(CheckpointHeader {
                    thread_id: ThreadId(thread_id),
                    created_at: parse_timestamp(&created_at),
                    conversation_title,
                })
            })
            .collect()
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<usize, CheckpointError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() as usize)
    }

    async fn health_check(&self) -> Result<bool, CheckpointError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| CheckpointError::QueryFailed(e.to_string()))
    }
}
