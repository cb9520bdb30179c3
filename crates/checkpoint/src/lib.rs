//! Checkpoint store implementations for Syllabot.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;
use syllabot_core::checkpoint::CheckpointStore;
use syllabot_core::error::CheckpointError;

pub use in_memory::InMemoryCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresCheckpointStore;

/// Open the checkpoint store selected by `config.checkpoint.backend`.
pub async fn build_from_config(
    config: &syllabot_config::AppConfig,
) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    let cp = &config.checkpoint;
    match cp.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryCheckpointStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = cp.resolved_sqlite_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CheckpointError::Storage(format!(
                        "Failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            let store = SqliteCheckpointStore::new(&path.display().to_string()).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = cp.database_url.as_deref().ok_or_else(|| {
                CheckpointError::Storage("postgres backend requires database_url".into())
            })?;
            Ok(Arc::new(PostgresCheckpointStore::connect(url).await?))
        }
        other => Err(CheckpointError::Storage(format!(
            "checkpoint backend '{other}' is not available in this build"
        ))),
    }
}
