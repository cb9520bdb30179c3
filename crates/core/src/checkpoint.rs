//! CheckpointStore trait: durable, versioned conversation state.
//!
//! Every committed turn appends a full snapshot of the [`ConversationState`].
//! The newest snapshot for a thread is authoritative; older ones are kept
//! until the thread is deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::CheckpointError;
use crate::message::ThreadId;
use crate::state::ConversationState;

/// One persisted snapshot of a thread's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique checkpoint identifier
    pub checkpoint_id: String,

    pub thread_id: ThreadId,

    /// When the snapshot was written
    pub created_at: DateTime<Utc>,

    pub state: ConversationState,
}

impl Checkpoint {
    /// Wrap a state snapshot with a fresh id and timestamp.
    pub fn new(state: ConversationState) -> Self {
        Self {
            checkpoint_id: uuid::Uuid::new_v4().to_string(),
            thread_id: state.thread_id.clone(),
            created_at: Utc::now(),
            state,
        }
    }
}

/// Metadata of a checkpoint, as used by thread listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointHeader {
    pub thread_id: ThreadId,
    pub created_at: DateTime<Utc>,
    pub conversation_title: Option<String>,
}

/// The core CheckpointStore trait.
///
/// Implementations: SQLite, PostgreSQL, in-memory.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a snapshot of `state`. Atomic: either the whole snapshot is
    /// durable or nothing is.
    async fn put(&self, state: &ConversationState) -> Result<Checkpoint, CheckpointError>;

    /// The most recently written checkpoint for a thread.
    async fn latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Headers of every stored checkpoint, in insertion order.
    async fn list(&self) -> Result<Vec<CheckpointHeader>, CheckpointError>;

    /// Remove every checkpoint of a thread. Returns the number removed.
    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<usize, CheckpointError>;

    /// Health check.
    async fn health_check(&self) -> Result<bool, CheckpointError> {
        Ok(true)
    }
}
