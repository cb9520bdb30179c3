//! In-memory checkpoint store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use syllabot_core::checkpoint::{Checkpoint, CheckpointHeader, CheckpointStore};
use syllabot_core::error::CheckpointError;
use syllabot_core::message::ThreadId;
use syllabot_core::state::ConversationState;
use tokio::sync::RwLock;

/// Keeps every checkpoint in a Vec, in insertion order.
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<Vec<Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            checkpoints: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn put(&self, state: &ConversationState) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Checkpoint::new(state.clone());
        self.checkpoints.write().await.push(checkpoint.clone());
        Ok(checkpoint)
    }

    async fn latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints
            .iter()
            .rev()
            .find(|c| &c.thread_id == thread_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<CheckpointHeader>, CheckpointError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints
            .iter()
            .map(|c| CheckpointHeader {
                thread_id: c.thread_id.clone(),
                created_at: c.created_at,
                conversation_title: c.state.conversation_title.clone(),
            })
            .collect())
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<usize, CheckpointError> {
        let mut checkpoints = self.checkpoints.write().await;
        let before = checkpoints.len();
        checkpoints.retain(|c| &c.thread_id != thread_id);
        Ok(before - checkpoints.len())
    }
}
