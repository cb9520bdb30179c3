//! Thread registry: listing, history, rename and delete over the
//! checkpoint store.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use syllabot_core::checkpoint::CheckpointStore;
use syllabot_core::error::Error;
use syllabot_core::message::{Role, ThreadId};
use crate::locks::ThreadLocks;
use crate::prompts::UNTITLED_THREAD;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub title: String,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub thread_id: String,
    pub removed: usize,
}

#[derive(Clone)]
pub struct ThreadRegistry {
    store: Arc<dyn CheckpointStore>,
    locks: Arc<ThreadLocks>,
}

impl ThreadRegistry {
    pub fn new(store: Arc<dyn CheckpointStore>, locks: Arc<ThreadLocks>) -> Self {
        Self { store, locks }
    }

    /// Every stored thread, most recently active first.
    ///
    /// The title is the one on the newest checkpoint that carries one, so a
    /// rename shows up immediately.
    pub async fn list_threads(&self) -> Result<Vec<ThreadSummary>, Error> {
        let headers = self.store.list().await?;

        let mut threads: HashMap<ThreadId, (DateTime<Utc>, Option<String>)> = HashMap::new();
        for header in headers.into_iter().rev() {
            let entry = threads
                .entry(header.thread_id)
                .or_insert((header.created_at, None));
            if header.created_at > entry.0 {
                entry.0 = header.created_at;
            }
            if entry.1.is_none() {
                entry.1 = header.conversation_title;
            }
        }

        let mut summaries: Vec<ThreadSummary> = threads
            .into_iter()
            .map(|(thread_id, (last_active, title))| ThreadSummary {
                thread_id: thread_id.0,
                title: title.unwrap_or_else(|| UNTITLED_THREAD.to_string()),
                last_active,
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.last_active
                .cmp(&a.last_active)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        Ok(summaries)
    }

    /// User and assistant turns of the latest checkpoint. Empty for an
    /// unknown thread.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<HistoryEntry>, Error> {
        let Some(checkpoint) = self.store.latest(thread_id).await? else {
            return Ok(Vec::new());
        };
        Ok(checkpoint
            .state
            .messages
            .into_iter()
            .filter(|m| m.is_dialogue())
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    pub async fn rename_thread(&self, thread_id: &ThreadId, title: &str) -> Result<(), Error> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidRequest("title must not be blank".into()));
        }

        let _guard = self.locks.acquire(thread_id).await;
        let Some(checkpoint) = self.store.latest(thread_id).await? else {
            return Err(Error::ThreadNotFound(thread_id.to_string()));
        };

        let mut state = checkpoint.state;
        state.rename(title);
        self.store.put(&state).await?;
        info!(thread_id = %thread_id, "thread renamed");
        Ok(())
    }

    pub async fn delete_thread(&self, thread_id: &ThreadId) -> Result<DeleteReport, Error> {
        let _guard = self.locks.acquire(thread_id).await;
        let removed = self.store.delete_thread(thread_id).await?;
        info!(thread_id = %thread_id, removed, "thread deleted");
        Ok(DeleteReport {
            thread_id: thread_id.to_string(),
            removed,
        })
    }
}
