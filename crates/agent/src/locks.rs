//! Per-thread mutual exclusion.
//!
//! Turns, renames and deletes for one thread read the latest checkpoint,
//! modify it and write a new one. They must not interleave. Different
//! threads never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use syllabot_core::message::ThreadId;

#[derive(Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<ThreadId, Weak<AsyncMutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`. Held until the guard drops.
    pub async fn acquire(&self, thread_id: &ThreadId) -> OwnedMutexGuard<()> {
        self.handle(thread_id).lock_owned().await
    }

    fn handle(&self, thread_id: &ThreadId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = locks.get(thread_id).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(thread_id.clone(), Arc::downgrade(&lock));
        lock
    }

    /// Threads with a live lock handle.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.values().filter(|w| w.strong_count() > 0).count()
    }
}
