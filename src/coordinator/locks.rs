//! Per-queue serialization of view-touching operations

use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::core::sync::handle_mutex_poison;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while an operation reads or mutates one queue's live view
pub(crate) type QueueGuard = OwnedMutexGuard<()>;

/// One async mutex per queue id, created on first use
///
/// Operations on different queues never contend.
#[derive(Default)]
pub(crate) struct QueueLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl QueueLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, queue_id: &str) -> CoordinatorResult<QueueGuard> {
        let lock = {
            let mut locks = handle_mutex_poison(self.locks.lock(), CoordinatorError::internal)?;
            locks
                .entry(queue_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        Ok(lock.lock_owned().await)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
