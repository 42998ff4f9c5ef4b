//! Per-resource exclusive access with a bounded wait

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};

/// Idle slots are dropped once the table grows past this many entries
const PRUNE_THRESHOLD: usize = 1024;

/// One mutex per resource id, created on first use. Holding the guard
/// returned by [`LockTable::acquire`] makes the caller the only writer for
/// that id; other ids are unaffected.
pub struct LockTable {
    resource: &'static str,
    timeout: Duration,
    slots: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new(resource: &'static str, timeout: Duration) -> Self {
        Self {
            resource,
            timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, id: i32) -> AppResult<OwnedMutexGuard<()>> {
        let slot = {
            let mut slots = self.slots.lock().await;
            if slots.len() >= PRUNE_THRESHOLD {
                // every clone is made under this lock, so a count of 1 means idle
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots.entry(id).or_default().clone()
        };

        match tokio::time::timeout(self.timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(
                    resource = self.resource,
                    id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Lock wait expired"
                );
                Err(AppError::Timeout(format!("{} {}", self.resource, id)))
            }
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

/// Lock tables for the resources the engine serializes on
pub struct ResourceLocks {
    pub books: LockTable,
    pub borrowings: LockTable,
}

impl ResourceLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            books: LockTable::new("book", timeout),
            borrowings: LockTable::new("borrowing", timeout),
        }
    }
}
