//! Per-record serialization of read-modify-write cycles.
//!
//! The orchestrator and the reconciler share one [`RecordLocks`] table.
//! A guard is held only around local reads and writes, never across a
//! remote round-trip.

use crate::RecordKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: DashMap<RecordKey, Arc<Mutex<()>>>,
}

/// Held while a record is being read or written.
#[derive(Debug)]
pub struct RecordGuard {
    _guard: OwnedMutexGuard<()>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &RecordKey) -> RecordGuard {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        RecordGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Drop entries nobody is holding or waiting on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
