//! Per-key mutual exclusion for artifact population.
//!
//! Populating an artifact can mean scanning every cell in the backend.
//! Holding the key's lock across check-compute-write guarantees at most
//! one population per key at a time; a waiter must re-check the store
//! after acquiring the lock because the holder may have just written it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ArtifactKey;

/// A lazily grown set of async locks, one per [`ArtifactKey`].
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<BTreeMap<ArtifactKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Access is released when the
    /// returned guard is dropped, including on early-return error paths.
    pub async fn lock(&self, key: &ArtifactKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(*key).or_default())
        };
        lock.lock_owned().await
    }
}
