//! In-memory artifact store for tests and ephemeral runs.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::{ArtifactError, ArtifactKey, ArtifactStore};

/// Artifact store holding blobs in a map.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<BTreeMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keys currently stored, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<ArtifactKey> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, ArtifactError> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), ArtifactError> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*key, bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &ArtifactKey) -> Result<bool, ArtifactError> {
        Ok(self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_removes_blobs() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::summaries(6, 2013);

        assert!(store.get(&key).unwrap().is_none());
        store.put(&key, &[1, 2, 3]).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.keys(), vec![key]);
        assert!(store.remove(&key).unwrap());
        assert!(store.keys().is_empty());
    }
}
