//! Read-through caching of typed artifacts.
//!
//! [`load_or_populate`] is the single path by which computed statistics
//! reach the artifact store: read, and on a miss take the key's lock,
//! read again, compute, write. A blob that exists but does not decode is
//! reported as corrupt and never silently recomputed.

use std::future::Future;

use crime_radar_artifacts::locks::KeyedLocks;
use crime_radar_artifacts::{ArtifactKey, ArtifactStore, codec};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::StatsError;

/// Reads and decodes `key`, returning `None` if it was never written.
///
/// # Errors
///
/// Returns [`StatsError::CacheCorrupt`] if the artifact fails to decode,
/// or [`StatsError::Storage`] if the store cannot be read.
pub fn read<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    key: &ArtifactKey,
) -> Result<Option<T>, StatsError> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    Ok(Some(codec::decode(key, &bytes)?))
}

/// Encodes and writes `value` under `key`.
///
/// # Errors
///
/// Returns [`StatsError::Storage`] if encoding or writing fails.
pub fn write<T: Serialize>(
    store: &dyn ArtifactStore,
    key: &ArtifactKey,
    value: &T,
) -> Result<(), StatsError> {
    let bytes = codec::encode(key, value)?;
    store.put(key, &bytes)?;
    Ok(())
}

/// Returns the artifact under `key`, computing and persisting it with
/// `populate` on a miss.
///
/// At most one caller populates a given key at a time; callers that
/// waited on the lock pick up the freshly written artifact instead of
/// recomputing it. `validate` runs on every decoded or computed value.
///
/// # Errors
///
/// Returns whatever `populate` or `validate` fail with, or a
/// [`StatsError`] from reading or writing the store.
pub async fn load_or_populate<T, F, Fut, V>(
    store: &dyn ArtifactStore,
    locks: &KeyedLocks,
    key: ArtifactKey,
    validate: V,
    populate: F,
) -> Result<T, StatsError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, StatsError>>,
    V: Fn(&ArtifactKey, &T) -> Result<(), StatsError>,
{
    if let Some(value) = read(store, &key)? {
        validate(&key, &value)?;
        log::info!("Cache hit for {key}");
        return Ok(value);
    }

    let _guard = locks.lock(&key).await;

    if let Some(value) = read(store, &key)? {
        validate(&key, &value)?;
        log::info!("Cache hit for {key} after waiting on concurrent population");
        return Ok(value);
    }

    log::info!("Cache miss for {key}, computing");
    let value = populate().await?;
    validate(&key, &value)?;
    write(store, &key, &value)?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crime_radar_artifacts::memory::MemoryArtifactStore;

    use super::*;

    fn accept(_: &ArtifactKey, _: &Vec<u32>) -> Result<(), StatsError> {
        Ok(())
    }

    #[tokio::test]
    async fn populates_once_then_reads() {
        let store = MemoryArtifactStore::new();
        let locks = KeyedLocks::new();
        let key = ArtifactKey::summaries(6, 2013);
        let runs = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = load_or_populate(&store, &locks, key, accept, || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1_u32, 2, 3])
            })
            .await
            .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(store.keys(), vec![key]);
    }

    #[tokio::test]
    async fn corrupt_artifact_is_not_recomputed() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::summaries(6, 2013);
        store.put(&key, b"\xc1").unwrap();

        let runs = AtomicUsize::new(0);

        let result = load_or_populate(&store, &KeyedLocks::new(), key, accept, || async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1_u32])
        })
        .await;

        assert!(matches!(result, Err(StatsError::CacheCorrupt { .. })));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(&key).unwrap(), Some(vec![0xc1]));
    }

    #[tokio::test]
    async fn failed_population_writes_nothing() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::summaries(6, 2013);

        let result: Result<Vec<u32>, _> =
            load_or_populate(&store, &KeyedLocks::new(), key, accept, || async {
                Err(StatsError::Config {
                    message: "boom".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn concurrent_misses_populate_once() {
        let store = Arc::new(MemoryArtifactStore::new());
        let locks = Arc::new(KeyedLocks::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let key = ArtifactKey::averages(6, 2013);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let locks = Arc::clone(&locks);
                let runs = Arc::clone(&runs);
                tokio::spawn(async move {
                    load_or_populate(store.as_ref(), &locks, key, accept, || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(vec![7_u32])
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), vec![7]);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
