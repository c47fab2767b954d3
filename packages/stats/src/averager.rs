//! City-wide medians, persisted alongside the summaries they come from
//! and memoized for the life of the process.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crime_radar_artifacts::locks::KeyedLocks;
use crime_radar_artifacts::{ArtifactKey, ArtifactStore};
use crime_radar_stats_models::CityAverages;

use crate::StatsError;
use crate::averages::calculate_averages;
use crate::cache::load_or_populate;
use crate::summaries::CitySummaryCache;

#[derive(Default)]
struct Memo {
    generation: u64,
    entries: BTreeMap<(u8, i32), CityAverages>,
}

/// Produces [`CityAverages`] per `(precision, year)`.
///
/// Lookups go memo, then artifact store, then the summary cache. Lock
/// order is always averages before summaries.
///
/// Each invalidation bumps the memo generation. A lookup only memoizes
/// its result if no invalidation happened since it started.
pub struct CityAverager {
    summaries: CitySummaryCache,
    store: Arc<dyn ArtifactStore>,
    locks: Arc<KeyedLocks>,
    memo: Mutex<Memo>,
}

impl CityAverager {
    #[must_use]
    pub fn new(
        summaries: CitySummaryCache,
        store: Arc<dyn ArtifactStore>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            summaries,
            store,
            locks,
            memo: Mutex::new(Memo::default()),
        }
    }

    /// Returns the median count per crime type across in-city cells.
    ///
    /// # Errors
    ///
    /// Propagates any [`StatsError`] from loading or populating the
    /// averages or the underlying summaries.
    pub async fn averages(&self, precision: u8, year: i32) -> Result<CityAverages, StatsError> {
        let generation = match self.memoized(precision, year) {
            Ok(averages) => {
                log::debug!("Averages for precision {precision}, year {year} served from memory");
                return Ok(averages);
            }
            Err(generation) => generation,
        };

        let averages = load_or_populate(
            self.store.as_ref(),
            &self.locks,
            ArtifactKey::averages(precision, year),
            |_: &ArtifactKey, _: &CityAverages| Ok(()),
            || async {
                let summaries = self.summaries.cell_summaries(precision, year).await?;
                let averages = calculate_averages(&summaries);
                log::info!(
                    "Computed averages for {} crime types over {} cells",
                    averages.len(),
                    summaries.len()
                );
                Ok::<_, StatsError>(averages)
            },
        )
        .await?;

        self.remember(generation, precision, year, &averages);

        Ok(averages)
    }

    /// Drops both stored artifacts and the memo for `(precision, year)`.
    ///
    /// Returns `true` if any stored artifact was removed. The next
    /// [`averages`](Self::averages) call recomputes from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if an artifact cannot be removed.
    pub async fn invalidate(&self, precision: u8, year: i32) -> Result<bool, StatsError> {
        let averages_key = ArtifactKey::averages(precision, year);
        let summaries_key = ArtifactKey::summaries(precision, year);

        let _averages_guard = self.locks.lock(&averages_key).await;
        let _summaries_guard = self.locks.lock(&summaries_key).await;

        let removed_averages = self.store.remove(&averages_key)?;
        let removed_summaries = self.store.remove(&summaries_key)?;

        // Artifacts go first so a lookup starting after the bump cannot
        // read them back.
        {
            let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
            memo.generation += 1;
            memo.entries.remove(&(precision, year));
        }

        log::info!(
            "Invalidated precision {precision}, year {year} (averages removed: {removed_averages}, summaries removed: {removed_summaries})"
        );

        Ok(removed_averages || removed_summaries)
    }

    /// Returns the memoized averages, or the current generation on a miss.
    fn memoized(&self, precision: u8, year: i32) -> Result<CityAverages, u64> {
        let memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        memo.entries
            .get(&(precision, year))
            .cloned()
            .ok_or(memo.generation)
    }

    fn remember(&self, generation: u64, precision: u8, year: i32, averages: &CityAverages) {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        if memo.generation == generation {
            memo.entries.insert((precision, year), averages.clone());
        } else {
            log::debug!(
                "Not memoizing averages for precision {precision}, year {year}: invalidated meanwhile"
            );
        }
    }
}
