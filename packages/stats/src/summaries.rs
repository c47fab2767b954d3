//! City-wide per-cell summaries, computed once per `(precision, year)`.

use std::sync::Arc;
use std::time::Duration;

use crime_radar_artifacts::locks::KeyedLocks;
use crime_radar_artifacts::{ArtifactKey, ArtifactStore};
use crime_radar_grid::{GridIndex, with_timeout};
use crime_radar_grid_models::{BoundingBox, GridCell};
use crime_radar_stats_models::CellSummary;

use crate::StatsError;
use crate::cache::load_or_populate;
use crate::summarize::summarize;

/// Keeps only the cells lying entirely inside `city`.
///
/// A cell that crosses the city edge on any side is dropped so outlying
/// buckets never reach the averages. Input order is preserved.
#[must_use]
pub fn in_city_cells(cells: Vec<GridCell>, city: &BoundingBox) -> Vec<GridCell> {
    cells
        .into_iter()
        .filter(|cell| city.contains_box(&cell.bounds))
        .collect()
}

/// Disk-backed list of [`CellSummary`] for every in-city cell.
pub struct CitySummaryCache {
    index: Arc<dyn GridIndex>,
    store: Arc<dyn ArtifactStore>,
    locks: Arc<KeyedLocks>,
    city: BoundingBox,
    backend_timeout: Duration,
    records_timeout: Duration,
}

impl CitySummaryCache {
    /// `backend_timeout` bounds the cell enumeration; `records_timeout`
    /// bounds each cell's full record listing, however many pages it
    /// takes.
    #[must_use]
    pub fn new(
        index: Arc<dyn GridIndex>,
        store: Arc<dyn ArtifactStore>,
        locks: Arc<KeyedLocks>,
        city: BoundingBox,
        backend_timeout: Duration,
        records_timeout: Duration,
    ) -> Self {
        Self {
            index,
            store,
            locks,
            city,
            backend_timeout,
            records_timeout,
        }
    }

    /// Returns the summaries of every in-city cell at `precision` for
    /// `year`, in the order they were first computed.
    ///
    /// # Errors
    ///
    /// * [`StatsError::CacheCorrupt`] if the stored artifact cannot be
    ///   decoded or is missing hour/day buckets
    /// * [`StatsError::BackendUnavailable`] if a backend call fails while
    ///   populating
    /// * [`StatsError::Storage`] if the store cannot be read or written
    pub async fn cell_summaries(
        &self,
        precision: u8,
        year: i32,
    ) -> Result<Vec<CellSummary>, StatsError> {
        load_or_populate(
            self.store.as_ref(),
            &self.locks,
            ArtifactKey::summaries(precision, year),
            |key, summaries: &Vec<CellSummary>| ensure_fully_keyed(key, summaries),
            || self.summarize_city(precision, year),
        )
        .await
    }

    async fn summarize_city(&self, precision: u8, year: i32) -> Result<Vec<CellSummary>, StatsError> {
        let cells = with_timeout(self.backend_timeout, self.index.all_cells(precision)).await?;
        let known = cells.len();
        let cells = in_city_cells(cells, &self.city);

        log::info!(
            "Summarizing {} of {known} cells at precision {precision} for {year}",
            cells.len()
        );

        let mut summaries = Vec::with_capacity(cells.len());

        for (i, cell) in cells.iter().enumerate() {
            let records =
                with_timeout(self.records_timeout, self.index.records_in(cell, year)).await?;
            log::debug!(
                "Cell {} ({}/{}): {} records",
                cell.hash,
                i + 1,
                cells.len(),
                records.len()
            );
            summaries.push(summarize(&records));
        }

        Ok(summaries)
    }
}

fn ensure_fully_keyed(key: &ArtifactKey, summaries: &[CellSummary]) -> Result<(), StatsError> {
    match summaries.iter().position(|summary| !summary.is_fully_keyed()) {
        Some(position) => Err(StatsError::CacheCorrupt {
            key: *key,
            message: format!("cell summary {position} is missing hour or day buckets"),
        }),
        None => Ok(()),
    }
}
