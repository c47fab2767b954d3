//! In-memory [`GridIndex`] for tests and offline use.
//!
//! Buckets a fixed list of records into geohash cells locally, the same
//! way the search backend does, and counts every call so callers can
//! assert how often the backend was consulted.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::FixedOffset;
use crime_radar_grid_models::{CrimeRecord, GridCell};

use crate::geohash_cell::{cell_containing, decode_cell};
use crate::{GridError, GridIndex, YearWindow};

/// Number of calls made to each [`GridIndex`] operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Calls to [`GridIndex::cell_for`].
    pub cell_for: usize,
    /// Calls to [`GridIndex::all_cells`].
    pub all_cells: usize,
    /// Calls to [`GridIndex::records_in`].
    pub records_in: usize,
}

impl CallCounts {
    /// Total number of backend calls.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.cell_for + self.all_cells + self.records_in
    }
}

/// Grid index over a record list held in memory.
pub struct MemoryGridIndex {
    records: Vec<CrimeRecord>,
    reference_offset: FixedOffset,
    cell_for_calls: AtomicUsize,
    all_cells_calls: AtomicUsize,
    records_in_calls: AtomicUsize,
}

impl MemoryGridIndex {
    /// Creates an index over `records`. Year boundaries are taken in
    /// `reference_offset`.
    #[must_use]
    pub const fn new(records: Vec<CrimeRecord>, reference_offset: FixedOffset) -> Self {
        Self {
            records,
            reference_offset,
            cell_for_calls: AtomicUsize::new(0),
            all_cells_calls: AtomicUsize::new(0),
            records_in_calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            cell_for: self.cell_for_calls.load(Ordering::SeqCst),
            all_cells: self.all_cells_calls.load(Ordering::SeqCst),
            records_in: self.records_in_calls.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl GridIndex for MemoryGridIndex {
    async fn cell_for(
        &self,
        longitude: f64,
        latitude: f64,
        precision: u8,
    ) -> Result<Option<GridCell>, GridError> {
        self.cell_for_calls.fetch_add(1, Ordering::SeqCst);

        let cell = cell_containing(longitude, latitude, precision)?;
        let occupied = self
            .records
            .iter()
            .any(|r| cell.bounds.contains_point(r.longitude, r.latitude));

        Ok(occupied.then_some(cell))
    }

    async fn all_cells(&self, precision: u8) -> Result<Vec<GridCell>, GridError> {
        self.all_cells_calls.fetch_add(1, Ordering::SeqCst);

        let mut hashes = BTreeSet::new();
        for record in &self.records {
            hashes.insert(cell_containing(record.longitude, record.latitude, precision)?.hash);
        }

        hashes
            .iter()
            .map(|hash| decode_cell(hash, precision))
            .collect()
    }

    async fn records_in(&self, cell: &GridCell, year: i32) -> Result<Vec<CrimeRecord>, GridError> {
        self.records_in_calls.fetch_add(1, Ordering::SeqCst);

        let Some(window) = YearWindow::new(year, self.reference_offset) else {
            return Ok(Vec::new());
        };

        Ok(self
            .records
            .iter()
            .filter(|r| cell.bounds.contains_point(r.longitude, r.latitude))
            .filter(|r| window.contains(&r.report_time))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn pacific() -> FixedOffset {
        FixedOffset::west_opt(8 * 3600).unwrap()
    }

    fn record(crime_type: &str, at: &str, longitude: f64, latitude: f64) -> CrimeRecord {
        CrimeRecord {
            crime_type: crime_type.to_string(),
            report_time: DateTime::parse_from_rfc3339(at).unwrap(),
            longitude,
            latitude,
        }
    }

    fn index() -> MemoryGridIndex {
        MemoryGridIndex::new(
            vec![
                record("Larceny", "2013-05-01T10:00:00-07:00", -122.674_417, 45.523_813),
                record("Burglary", "2014-05-01T10:00:00-07:00", -122.674_417, 45.523_813),
                record("Larceny", "2013-05-01T10:00:00-07:00", -122.7, 45.5),
            ],
            pacific(),
        )
    }

    #[tokio::test]
    async fn finds_occupied_cell_only() {
        let index = index();
        let cell = index.cell_for(-122.674_417, 45.523_813, 6).await.unwrap();
        assert_eq!(cell.map(|c| c.hash), Some("c20fbr".to_string()));

        let far_away = index.cell_for(-122.674_417, 48.523_813, 6).await.unwrap();
        assert!(far_away.is_none());
    }

    #[tokio::test]
    async fn enumerates_distinct_cells_in_hash_order() {
        let cells = index().all_cells(6).await.unwrap();
        let hashes: Vec<&str> = cells.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, ["c20dzg", "c20fbr"]);
    }

    #[tokio::test]
    async fn filters_records_by_cell_and_year() {
        let index = index();
        let cell = decode_cell("c20fbr", 6).unwrap();
        let records = index.records_in(&cell, 2013).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].crime_type, "Larceny");
    }

    #[tokio::test]
    async fn counts_calls() {
        let index = index();
        let cell = decode_cell("c20fbr", 6).unwrap();
        index.all_cells(6).await.unwrap();
        index.records_in(&cell, 2013).await.unwrap();
        index.records_in(&cell, 2014).await.unwrap();

        let counts = index.call_counts();
        assert_eq!(counts.all_cells, 1);
        assert_eq!(counts.records_in, 2);
        assert_eq!(counts.cell_for, 0);
        assert_eq!(counts.total(), 3);
    }
}
