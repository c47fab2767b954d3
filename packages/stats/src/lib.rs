#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Comparative crime statistics for a city.
//!
//! Records from a [`GridIndex`] are reduced to per-cell [`CellSummary`]
//! values, the in-city cells are reduced again to per-type medians
//! ([`CityAverages`]), and a single location is compared against those
//! medians. Both city-wide reductions are computed once per
//! `(precision, year)` and persisted through an [`ArtifactStore`].
//!
//! [`CrimeStats`] is the entry point.

pub mod averager;
pub mod averages;
pub mod cache;
pub mod compare;
pub mod config;
pub mod summaries;
pub mod summarize;

use std::sync::Arc;
use std::time::Duration;

use crime_radar_artifacts::fs::FsArtifactStore;
use crime_radar_artifacts::locks::KeyedLocks;
use crime_radar_artifacts::{ArtifactError, ArtifactKey, ArtifactStore};
use crime_radar_grid::elasticsearch::ElasticsearchGridIndex;
use crime_radar_grid::{GridError, GridIndex, with_timeout};
use crime_radar_grid_models::{BoundingBox, PORTLAND};
use thiserror::Error;

pub use crime_radar_stats_models::{
    CellSummary, CityAverages, ComparisonResult, LocationComparison,
};

use crate::averager::CityAverager;
use crate::config::RadarConfig;
use crate::summaries::CitySummaryCache;

/// Errors surfaced by the statistics entry points.
///
/// "No cell near this coordinate" is not an error; the location entry
/// points return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The crime backend failed, timed out, or returned something
    /// unusable.
    #[error("Crime backend unavailable: {0}")]
    BackendUnavailable(#[from] GridError),

    /// A stored artifact exists but cannot be used. Never recomputed
    /// implicitly.
    #[error("Cached artifact {key} is corrupt: {message}")]
    CacheCorrupt {
        /// Key of the unusable artifact.
        key: ArtifactKey,
        /// What was wrong with it.
        message: String,
    },

    /// The artifact store could not be read or written.
    #[error(transparent)]
    Storage(ArtifactError),

    /// Configuration was missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },
}

impl From<ArtifactError> for StatsError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::Corrupt { key, message } => Self::CacheCorrupt { key, message },
            other => Self::Storage(other),
        }
    }
}

/// Knobs for [`CrimeStats::new`].
#[derive(Debug, Clone, Copy)]
pub struct StatsOptions {
    /// Rectangle cells must lie within to count toward city averages.
    pub city: BoundingBox,
    /// Upper bound on a single-request backend call: resolving a cell or
    /// enumerating cells.
    pub backend_timeout: Duration,
    /// Upper bound on listing one cell's records, across all pages.
    pub records_timeout: Duration,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            city: PORTLAND,
            backend_timeout: Duration::from_secs(30),
            records_timeout: Duration::from_secs(600),
        }
    }
}

/// City averages, location summaries, and comparisons over one backend
/// and one artifact store.
pub struct CrimeStats {
    index: Arc<dyn GridIndex>,
    averager: CityAverager,
    backend_timeout: Duration,
    records_timeout: Duration,
}

impl CrimeStats {
    /// Wires the statistics pipeline over `index` and `store`.
    #[must_use]
    pub fn new(
        index: Arc<dyn GridIndex>,
        store: Arc<dyn ArtifactStore>,
        options: StatsOptions,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let summaries = CitySummaryCache::new(
            Arc::clone(&index),
            Arc::clone(&store),
            Arc::clone(&locks),
            options.city,
            options.backend_timeout,
            options.records_timeout,
        );

        Self {
            index,
            averager: CityAverager::new(summaries, store, locks),
            backend_timeout: options.backend_timeout,
            records_timeout: options.records_timeout,
        }
    }

    /// Builds an Elasticsearch-backed instance caching to
    /// `config.data_dir`.
    ///
    /// # Errors
    ///
    /// * [`StatsError::Config`] if the config is invalid
    /// * [`StatsError::BackendUnavailable`] if the HTTP client cannot be
    ///   built
    pub fn from_config(config: &RadarConfig) -> Result<Self, StatsError> {
        config.validate()?;

        let index = ElasticsearchGridIndex::new(
            &config.elasticsearch_url,
            &config.index,
            config.backend_timeout(),
            config.elasticsearch_options()?,
        )?;
        log::info!("Querying {}", index.search_url());

        let store = FsArtifactStore::new(config.data_dir.clone());
        log::info!("Caching artifacts in {}", store.root().display());

        Ok(Self::new(
            Arc::new(index),
            Arc::new(store),
            StatsOptions {
                city: config.city,
                backend_timeout: config.backend_timeout(),
                records_timeout: config.records_timeout(),
            },
        ))
    }

    /// Median count per crime type across in-city cells.
    ///
    /// # Errors
    ///
    /// Propagates backend, corruption, and storage failures as
    /// [`StatsError`].
    pub async fn compute_city_averages(
        &self,
        precision: u8,
        year: i32,
    ) -> Result<CityAverages, StatsError> {
        self.averager.averages(precision, year).await
    }

    /// Summary of the cell containing the coordinate.
    ///
    /// Returns `Ok(None)` if the backend has no cell near the coordinate,
    /// and an empty summary if the cell exists but had no crimes in `year`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::BackendUnavailable`] if a backend call fails.
    pub async fn compute_location_summary(
        &self,
        longitude: f64,
        latitude: f64,
        precision: u8,
        year: i32,
    ) -> Result<Option<CellSummary>, StatsError> {
        let cell = with_timeout(
            self.backend_timeout,
            self.index.cell_for(longitude, latitude, precision),
        )
        .await?;

        let Some(cell) = cell else {
            log::info!("No cell near ({longitude}, {latitude}) at precision {precision}");
            return Ok(None);
        };

        let records = with_timeout(self.records_timeout, self.index.records_in(&cell, year)).await?;
        log::debug!("Cell {} has {} records in {year}", cell.hash, records.len());

        Ok(Some(summarize::summarize(&records)))
    }

    /// Per-type percentage difference between the city averages and the
    /// coordinate's cell.
    ///
    /// # Errors
    ///
    /// Propagates failures from either input as [`StatsError`].
    pub async fn compare_location_to_city(
        &self,
        longitude: f64,
        latitude: f64,
        precision: u8,
        year: i32,
    ) -> Result<Option<ComparisonResult>, StatsError> {
        Ok(self
            .location_comparison(longitude, latitude, precision, year)
            .await?
            .map(|comparison| comparison.differences))
    }

    /// The averages, the location's summary, and their differences in one
    /// document.
    ///
    /// # Errors
    ///
    /// Propagates failures from either input as [`StatsError`].
    pub async fn location_comparison(
        &self,
        longitude: f64,
        latitude: f64,
        precision: u8,
        year: i32,
    ) -> Result<Option<LocationComparison>, StatsError> {
        let Some(location_sums) = self
            .compute_location_summary(longitude, latitude, precision, year)
            .await?
        else {
            return Ok(None);
        };

        let city_averages = self.compute_city_averages(precision, year).await?;
        let differences = compare::compare(&location_sums, &city_averages);
        let crime_types = city_averages.crime_types().map(ToString::to_string).collect();

        Ok(Some(LocationComparison {
            city_averages,
            location_sums,
            crime_types,
            differences,
        }))
    }

    /// Discards cached summaries and averages for `(precision, year)`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the artifacts cannot be removed.
    pub async fn invalidate(&self, precision: u8, year: i32) -> Result<bool, StatsError> {
        self.averager.invalidate(precision, year).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_artifact_maps_to_cache_corrupt() {
        let key = ArtifactKey::averages(6, 2013);
        let error = StatsError::from(ArtifactError::Corrupt {
            key,
            message: "bad".to_string(),
        });
        assert!(matches!(error, StatsError::CacheCorrupt { key: k, .. } if k == key));
    }

    #[test]
    fn io_failure_maps_to_storage() {
        let error = StatsError::from(ArtifactError::Io {
            path: "data".into(),
            source: std::io::Error::other("disk gone"),
        });
        assert!(matches!(error, StatsError::Storage(ArtifactError::Io { .. })));
    }

    #[test]
    fn grid_failure_maps_to_backend_unavailable() {
        let error = StatsError::from(GridError::Timeout {
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(error, StatsError::BackendUnavailable(_)));
    }
}
