#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The grid index contract consumed by the crime statistics engine.
//!
//! A [`GridIndex`] answers three questions about the crime search backend:
//! which cell contains a coordinate, which cells exist at a precision, and
//! which records fall inside a cell during a calendar year. The engine is
//! agnostic to the wire protocol behind it.
//!
//! Two implementations ship with this crate:
//!
//! - [`elasticsearch::ElasticsearchGridIndex`] queries an Elasticsearch
//!   index of `GeoJSON` crime features over HTTP.
//! - [`memory::MemoryGridIndex`] buckets an in-memory record list, for
//!   tests and offline use.

pub mod elasticsearch;
pub mod geohash_cell;
pub mod memory;
pub mod report_time;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use crime_radar_grid_models::{CrimeRecord, GridCell};
use thiserror::Error;

/// Errors from grid index operations.
///
/// Every variant means the backend could not answer; callers surface them
/// as "backend unavailable" and do not retry.
#[derive(Debug, Error)]
pub enum GridError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend did not answer within the allotted time.
    #[error("Backend call timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The backend answered with a non-success status code.
    #[error("Backend returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body preview.
        message: String,
    },

    /// The backend response did not have the expected shape.
    #[error("Malformed backend response: {message}")]
    MalformedResponse {
        /// Description of what was missing or wrong.
        message: String,
    },

    /// A bucket key could not be decoded as a geohash.
    #[error("Invalid geohash '{hash}': {message}")]
    InvalidGeohash {
        /// The offending key.
        hash: String,
        /// Decoder error.
        message: String,
    },

    /// A record's report time could not be parsed.
    #[error("Invalid report time '{value}': {message}")]
    InvalidReportTime {
        /// The raw value.
        value: String,
        /// Parser error.
        message: String,
    },
}

/// Backend capability required by the statistics engine.
#[async_trait]
pub trait GridIndex: Send + Sync {
    /// Returns the cell containing the point, or `None` when the backend
    /// has no bucket near it.
    ///
    /// `None` is a normal outcome meaning "no recorded crime activity
    /// here", not a failure.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the backend query fails.
    async fn cell_for(
        &self,
        longitude: f64,
        latitude: f64,
        precision: u8,
    ) -> Result<Option<GridCell>, GridError>;

    /// Enumerates every cell the backend knows about at `precision`, in a
    /// stable backend-defined order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the backend query fails.
    async fn all_cells(&self, precision: u8) -> Result<Vec<GridCell>, GridError>;

    /// Returns every record inside `cell` reported during `year`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the backend query fails.
    async fn records_in(&self, cell: &GridCell, year: i32) -> Result<Vec<CrimeRecord>, GridError>;
}

/// A calendar year as a half-open time interval `[start, end)`.
///
/// Boundaries are midnight on January 1st in a fixed reference offset, so
/// no leap-year handling is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    /// Inclusive lower bound.
    pub start: DateTime<FixedOffset>,
    /// Exclusive upper bound.
    pub end: DateTime<FixedOffset>,
}

impl YearWindow {
    /// Builds the window for `year` in the given reference offset.
    ///
    /// Returns `None` if the year is outside chrono's representable range.
    #[must_use]
    pub fn new(year: i32, offset: FixedOffset) -> Option<Self> {
        let start = new_year(year, offset)?;
        let end = new_year(year.checked_add(1)?, offset)?;
        Some(Self { start, end })
    }

    /// Returns `true` if `time` falls inside the window.
    #[must_use]
    pub fn contains(&self, time: &DateTime<FixedOffset>) -> bool {
        *time >= self.start && *time < self.end
    }
}

fn new_year(year: i32, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    NaiveDate::from_ymd_opt(year, 1, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(offset)
        .single()
}

/// Runs a backend call with an upper bound on its duration.
///
/// The inner future is dropped (and with it any in-flight request) when
/// the bound elapses.
///
/// # Errors
///
/// Returns [`GridError::Timeout`] if `call` does not finish in time, or
/// whatever error `call` itself produced.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, GridError>
where
    F: Future<Output = Result<T, GridError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| GridError::Timeout { timeout })?
}
