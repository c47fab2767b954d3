//! Reduction of raw crime records into a [`CellSummary`].

use std::borrow::Borrow;

use chrono::{Datelike as _, Timelike as _};
use crime_radar_grid_models::CrimeRecord;
use crime_radar_stats_models::CellSummary;

/// Counts `records` by type, by hour of day, and by weekday in a single
/// pass.
///
/// Hours and weekdays are read in each record's own UTC offset, i.e. the
/// local time the source reported. Weekdays are numbered from Monday = `0`.
/// Every record is counted; an empty input yields [`CellSummary::empty`].
#[must_use]
pub fn summarize<I>(records: I) -> CellSummary
where
    I: IntoIterator,
    I::Item: Borrow<CrimeRecord>,
{
    let mut summary = CellSummary::empty();

    for record in records {
        let record = record.borrow();
        let hour = u8::try_from(record.report_time.hour()).unwrap_or(u8::MAX);
        let weekday =
            u8::try_from(record.report_time.weekday().num_days_from_monday()).unwrap_or(u8::MAX);
        summary.record(&record.crime_type, hour, weekday);
    }

    summary
}
