#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate crime statistics types.
//!
//! These are the values the statistics engine computes, caches, and hands
//! to callers: per-cell counts ([`CellSummary`]), city-wide per-type
//! medians ([`CityAverages`]), and a location's relative difference from
//! them ([`ComparisonResult`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of hour-of-day buckets in a [`CellSummary`].
pub const HOURS_PER_DAY: u8 = 24;

/// Number of weekday buckets in a [`CellSummary`]. Monday is `0`.
pub const DAYS_PER_WEEK: u8 = 7;

/// Crime counts keyed by crime type.
pub type TypeCounts = BTreeMap<String, u64>;

/// Counts of crimes in one cell by type, by hour of day, and by weekday.
///
/// `by_hour` always has all 24 hours and `by_day` all 7 weekdays, with
/// empty inner maps where nothing happened, so lookups never branch on a
/// missing bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSummary {
    /// Total count per crime type.
    pub by_type: TypeCounts,
    /// Per-type counts for each hour `0..24`.
    pub by_hour: BTreeMap<u8, TypeCounts>,
    /// Per-type counts for each weekday `0..7` (Monday = `0`).
    pub by_day: BTreeMap<u8, TypeCounts>,
}

impl Default for CellSummary {
    fn default() -> Self {
        Self::empty()
    }
}

impl CellSummary {
    /// A summary of zero records, with every hour and weekday present.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_type: TypeCounts::new(),
            by_hour: (0..HOURS_PER_DAY).map(|h| (h, TypeCounts::new())).collect(),
            by_day: (0..DAYS_PER_WEEK).map(|d| (d, TypeCounts::new())).collect(),
        }
    }

    /// Counts one crime of `crime_type` at `hour` on `weekday`.
    ///
    /// Out-of-range buckets are created rather than dropped so the type
    /// total and the bucket totals always agree.
    pub fn record(&mut self, crime_type: &str, hour: u8, weekday: u8) {
        bump(&mut self.by_type, crime_type);
        bump(self.by_hour.entry(hour).or_default(), crime_type);
        bump(self.by_day.entry(weekday).or_default(), crime_type);
    }

    /// Number of crimes of `crime_type`, `0` if none were seen.
    #[must_use]
    pub fn count(&self, crime_type: &str) -> u64 {
        self.by_type.get(crime_type).copied().unwrap_or(0)
    }

    /// Total number of crimes counted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.by_type.values().sum()
    }

    /// Returns `true` if no crimes were counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Returns `true` if exactly the hours `0..24` and weekdays `0..7` are
    /// present.
    #[must_use]
    pub fn is_fully_keyed(&self) -> bool {
        self.by_hour.keys().copied().eq(0..HOURS_PER_DAY)
            && self.by_day.keys().copied().eq(0..DAYS_PER_WEEK)
    }
}

fn bump(counts: &mut TypeCounts, crime_type: &str) {
    if let Some(count) = counts.get_mut(crime_type) {
        *count += 1;
    } else {
        counts.insert(crime_type.to_string(), 1);
    }
}

/// City-wide median count per crime type for one `(precision, year)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityAverages(BTreeMap<String, f64>);

impl CityAverages {
    /// The city average for `crime_type`, if any cell recorded it.
    #[must_use]
    pub fn get(&self, crime_type: &str) -> Option<f64> {
        self.0.get(crime_type).copied()
    }

    /// Crime types with an average, in order.
    pub fn crime_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(crime_type, average)` pairs, in crime type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of crime types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no crime types have an average.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for CityAverages {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-type percentage difference between a location and the city.
///
/// Keyed by the city averages' crime types. `None` marks a type whose
/// difference is undefined because both the city average and the
/// location's count are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComparisonResult(BTreeMap<String, Option<f64>>);

impl ComparisonResult {
    /// The difference for `crime_type`.
    ///
    /// The outer `Option` is `None` for a type the city has no average
    /// for; the inner one is `None` when the difference is undefined.
    #[must_use]
    pub fn get(&self, crime_type: &str) -> Option<Option<f64>> {
        self.0.get(crime_type).copied()
    }

    /// Number of crime types compared.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was compared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Option<f64>)> for ComparisonResult {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything a caller needs to render a location against the city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationComparison {
    /// City-wide medians.
    pub city_averages: CityAverages,
    /// The location's own counts.
    pub location_sums: CellSummary,
    /// Crime types the comparison covers.
    pub crime_types: Vec<String>,
    /// Per-type percentage differences.
    pub differences: ComparisonResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_is_fully_keyed() {
        let summary = CellSummary::empty();
        assert_eq!(summary.by_hour.len(), 24);
        assert_eq!(summary.by_day.len(), 7);
        assert!(summary.by_hour.values().all(BTreeMap::is_empty));
        assert!(summary.is_fully_keyed());
        assert!(summary.is_empty());
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn record_updates_all_three_views() {
        let mut summary = CellSummary::empty();
        summary.record("Larceny", 23, 0);
        summary.record("Larceny", 23, 6);
        summary.record("Arson", 2, 6);

        assert_eq!(summary.count("Larceny"), 2);
        assert_eq!(summary.count("Arson"), 1);
        assert_eq!(summary.count("Homicide"), 0);
        assert_eq!(summary.by_hour[&23]["Larceny"], 2);
        assert_eq!(summary.by_day[&6].len(), 2);
        assert_eq!(summary.total(), 3);
        assert!(summary.is_fully_keyed());
    }

    #[test]
    fn missing_bucket_is_not_fully_keyed() {
        let mut summary = CellSummary::empty();
        summary.by_day.remove(&3);
        assert!(!summary.is_fully_keyed());
    }

    #[test]
    fn comparison_serializes_undefined_as_null() {
        let result: ComparisonResult = [
            ("Arson".to_string(), None),
            ("Larceny".to_string(), Some(-25.0)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({ "Arson": null, "Larceny": -25.0 }));
    }

    #[test]
    fn summary_json_uses_camel_case_and_integer_keys() {
        let mut summary = CellSummary::empty();
        summary.record("Larceny", 5, 1);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["byType"]["Larceny"], 1);
        assert_eq!(json["byHour"]["5"]["Larceny"], 1);
        let back: CellSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}
