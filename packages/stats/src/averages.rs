//! City-wide per-crime-type medians across cell summaries.
//!
//! For each crime type, the sample is the per-cell count of that type in
//! every cell where it occurred at least once. Cells where the type never
//! occurred contribute nothing, so the median is not dragged toward zero
//! by the many quiet cells at the edge of the city.

use std::collections::BTreeMap;

use crime_radar_stats_models::{CellSummary, CityAverages};

/// Computes the median count per crime type over `summaries`.
///
/// Produces one entry for every crime type seen in any summary.
#[must_use]
pub fn calculate_averages(summaries: &[CellSummary]) -> CityAverages {
    let mut samples: BTreeMap<&str, Vec<u64>> = BTreeMap::new();

    for summary in summaries {
        for (crime_type, count) in &summary.by_type {
            samples.entry(crime_type.as_str()).or_default().push(*count);
        }
    }

    samples
        .into_iter()
        .filter_map(|(crime_type, mut counts)| {
            median(&mut counts).map(|m| (crime_type.to_string(), m))
        })
        .collect()
}

/// Standard median: the middle value of the sorted sample, or the mean of
/// the two middle values for an even-length sample. `None` when empty.
///
/// Sorts `values` in place.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn median(values: &mut [u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid] as f64)
    } else {
        Some((values[mid - 1] as f64 + values[mid] as f64) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(counts: &[(&str, u64)]) -> CellSummary {
        let mut summary = CellSummary::empty();
        for (crime_type, count) in counts {
            summary.by_type.insert((*crime_type).to_string(), *count);
        }
        summary
    }

    #[test]
    fn median_of_odd_sample_is_middle_value() {
        assert_eq!(median(&mut [6, 1, 2]), Some(2.0));
    }

    #[test]
    fn median_of_even_sample_averages_middle_values() {
        assert_eq!(median(&mut [1, 2, 5, 6]), Some(3.5));
    }

    #[test]
    fn median_of_empty_sample_is_none() {
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn median_does_not_overflow() {
        assert_eq!(median(&mut [u64::MAX, u64::MAX]), Some(u64::MAX as f64));
    }

    #[test]
    fn cells_lacking_a_type_do_not_contribute_zero() {
        let summaries = [
            summary(&[("Larceny", 1), ("Arson", 4)]),
            summary(&[("Larceny", 2)]),
            summary(&[("Larceny", 6)]),
            summary(&[]),
        ];
        let averages = calculate_averages(&summaries);
        assert_eq!(averages.get("Larceny"), Some(2.0));
        // A zero-filled sample [4, 0, 0, 0] would give 0.
        assert_eq!(averages.get("Arson"), Some(4.0));
        assert_eq!(averages.len(), 2);
    }

    #[test]
    fn every_observed_type_gets_an_entry() {
        let summaries = [summary(&[("Arson", 1)]), summary(&[("Fraud", 3)])];
        let averages = calculate_averages(&summaries);
        let types: Vec<&str> = averages.crime_types().collect();
        assert_eq!(types, ["Arson", "Fraud"]);
    }

    #[test]
    fn no_summaries_no_averages() {
        assert!(calculate_averages(&[]).is_empty());
    }
}
