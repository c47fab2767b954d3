//! Relative comparison of a location's counts against city averages.

use crime_radar_stats_models::{CellSummary, CityAverages, ComparisonResult};

/// Percentage difference between `x` and `y` relative to their mean:
/// `(x - y) / ((x + y) / 2) * 100`, negated when `x > y`.
///
/// With `x` the city average and `y` the location count, the result is
/// never positive: its magnitude is the relative gap and the sign is
/// fixed by the negation rule above. Callers rendering "above/below
/// average" depend on that convention.
///
/// Returns `None` when `x + y == 0`, where the difference is undefined.
#[must_use]
pub fn percentage_difference(x: f64, y: f64) -> Option<f64> {
    let mean = (x + y) / 2.0;
    if mean == 0.0 {
        return None;
    }

    let difference = (x - y) / mean * 100.0;
    if x > y {
        Some(-difference)
    } else {
        // (x - y) is exactly 0.0 when equal; normalize any -0.0.
        Some(difference + 0.0)
    }
}

/// Compares `location` against every crime type in `city`.
///
/// Types the location never recorded count as `0`. Types the location
/// recorded but the city has no average for are left out: the result is
/// keyed by the city's crime types only.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compare(location: &CellSummary, city: &CityAverages) -> ComparisonResult {
    city.iter()
        .map(|(crime_type, city_average)| {
            let location_sum = location.count(crime_type) as f64;
            (
                crime_type.to_string(),
                percentage_difference(city_average, location_sum),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn city_above_location_is_negative() {
        let diff = percentage_difference(3.0, 1.0).unwrap();
        assert!(close(diff, -100.0), "got {diff}");
    }

    #[test]
    fn city_below_location_keeps_formula_sign() {
        let diff = percentage_difference(16.0, 53.0).unwrap();
        assert!(close(diff, (16.0 - 53.0) / 34.5 * 100.0), "got {diff}");
        assert!(diff < 0.0);
    }

    #[test]
    fn equal_values_are_zero() {
        let diff = percentage_difference(2.0, 2.0).unwrap();
        assert!(diff == 0.0 && diff.is_sign_positive());
    }

    #[test]
    fn both_zero_is_undefined() {
        assert_eq!(percentage_difference(0.0, 0.0), None);
    }

    #[test]
    fn location_zero_against_positive_average() {
        let diff = percentage_difference(4.0, 0.0).unwrap();
        assert!(close(diff, -200.0), "got {diff}");
    }

    #[test]
    fn compare_is_driven_by_city_types() {
        let city: CityAverages = [("Larceny".to_string(), 16.0), ("Arson".to_string(), 2.0)]
            .into_iter()
            .collect();
        let mut location = CellSummary::empty();
        location.by_type.insert("Larceny".to_string(), 53);
        location.by_type.insert("Homicide".to_string(), 1);

        let result = compare(&location, &city);

        assert_eq!(result.len(), 2);
        assert_eq!(
            result.get("Larceny"),
            Some(percentage_difference(16.0, 53.0))
        );
        assert_eq!(result.get("Arson"), Some(percentage_difference(2.0, 0.0)));
        assert_eq!(result.get("Homicide"), None);
    }

    #[test]
    fn zero_average_and_absent_type_is_marked_undefined() {
        let city: CityAverages = [("Arson".to_string(), 0.0)].into_iter().collect();
        let result = compare(&CellSummary::empty(), &city);
        assert_eq!(result.get("Arson"), Some(None));
    }
}
