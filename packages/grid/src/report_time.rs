//! Parsing of `properties.reportTime` values from crime documents.
//!
//! Source feeds are inconsistent: some timestamps carry a UTC offset and
//! some are naive local times. An explicit offset is always honored; a
//! naive time is pinned to the city's reference offset instead of being
//! silently read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::GridError;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a report time, falling back to `reference` for naive values.
///
/// # Errors
///
/// Returns [`GridError::InvalidReportTime`] if no supported format matches.
pub fn parse_report_time(
    value: &str,
    reference: FixedOffset,
) -> Result<DateTime<FixedOffset>, GridError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt);
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format)
            && let Some(dt) = naive.and_local_timezone(reference).single()
        {
            return Ok(dt);
        }
    }

    Err(GridError::InvalidReportTime {
        value: value.to_string(),
        message: "expected ISO 8601 date-time".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike as _, Timelike as _};

    use super::*;

    fn pacific() -> FixedOffset {
        FixedOffset::west_opt(8 * 3600).unwrap()
    }

    #[test]
    fn keeps_encoded_offset() {
        let dt = parse_report_time("2013-06-03T23:15:00-07:00", pacific()).unwrap();
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn keeps_compact_offset() {
        let dt = parse_report_time("2013-06-03T23:15:00-0700", pacific()).unwrap();
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn naive_time_uses_reference_offset() {
        let dt = parse_report_time("2013-01-01T00:30:00", pacific()).unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.offset().local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn accepts_fractional_seconds_and_space_separator() {
        assert!(parse_report_time("2013-01-01 12:00:00.250", pacific()).is_ok());
        assert!(parse_report_time("2013-01-01T12:00:00.250Z", pacific()).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_report_time("last tuesday", pacific()).unwrap_err();
        assert!(matches!(err, GridError::InvalidReportTime { .. }));
    }
}
