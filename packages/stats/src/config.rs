//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `RADAR_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use crime_radar_grid::elasticsearch::ElasticsearchOptions;
use crime_radar_grid_models::{BoundingBox, PORTLAND};
use serde::{Deserialize, Serialize};

use crate::StatsError;

/// Settings for the backend, the artifact store, and query defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Base URL of the Elasticsearch cluster.
    pub elasticsearch_url: String,
    /// Index holding the crime documents.
    pub index: String,
    /// Directory cached artifacts are written to.
    pub data_dir: PathBuf,
    /// Upper bound on each backend HTTP request, in seconds.
    pub backend_timeout_secs: u64,
    /// Upper bound on listing one cell's records across all pages, in
    /// seconds.
    pub records_timeout_secs: u64,
    /// Radius searched around a coordinate when resolving its cell.
    pub nearby_radius_km: f64,
    /// Hits fetched per backend page.
    pub page_size: u32,
    /// Maximum number of cells enumerated per precision.
    pub max_cells: u32,
    /// UTC offset, in hours, for year boundaries and naive report times.
    pub reference_offset_hours: i32,
    /// Precision used when a caller does not give one.
    pub default_precision: u8,
    /// Year used when a caller does not give one.
    pub default_year: i32,
    /// Rectangle cells must lie within to count toward city averages.
    pub city: BoundingBox,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            elasticsearch_url: "http://localhost:9200".to_string(),
            index: "crimes".to_string(),
            data_dir: PathBuf::from("data/"),
            backend_timeout_secs: 30,
            records_timeout_secs: 600,
            nearby_radius_km: 0.1,
            page_size: 5000,
            max_cells: 10_000,
            reference_offset_hours: -8,
            default_precision: 6,
            default_year: 2013,
            city: PORTLAND,
        }
    }
}

impl RadarConfig {
    /// Loads the config from `path` (if given and present) and applies
    /// environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] if the file cannot be read or parsed,
    /// an override does not parse, or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, StatsError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, StatsError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                log::info!("Loading config from {}", path.display());
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(StatsError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            }),
        }
    }

    /// Parses a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] if the document is not valid TOML
    /// for this struct.
    pub fn from_toml(contents: &str) -> Result<Self, StatsError> {
        toml::from_str(contents).map_err(|e| StatsError::Config {
            message: format!("Invalid config: {e}"),
        })
    }

    /// Applies the `RADAR_ELASTICSEARCH_URL`, `RADAR_INDEX`,
    /// `RADAR_DATA_DIR`, `RADAR_BACKEND_TIMEOUT_SECS` and
    /// `RADAR_RECORDS_TIMEOUT_SECS` overrides found by `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] if a timeout override is not an
    /// integer.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), StatsError> {
        if let Some(url) = lookup("RADAR_ELASTICSEARCH_URL") {
            self.elasticsearch_url = url;
        }
        if let Some(index) = lookup("RADAR_INDEX") {
            self.index = index;
        }
        if let Some(dir) = lookup("RADAR_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("RADAR_BACKEND_TIMEOUT_SECS") {
            self.backend_timeout_secs = parse_env("RADAR_BACKEND_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("RADAR_RECORDS_TIMEOUT_SECS") {
            self.records_timeout_secs = parse_env("RADAR_RECORDS_TIMEOUT_SECS", &secs)?;
        }
        Ok(())
    }

    /// Rejects settings no query could run with.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] describing the first bad field.
    pub fn validate(&self) -> Result<(), StatsError> {
        if self.backend_timeout_secs == 0 {
            return Err(config_error("backend_timeout_secs must be positive"));
        }
        if self.records_timeout_secs == 0 {
            return Err(config_error("records_timeout_secs must be positive"));
        }
        if self.page_size == 0 {
            return Err(config_error("page_size must be positive"));
        }
        if self.max_cells == 0 {
            return Err(config_error("max_cells must be positive"));
        }
        if !(self.nearby_radius_km.is_finite() && self.nearby_radius_km > 0.0) {
            return Err(config_error("nearby_radius_km must be a positive number"));
        }
        if self.city.north < self.city.south || self.city.east < self.city.west {
            return Err(config_error("city rectangle is inverted"));
        }
        self.reference_offset()?;
        Ok(())
    }

    /// Returns the reference offset as a chrono offset.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] if the hour count is not a valid UTC
    /// offset.
    pub fn reference_offset(&self) -> Result<FixedOffset, StatsError> {
        self.reference_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                config_error(&format!(
                    "reference_offset_hours {} is out of range",
                    self.reference_offset_hours
                ))
            })
    }

    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    #[must_use]
    pub const fn records_timeout(&self) -> Duration {
        Duration::from_secs(self.records_timeout_secs)
    }

    /// Builds the backend adapter options from this config.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] if the reference offset is invalid.
    pub fn elasticsearch_options(&self) -> Result<ElasticsearchOptions, StatsError> {
        Ok(ElasticsearchOptions {
            nearby_radius_km: self.nearby_radius_km,
            page_size: self.page_size,
            max_cells: self.max_cells,
            reference_offset: self.reference_offset()?,
        })
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, StatsError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| StatsError::Config {
        message: format!("Invalid {name} '{value}': {e}"),
    })
}

fn config_error(message: &str) -> StatsError {
    StatsError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn defaults_match_portland_2013() {
        let config = RadarConfig::default();
        assert_eq!(config.default_precision, 6);
        assert_eq!(config.default_year, 2013);
        assert_eq!(config.city, PORTLAND);
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
        assert_eq!(config.records_timeout(), Duration::from_secs(600));
        assert_eq!(
            config.reference_offset().unwrap(),
            FixedOffset::west_opt(8 * 3600).unwrap()
        );
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = RadarConfig::from_toml(
            r#"
            index = "crimes_2014"
            page_size = 1000

            [city]
            north = 45.6
            south = 45.5
            east = -122.6
            west = -122.7
            "#,
        )
        .unwrap();

        assert_eq!(config.index, "crimes_2014");
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.elasticsearch_url, "http://localhost:9200");
        assert_eq!(config.city, BoundingBox::new(45.6, 45.5, -122.6, -122.7));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let result = RadarConfig::from_toml("page_size = \"lots\"");
        assert!(matches!(result, Err(StatsError::Config { .. })));
    }

    #[test]
    fn env_overrides_replace_values() {
        let env: BTreeMap<&str, &str> = [
            ("RADAR_ELASTICSEARCH_URL", "http://search:9200"),
            ("RADAR_DATA_DIR", "/var/cache/radar"),
            ("RADAR_BACKEND_TIMEOUT_SECS", " 5 "),
            ("RADAR_RECORDS_TIMEOUT_SECS", "900"),
        ]
        .into_iter()
        .collect();

        let mut config = RadarConfig::default();
        config
            .apply_overrides(|name| env.get(name).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.elasticsearch_url, "http://search:9200");
        assert_eq!(config.index, "crimes");
        assert_eq!(config.data_dir, PathBuf::from("/var/cache/radar"));
        assert_eq!(config.backend_timeout(), Duration::from_secs(5));
        assert_eq!(config.records_timeout(), Duration::from_secs(900));
    }

    #[test]
    fn unparsable_timeout_override_is_rejected() {
        let mut config = RadarConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "RADAR_BACKEND_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(StatsError::Config { .. })));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("crime_radar_no_such_config.toml");
        assert_eq!(RadarConfig::from_file(&path).unwrap(), RadarConfig::default());
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let zero_timeout = RadarConfig {
            backend_timeout_secs: 0,
            ..RadarConfig::default()
        };
        let zero_records_timeout = RadarConfig {
            records_timeout_secs: 0,
            ..RadarConfig::default()
        };
        let bad_offset = RadarConfig {
            reference_offset_hours: 30,
            ..RadarConfig::default()
        };
        assert!(zero_timeout.validate().is_err());
        assert!(zero_records_timeout.validate().is_err());
        assert!(bad_offset.validate().is_err());
    }
}
