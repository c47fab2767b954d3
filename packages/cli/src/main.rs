#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for crime radar.
//!
//! Prints city-wide crime averages, the crime summary near a coordinate,
//! or how that coordinate compares to the city, as JSON. Exits with
//! status 2 when the backend has no data near the coordinate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use crime_radar_stats::CrimeStats;
use crime_radar_stats::config::RadarConfig;
use serde::Serialize;

const NO_DATA: u8 = 2;

#[derive(Parser)]
#[command(name = "crime_radar", about = "Compare crime near a location to the city")]
struct Cli {
    /// TOML config file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "crime_radar.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Median count per crime type across the city's grid cells
    Averages {
        #[command(flatten)]
        grid: GridArgs,
    },
    /// Crime counts by type, hour, and weekday in the cell around a point
    Summary {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        grid: GridArgs,
    },
    /// City averages, the point's counts, and their percentage differences
    Compare {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        grid: GridArgs,
    },
    /// Delete cached summaries and averages so they are recomputed
    ClearCache {
        #[command(flatten)]
        grid: GridArgs,
    },
}

#[derive(Args)]
struct LocationArgs {
    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
}

#[derive(Args)]
struct GridArgs {
    /// Geohash precision (defaults to `default_precision` from config)
    #[arg(long)]
    precision: Option<u8>,
    /// Calendar year (defaults to `default_year` from config)
    #[arg(long)]
    year: Option<i32>,
}

impl GridArgs {
    fn resolve(&self, config: &RadarConfig) -> (u8, i32) {
        (
            self.precision.unwrap_or(config.default_precision),
            self.year.unwrap_or(config.default_year),
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = RadarConfig::load(Some(cli.config.as_path()))?;
    let stats = CrimeStats::from_config(&config)?;

    match cli.command {
        Commands::Averages { grid } => {
            let (precision, year) = grid.resolve(&config);
            let averages = stats.compute_city_averages(precision, year).await?;
            print_json(&averages)?;
        }
        Commands::Summary { location, grid } => {
            let (precision, year) = grid.resolve(&config);
            let summary = stats
                .compute_location_summary(location.lon, location.lat, precision, year)
                .await?;
            let Some(summary) = summary else {
                return Ok(no_data(&location));
            };
            print_json(&summary)?;
        }
        Commands::Compare { location, grid } => {
            let (precision, year) = grid.resolve(&config);
            let comparison = stats
                .location_comparison(location.lon, location.lat, precision, year)
                .await?;
            let Some(comparison) = comparison else {
                return Ok(no_data(&location));
            };
            print_json(&comparison)?;
        }
        Commands::ClearCache { grid } => {
            let (precision, year) = grid.resolve(&config);
            if stats.invalidate(precision, year).await? {
                println!("Cleared cached statistics for precision {precision}, year {year}");
            } else {
                println!("Nothing cached for precision {precision}, year {year}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn no_data(location: &LocationArgs) -> ExitCode {
    eprintln!("No crime data near ({}, {})", location.lon, location.lat);
    ExitCode::from(NO_DATA)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_coordinates_parse() {
        let cli = Cli::try_parse_from([
            "crime_radar",
            "compare",
            "--lon",
            "-122.674417",
            "--lat",
            "45.523813",
            "--year",
            "2014",
        ])
        .unwrap();

        let Commands::Compare { location, grid } = cli.command else {
            panic!("expected compare");
        };
        assert!((location.lon + 122.674_417).abs() < 1e-9);
        assert_eq!(grid.resolve(&RadarConfig::default()), (6, 2014));
    }

    #[test]
    fn summary_requires_coordinates() {
        assert!(Cli::try_parse_from(["crime_radar", "summary", "--lon", "1.0"]).is_err());
    }
}
