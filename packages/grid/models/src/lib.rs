#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial and record types exchanged with the crime search backend.
//!
//! These are the shapes the `GridIndex` contract in `crime_radar_grid`
//! speaks in: bounding boxes, the geohash-style grid cells the backend
//! buckets points into, and the immutable crime records it returns for a
//! cell.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Northern latitude boundary.
    pub north: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Western longitude boundary.
    pub west: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from its four edges.
    #[must_use]
    pub const fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Returns `true` if every edge of `other` lies within this box.
    ///
    /// Edges are inclusive, so a box is contained in itself. A box that
    /// pokes out on any single side is not contained.
    #[must_use]
    pub fn contains_box(&self, other: &Self) -> bool {
        other.north <= self.north
            && other.south >= self.south
            && other.east <= self.east
            && other.west >= self.west
    }

    /// Returns `true` if the point lies within this box (edges inclusive).
    #[must_use]
    pub fn contains_point(&self, longitude: f64, latitude: f64) -> bool {
        latitude <= self.north
            && latitude >= self.south
            && longitude <= self.east
            && longitude >= self.west
    }
}

/// A rough rectangle around Portland, OR.
///
/// Inaccurate at the edges, but tight enough to discard outlying buckets
/// before city-wide statistics are computed.
pub const PORTLAND: BoundingBox = BoundingBox::new(
    45.653_272,
    45.432_393,
    -122.472_021,
    -122.836_75,
);

/// A spatial bucket produced by the backend at a given precision.
///
/// Identity comes from the backend's hash string together with the
/// precision; the bounds are derived from the hash, never recomputed
/// from record coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Backend-assigned cell key (a geohash).
    pub hash: String,
    /// Precision level the cell was bucketed at.
    pub precision: u8,
    /// Extent of the cell.
    pub bounds: BoundingBox,
}

/// A single reported crime.
///
/// The report time keeps the UTC offset the source encoded so that
/// hour-of-day and weekday are read in the city's local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeRecord {
    /// Source crime type label (e.g. `"Larceny"`).
    pub crime_type: String,
    /// When the crime was reported.
    pub report_time: DateTime<FixedOffset>,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_contains_itself() {
        assert!(PORTLAND.contains_box(&PORTLAND));
    }

    #[test]
    fn box_poking_out_on_any_edge_is_not_contained() {
        let inner = BoundingBox::new(45.6, 45.5, -122.6, -122.7);
        assert!(PORTLAND.contains_box(&inner));

        let nudges = [
            BoundingBox {
                north: PORTLAND.north + 1e-9,
                ..inner
            },
            BoundingBox {
                south: PORTLAND.south - 1e-9,
                ..inner
            },
            BoundingBox {
                east: PORTLAND.east + 1e-9,
                ..inner
            },
            BoundingBox {
                west: PORTLAND.west - 1e-9,
                ..inner
            },
        ];
        for bbox in &nudges {
            assert!(!PORTLAND.contains_box(bbox), "{bbox:?} should be excluded");
        }
    }

    #[test]
    fn point_lookup_uses_lon_lat_order() {
        let nw_4th_and_couch = (-122.674_417, 45.523_813);
        assert!(PORTLAND.contains_point(nw_4th_and_couch.0, nw_4th_and_couch.1));
        assert!(!PORTLAND.contains_point(nw_4th_and_couch.1, nw_4th_and_couch.0));
    }
}
