//! Conversions between geohash strings and [`GridCell`]s.
//!
//! The backend identifies buckets by geohash key. Bounds are always
//! decoded from that key rather than recomputed from record positions.

use crime_radar_grid_models::{BoundingBox, GridCell};
use geohash::Coord;

use crate::GridError;

/// Decodes a backend bucket key into a [`GridCell`].
///
/// # Errors
///
/// Returns [`GridError::InvalidGeohash`] if `hash` is not a valid geohash.
pub fn decode_cell(hash: &str, precision: u8) -> Result<GridCell, GridError> {
    let rect = geohash::decode_bbox(hash).map_err(|e| GridError::InvalidGeohash {
        hash: hash.to_string(),
        message: e.to_string(),
    })?;

    Ok(GridCell {
        hash: hash.to_string(),
        precision,
        bounds: BoundingBox::new(rect.max().y, rect.min().y, rect.max().x, rect.min().x),
    })
}

/// Computes the cell containing a point at the given precision.
///
/// # Errors
///
/// Returns [`GridError::InvalidGeohash`] if the coordinate is out of range
/// or the precision is unsupported.
pub fn cell_containing(longitude: f64, latitude: f64, precision: u8) -> Result<GridCell, GridError> {
    let hash = geohash::encode(
        Coord {
            x: longitude,
            y: latitude,
        },
        usize::from(precision),
    )
    .map_err(|e| GridError::InvalidGeohash {
        hash: format!("({longitude}, {latitude})@{precision}"),
        message: e.to_string(),
    })?;

    decode_cell(&hash, precision)
}
