#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Keyed storage for computed crime statistics.
//!
//! Artifacts are opaque byte blobs addressed by an [`ArtifactKey`]
//! (artifact kind, grid precision, year). Entries are immutable once
//! written and are never invalidated implicitly.
//!
//! - [`fs::FsArtifactStore`] persists blobs as files with atomic
//!   write-then-rename so an interrupted write never leaves a readable
//!   partial artifact.
//! - [`memory::MemoryArtifactStore`] keeps blobs in a map for tests.
//! - [`codec`] turns typed values into blobs and back (`MessagePack`).
//! - [`locks::KeyedLocks`] serializes population of a single key.

pub mod codec;
pub mod fs;
pub mod locks;
pub mod memory;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors from artifact storage.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Reading or writing the backing storage failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An artifact exists but cannot be decoded.
    #[error("Corrupt artifact {key}: {message}")]
    Corrupt {
        /// Key of the unreadable artifact.
        key: ArtifactKey,
        /// Decoder error.
        message: String,
    },

    /// A value could not be encoded for storage.
    #[error("Failed to encode artifact {key}: {message}")]
    Encode {
        /// Key being written.
        key: ArtifactKey,
        /// Encoder error.
        message: String,
    },
}

/// Which computed statistic an artifact holds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    /// Per-cell summaries for every in-city cell.
    Summaries,
    /// City-wide per-crime-type medians.
    Averages,
}

impl ArtifactKind {
    /// Every artifact kind.
    pub const ALL: &[Self] = &[Self::Summaries, Self::Averages];
}

/// Deterministic address of one cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// What the artifact holds.
    pub kind: ArtifactKind,
    /// Grid precision the statistic was computed at.
    pub precision: u8,
    /// Calendar year the statistic covers.
    pub year: i32,
}

impl ArtifactKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(kind: ArtifactKind, precision: u8, year: i32) -> Self {
        Self {
            kind,
            precision,
            year,
        }
    }

    /// Key of the cell summaries for `(precision, year)`.
    #[must_use]
    pub const fn summaries(precision: u8, year: i32) -> Self {
        Self::new(ArtifactKind::Summaries, precision, year)
    }

    /// Key of the city averages for `(precision, year)`.
    #[must_use]
    pub const fn averages(precision: u8, year: i32) -> Self {
        Self::new(ArtifactKind::Averages, precision, year)
    }

    /// Storage name, e.g. `crime_summaries_6_2013`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("crime_{}_{}_{}", self.kind, self.precision, self.year)
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Byte-level key-value storage for artifacts.
///
/// Implementations must make `put` atomic with respect to `get`: a reader
/// sees either no artifact or the complete blob.
pub trait ArtifactStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if the storage cannot be read. A missing
    /// artifact is not an error.
    fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, ArtifactError>;

    /// Stores `bytes` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if the storage cannot be written.
    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), ArtifactError>;

    /// Deletes the blob under `key`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if the storage cannot be modified.
    fn remove(&self, key: &ArtifactKey) -> Result<bool, ArtifactError>;
}
