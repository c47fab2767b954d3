//! Filesystem-backed artifact store.
//!
//! Each artifact is one file named by [`ArtifactKey::file_name`] inside a
//! root directory. Writes go to a `.tmp` sibling first and are renamed
//! into place, so a crash mid-write leaves at worst a stray temp file and
//! never a truncated artifact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{ArtifactError, ArtifactKey, ArtifactStore};

/// Artifact store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path of `key`.
    #[must_use]
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn tmp_path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(format!("{}.tmp", key.file_name()))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ArtifactStore for FsArtifactStore {
    fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => {
                log::debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), ArtifactError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;
        }

        let path = self.path_for(key);
        let tmp_path = self.tmp_path_for(key);

        if let Err(e) = std::fs::write(&tmp_path, bytes) {
            std::fs::remove_file(&tmp_path).ok();
            return Err(io_error(&tmp_path, e));
        }
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            std::fs::remove_file(&tmp_path).ok();
            return Err(io_error(&path, e));
        }

        log::info!("Saved artifact {key} to {}", path.display());
        Ok(())
    }

    fn remove(&self, key: &ArtifactKey) -> Result<bool, ArtifactError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
