// SPDX-License-Identifier: GPL-3.0-only

//! Media-save service for finished panoramas

use crate::errors::{PanoError, PanoResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A persisted panorama
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedMedia {
    pub path: PathBuf,
    /// Size advertised with the save request
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation viewers should apply
    pub rotation: u32,
    pub bytes: usize,
}

/// Accepts final panorama JPEGs and returns a handle to the stored media
pub trait MediaStore: Send + Sync {
    fn save_panorama(
        &self,
        jpeg: &[u8],
        width: u32,
        height: u32,
        rotation: u32,
    ) -> PanoResult<SavedMedia>;
}

/// Writes `PANO_<timestamp>.jpg` files into a directory
#[derive(Debug, Clone)]
pub struct DiskMediaStore {
    dir: PathBuf,
}

impl DiskMediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free `PANO_<timestamp>[_n].jpg` path in the directory
    fn next_path(&self) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let mut path = self.dir.join(format!("PANO_{}.jpg", timestamp));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("PANO_{}_{}.jpg", timestamp, n));
            n += 1;
        }
        path
    }
}

impl MediaStore for DiskMediaStore {
    fn save_panorama(
        &self,
        jpeg: &[u8],
        width: u32,
        height: u32,
        rotation: u32,
    ) -> PanoResult<SavedMedia> {
        if jpeg.is_empty() {
            return Err(PanoError::Storage("Refusing to save empty panorama".into()));
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PanoError::Storage(format!(
                "Failed to create {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.next_path();
        debug!(path = %path.display(), bytes = jpeg.len(), "Writing panorama");
        std::fs::write(&path, jpeg)
            .map_err(|e| PanoError::Storage(format!("Failed to save panorama: {}", e)))?;

        info!(path = %path.display(), width, height, rotation, "Panorama saved");
        Ok(SavedMedia {
            path,
            width,
            height,
            rotation,
            bytes: jpeg.len(),
        })
    }
}

/// Most recently modified panorama in `dir`
pub fn latest_panorama(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("PANO_") && name.to_ascii_lowercase().ends_with(".jpg")
        })
        .max_by_key(|entry| entry.metadata().ok().and_then(|m| m.modified().ok()))
        .map(|entry| entry.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pano-storage-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_save_writes_file() {
        let dir = temp_dir("save");
        let store = DiskMediaStore::new(dir.join("nested"));

        let saved = store.save_panorama(&[0xFF, 0xD8, 1, 2], 800, 100, 270).unwrap();
        assert_eq!(std::fs::read(&saved.path).unwrap(), vec![0xFF, 0xD8, 1, 2]);
        assert_eq!((saved.width, saved.height, saved.rotation), (800, 100, 270));
        assert_eq!(latest_panorama(store.dir()), Some(saved.path.clone()));

        // Same second: second save must not overwrite the first
        let again = store.save_panorama(&[0xFF, 0xD8, 3], 800, 100, 270).unwrap();
        assert_ne!(again.path, saved.path);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_empty_save_rejected() {
        let dir = temp_dir("empty");
        let store = DiskMediaStore::new(&dir);
        assert!(matches!(
            store.save_panorama(&[], 1, 1, 0),
            Err(PanoError::Storage(_))
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
