//! Persisted size/checksum cache for release files, keyed by relative path.
//!
//! Entries are computed lazily on first access and never invalidated: a file
//! that changes on disk keeps its stale cached checksum until the cache file
//! is deleted. The cache is advisory; concurrent processes sharing the cache
//! file are not coordinated and the last writer wins on flush.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest;

const CACHE_FILE_NAME: &str = "download-metadata.cache";

#[derive(Debug, Error)]
pub enum MetadataCacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid relative path: {0}")]
    InvalidPath(String),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
}

/// Derived attributes of one release file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    pub checksum: String,
}

/// Content-checksum seam, pluggable so tests can count invocations.
pub trait Checksummer: Send + Sync {
    fn checksum(&self, data: &[u8]) -> String;
}

pub struct Sha256Checksummer;

impl Checksummer for Sha256Checksummer {
    fn checksum(&self, data: &[u8]) -> String {
        digest::sha256_hex(data)
    }
}

pub struct MetadataCache {
    downloads_root: PathBuf,
    cache_file: PathBuf,
    entries: HashMap<String, FileMeta>,
    dirty: bool,
    checksummer: Box<dyn Checksummer>,
}

impl MetadataCache {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(downloads_root: P, cache_dir: Q) -> Self {
        Self::with_checksummer(downloads_root, cache_dir, Box::new(Sha256Checksummer))
    }

    pub fn with_checksummer<P: AsRef<Path>, Q: AsRef<Path>>(
        downloads_root: P,
        cache_dir: Q,
        checksummer: Box<dyn Checksummer>,
    ) -> Self {
        Self {
            downloads_root: downloads_root.as_ref().to_path_buf(),
            cache_file: cache_dir.as_ref().join(CACHE_FILE_NAME),
            entries: HashMap::new(),
            dirty: false,
            checksummer,
        }
    }

    /// Load previously persisted entries. A missing cache file is an empty
    /// cache, not an error.
    pub fn load(&mut self) -> Result<(), MetadataCacheError> {
        let bytes = match std::fs::read(&self.cache_file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        self.entries = rmp_serde::from_slice(&bytes)?;
        self.dirty = false;
        Ok(())
    }

    /// Size and checksum for `relative` (a `release-dir/file-name` path),
    /// computed on first access and cached for the lifetime of the store.
    pub fn metadata(&mut self, relative: &str) -> Result<FileMeta, MetadataCacheError> {
        if let Some(meta) = self.entries.get(relative) {
            return Ok(meta.clone());
        }

        let path = self.resolve(relative)?;
        let data = std::fs::read(path)?;
        let meta = FileMeta {
            size: data.len() as u64,
            checksum: self.checksummer.checksum(&data),
        };
        self.entries.insert(relative.to_string(), meta.clone());
        self.dirty = true;
        Ok(meta)
    }

    /// Persist all entries, overwriting the cache file wholesale. No-op when
    /// nothing changed since the last flush.
    pub fn flush(&mut self) -> Result<(), MetadataCacheError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(dir) = self.cache_file.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let encoded = rmp_serde::to_vec_named(&self.entries)?;
        std::fs::write(&self.cache_file, encoded)?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, MetadataCacheError> {
        let rel = Path::new(relative);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !plain {
            return Err(MetadataCacheError::InvalidPath(relative.to_string()));
        }
        Ok(self.downloads_root.join(rel))
    }
}

impl Drop for MetadataCache {
    fn drop(&mut self) {
        // Last-chance persistence; an unwritable cache dir only costs a
        // recomputation next run.
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!(error = %e, "Failed to flush download metadata cache");
            }
        }
    }
}
