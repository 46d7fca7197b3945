// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem backend: one file per bucket.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   buckets/
//!     advertisements.json
//!     banners.json
//!     auth_token.json      # sensitive: holds `enc:v1:` + ciphertext
//!     ...
//! ```
//!
//! Slots hold exactly what the [`RecordStore`](super::RecordStore) hands
//! over: plain JSON for plain buckets, marker-prefixed ciphertext for
//! sensitive ones. This module performs no crypto of its own.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use super::backend::{StorageBackend, StorageError, StorageResult};
use super::paths::BUCKET_EXTENSION;
use super::StoragePaths;

/// Filesystem-backed bucket storage.
#[derive(Debug, Clone)]
pub struct FsBackend {
    paths: StoragePaths,
    initialized: bool,
}

impl FsBackend {
    /// Create a new FsBackend instance.
    ///
    /// Does NOT initialize the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Initialize the bucket directory.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn initialize(&mut self) -> StorageResult<()> {
        fs::create_dir_all(self.paths.buckets_dir())?;
        self.initialized = true;
        Ok(())
    }

    /// Check that the data directory is writable and reads back what was written.
    pub fn health_check(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }

        Ok(())
    }

    fn slot_path(&self, key: &str) -> StorageResult<std::path::PathBuf> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }
        validate_key(key)?;
        Ok(self.paths.bucket(key))
    }
}

/// Bucket keys become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl StorageBackend for FsBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.slot_path(key)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(Some(content))
    }

    /// Write a slot atomically (temp file, then rename).
    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.slot_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Overwrite the existing file in place, covering at least its current
    /// length, and sync it. A regular `write` renames a fresh file over the
    /// slot and leaves the old blocks untouched.
    fn overwrite(&self, key: &str, filler: &str) -> StorageResult<()> {
        if filler.is_empty() {
            return Ok(());
        }
        let path = self.slot_path(key)?;
        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let target = file.metadata()?.len().max(filler.len() as u64);
        let mut writer = BufWriter::new(&file);
        let mut written = 0u64;
        while written < target {
            writer.write_all(filler.as_bytes())?;
            written += filler.len() as u64;
        }
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Uses `File::open()` rather than `Path::exists()` so that permission
    /// problems surface the same way they do on read.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        let path = self.slot_path(key)?;
        Ok(File::open(path).is_ok())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let dir = self.paths.buckets_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && has_bucket_extension(&path) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn has_bucket_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == BUCKET_EXTENSION)
}
