// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the durable store layout.

use std::path::{Path, PathBuf};

/// Base directory for all durable storage.
pub const DATA_ROOT: &str = "/data";

/// File extension used for filesystem bucket slots.
pub const BUCKET_EXTENSION: &str = "json";

/// Storage path utilities for the durable store.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all durable data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Filesystem Backend ==========

    /// Directory containing one file per bucket.
    pub fn buckets_dir(&self) -> PathBuf {
        self.root.join("buckets")
    }

    /// Path to a specific bucket file.
    pub fn bucket(&self, key: &str) -> PathBuf {
        self.buckets_dir().join(format!("{key}.{BUCKET_EXTENSION}"))
    }

    // ========== redb Backend ==========

    /// Path to the embedded redb database file.
    pub fn redb_file(&self) -> PathBuf {
        self.root.join("store.redb")
    }
}
