// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Raw slot backends underneath the [`RecordStore`](super::RecordStore).
//!
//! A backend stores opaque strings under bucket keys. It knows nothing about
//! serialization, encryption or sensitivity; those live one layer up.

use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

use super::crypto::CryptoError;

/// Error type for backend storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key contains characters that cannot be mapped to a slot
    #[error("invalid bucket key: {0:?}")]
    InvalidKey(String),

    /// Storage not initialized
    #[error("storage not initialized")]
    NotInitialized,

    /// Integrity violation (read-back mismatch)
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Encryption or decryption of a sensitive bucket failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The system random source could not produce bytes
    #[error("random source unavailable")]
    RandomUnavailable,

    /// An in-process lock was poisoned by a panicking writer
    #[error("backend lock poisoned")]
    Poisoned,

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable or volatile map of bucket key to raw string slot.
///
/// Implementations must be usable from `&self`; writes to one key never touch
/// another key.
pub trait StorageBackend: Send + Sync {
    /// Read the raw slot for `key`, `None` when absent.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the raw slot for `key`.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Write `filler` over the existing slot for `key` ahead of a delete.
    ///
    /// The default replaces the slot through [`write`](Self::write). Backends
    /// whose `write` allocates new storage instead of reusing the old bytes
    /// override this to write in place.
    fn overwrite(&self, key: &str, filler: &str) -> StorageResult<()> {
        self.write(key, filler)
    }

    /// Delete the slot for `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Check if a slot exists.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key)?.is_some())
    }

    /// List every key currently present.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Volatile in-process backend.
///
/// Backs the session-scoped backup namespace and is handy in tests. Contents
/// are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(slots.remove(key).is_some())
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        let slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(slots.contains_key(key))
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(slots.keys().cloned().collect())
    }
}
