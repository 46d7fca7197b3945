// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared test doubles.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::storage::{
    CryptoError, CryptoGate, MemoryBackend, RecordStore, StorageBackend, StorageResult,
};

const REVERSED_PREFIX: &str = "rev:";

/// Reversible stand-in for a real cipher: reverses the text.
pub struct ReversingGate;

#[async_trait]
impl CryptoGate for ReversingGate {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(format!("{REVERSED_PREFIX}{}", plaintext.chars().rev().collect::<String>()))
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        ciphertext
            .strip_prefix(REVERSED_PREFIX)
            .map(|body| body.chars().rev().collect())
            .ok_or(CryptoError::Decrypt)
    }
}

/// In-memory store wired to the reversing gate.
pub fn memory_store() -> (Arc<MemoryBackend>, RecordStore) {
    let backend = Arc::new(MemoryBackend::new());
    let store = RecordStore::new(backend.clone(), Arc::new(ReversingGate));
    (backend, store)
}

/// Memory backend that also keeps every value ever written per key.
#[derive(Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    history: Mutex<BTreeMap<String, Vec<String>>>,
}

impl RecordingBackend {
    pub fn writes_for(&self, key: &str) -> Vec<String> {
        self.history
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

impl StorageBackend for RecordingBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.history
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        self.inner.remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys()
    }
}

/// Midnight UTC on the given date.
pub fn day(year: i32, month: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, d, 0, 0, 0).unwrap()
}
