// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Snapshot backup, non-destructive restore and age-based cleanup.
//!
//! Restores are written key by key through the record store, so sensitive
//! buckets are re-encrypted on the way back in. There is no rollback: an
//! interrupted restore leaves whatever keys were already written.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::backend::StorageBackend;
use super::schema::keys;
use super::{MemoryBackend, RecordStore, SecureEraser};

/// Default session slot for manual backups.
pub const DEFAULT_SESSION_SLOT: &str = "backup";

/// Session slot used by the user auto-backup.
pub const USERS_SESSION_SLOT: &str = "users_backup";

/// Point-in-time copy of a set of buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub timestamp: DateTime<Utc>,
    pub data: BTreeMap<String, serde_json::Value>,
}

/// Backup and restore over a record store plus a volatile session namespace.
pub struct BackupCoordinator<'a> {
    store: &'a RecordStore,
    session: &'a MemoryBackend,
}

impl<'a> BackupCoordinator<'a> {
    pub fn new(store: &'a RecordStore, session: &'a MemoryBackend) -> Self {
        Self { store, session }
    }

    /// Snapshot the given keys, or every present key when `keys` is `None`.
    ///
    /// Keys that are absent (or unreadable) at snapshot time are omitted.
    pub async fn create_backup(&self, keys: Option<&[&str]>) -> BackupSnapshot {
        let targets: Vec<String> = match keys {
            Some(keys) => keys.iter().map(|k| k.to_string()).collect(),
            None => self.store.keys(),
        };

        let mut data = BTreeMap::new();
        for key in targets {
            if let Some(value) = self.store.get_value(&key).await {
                data.insert(key, value);
            }
        }

        BackupSnapshot {
            timestamp: Utc::now(),
            data,
        }
    }

    /// Restore an untyped backup object.
    ///
    /// Returns `false` without touching the store when `backup.data` is
    /// missing or not an object. With `overwrite == false` only keys that are
    /// currently absent are written.
    pub async fn restore_backup(&self, backup: &serde_json::Value, overwrite: bool) -> bool {
        let Some(data) = backup.get("data").and_then(|d| d.as_object()) else {
            warn!("Rejected malformed backup: missing data object");
            return false;
        };
        let entries = data.iter().map(|(k, v)| (k.as_str(), v));
        self.restore_entries(entries, overwrite).await;
        true
    }

    /// Restore a typed snapshot.
    pub async fn restore_snapshot(&self, snapshot: &BackupSnapshot, overwrite: bool) -> bool {
        let entries = snapshot.data.iter().map(|(k, v)| (k.as_str(), v));
        self.restore_entries(entries, overwrite).await;
        true
    }

    async fn restore_entries<'v>(
        &self,
        entries: impl Iterator<Item = (&'v str, &'v serde_json::Value)>,
        overwrite: bool,
    ) {
        let mut written = 0usize;
        let mut skipped = 0usize;
        for (key, value) in entries {
            if !overwrite && self.store.has_item(key) {
                skipped += 1;
                continue;
            }
            if self.store.set_item(key, value).await {
                written += 1;
            }
        }
        info!(written, skipped, overwrite, "Backup restored");
    }

    /// Store a snapshot in the volatile session namespace.
    pub fn save_backup_to_session(&self, snapshot: &BackupSnapshot, slot: &str) -> bool {
        let serialized = match serde_json::to_string(snapshot) {
            Ok(s) => s,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Failed to serialize session backup");
                return false;
            }
        };
        match self.session.write(slot, &serialized) {
            Ok(()) => true,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Failed to write session backup");
                false
            }
        }
    }

    /// Fetch a snapshot from the session namespace.
    pub fn get_backup_from_session(&self, slot: &str) -> Option<BackupSnapshot> {
        let raw = match self.session.read(slot) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Failed to read session backup");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(slot = %slot, error = %e, "Session backup is malformed");
                None
            }
        }
    }

    /// Snapshot the user collection, current identity and auth token into
    /// the session namespace.
    pub async fn auto_backup_users(&self) -> bool {
        let snapshot = self.create_backup(Some(&keys::USER_BACKUP)).await;
        self.save_backup_to_session(&snapshot, USERS_SESSION_SLOT)
    }

    /// Non-destructively restore the user auto-backup.
    pub async fn restore_users_from_auto_backup(&self) -> bool {
        match self.get_backup_from_session(USERS_SESSION_SLOT) {
            Some(snapshot) => self.restore_snapshot(&snapshot, false).await,
            None => false,
        }
    }

    /// Remove every bucket whose value carries a `timestamp` older than
    /// `max_age_days`. Returns the number of buckets removed.
    ///
    /// A threshold reaching past the representable date range removes nothing.
    pub async fn cleanup_old_data(&self, max_age_days: u32) -> usize {
        let cutoff = Duration::try_days(i64::from(max_age_days))
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.cleanup_before(cutoff).await
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let eraser = SecureEraser::new(self.store);
        let mut removed = 0usize;

        for key in self.store.keys() {
            let Some(value) = self.store.get_value(&key).await else {
                continue;
            };
            let Some(timestamp) = value_timestamp(&value) else {
                continue;
            };
            if timestamp < cutoff && eraser.remove(&key) {
                removed += 1;
            }
        }

        info!(removed, cutoff = %cutoff, "Cleaned up old data");
        removed
    }
}

/// `timestamp` field as RFC 3339 text or epoch milliseconds.
fn value_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value.get("timestamp")? {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
