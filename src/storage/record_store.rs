// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyed-bucket read/write primitive.
//!
//! ## Failure Model
//!
//! Every storage-level failure (backend I/O, serialization, decryption) is
//! caught here, logged with `tracing`, and degraded: reads return the
//! caller-supplied default and writes report `false`. Callers therefore
//! cannot tell an absent bucket from a corrupt one. This trades precision
//! for availability and is intentional.
//!
//! ## Sensitive Buckets
//!
//! Keys the [`BucketSchema`] classifies as sensitive are serialized, passed
//! through the [`CryptoGate`], and written as [`ENCRYPTION_MARKER`] followed
//! by the ciphertext. On read the marker is stripped and the payload
//! decrypted; if that fails the raw slot is tried as plain JSON (legacy or
//! migrated data) before giving up.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::backend::{StorageBackend, StorageResult};
use super::crypto::CryptoGate;
use super::schema::BucketSchema;

/// Literal prefix marking an encrypted slot.
pub const ENCRYPTION_MARKER: &str = "enc:v1:";

/// Durable keyed-bucket store with transparent encryption of sensitive buckets.
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    crypto: Arc<dyn CryptoGate>,
    schema: BucketSchema,
}

impl RecordStore {
    /// Create a store with the default bucket schema.
    pub fn new(backend: Arc<dyn StorageBackend>, crypto: Arc<dyn CryptoGate>) -> Self {
        Self {
            backend,
            crypto,
            schema: BucketSchema::default(),
        }
    }

    /// Replace the bucket schema.
    pub fn with_schema(mut self, schema: BucketSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn schema(&self) -> &BucketSchema {
        &self.schema
    }

    /// Whether `key` is encrypted at rest and securely erased.
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.schema.is_sensitive(key)
    }

    /// Raw backend access for the eraser, which must bypass serialization.
    pub(crate) fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Serialize and write `value` under `key`, encrypting sensitive buckets.
    ///
    /// Returns `false` (after logging) if anything fails.
    pub async fn set_item<T>(&self, key: &str, value: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        match self.try_set_item(key, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to write bucket");
                false
            }
        }
    }

    async fn try_set_item<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize + ?Sized,
    {
        let serialized = serde_json::to_string(value)?;
        let payload = if self.is_sensitive(key) {
            let ciphertext = self.crypto.encrypt(&serialized).await?;
            format!("{ENCRYPTION_MARKER}{ciphertext}")
        } else {
            serialized
        };
        self.backend.write(key, &payload)
    }

    /// Read and deserialize `key`, returning `default` when the bucket is
    /// absent or cannot be decoded as `T`.
    pub async fn get_item<T>(&self, key: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.get_value(key).await else {
            return default;
        };
        match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Bucket does not match expected shape, using default");
                default
            }
        }
    }

    /// Read `key` as an untyped JSON value.
    pub async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read bucket");
                return None;
            }
        };
        self.decode(key, &raw).await
    }

    async fn decode(&self, key: &str, raw: &str) -> Option<serde_json::Value> {
        if let Some(ciphertext) = raw.strip_prefix(ENCRYPTION_MARKER) {
            match self.crypto.decrypt(ciphertext).await {
                Ok(plaintext) => match serde_json::from_str(&plaintext) {
                    Ok(value) => return Some(value),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Decrypted bucket is not valid JSON")
                    }
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to decrypt bucket, trying as plain")
                }
            }
        }

        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Bucket is unreadable, using default");
                None
            }
        }
    }

    /// Delete `key` directly (no overwrite). Returns whether it existed.
    ///
    /// Use [`SecureEraser::remove`](super::SecureEraser::remove) for
    /// sensitive buckets.
    pub fn remove_item(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(existed) => {
                debug!(key = %key, existed, "Removed bucket");
                existed
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to remove bucket");
                false
            }
        }
    }

    /// Check whether `key` is present.
    pub fn has_item(&self, key: &str) -> bool {
        match self.backend.contains(key) {
            Ok(present) => present,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to check bucket");
                false
            }
        }
    }

    /// Every key currently present in the backend.
    pub fn keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list buckets");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::crypto::AeadCryptoGate;
    use crate::storage::schema::keys;
    use crate::storage::MemoryBackend;
    use crate::test_support::{memory_store, ReversingGate};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        token: String,
        expires: i64,
    }

    #[tokio::test]
    async fn plain_bucket_is_stored_as_json() {
        let (backend, store) = memory_store();
        assert!(store.set_item(keys::TAGS, &vec!["summer", "sale"]).await);

        let raw = backend.read(keys::TAGS).unwrap().unwrap();
        assert_eq!(raw, r#"["summer","sale"]"#);

        let tags: Vec<String> = store.get_item(keys::TAGS, Vec::new()).await;
        assert_eq!(tags, vec!["summer", "sale"]);
    }

    #[tokio::test]
    async fn sensitive_bucket_is_marked_and_encrypted() {
        let (backend, store) = memory_store();
        let session = Session {
            token: "abc".into(),
            expires: 42,
        };
        assert!(store.set_item(keys::AUTH_TOKEN, &session).await);

        let raw = backend.read(keys::AUTH_TOKEN).unwrap().unwrap();
        assert!(raw.starts_with(ENCRYPTION_MARKER));
        assert!(!raw.contains("abc"));

        let read: Option<Session> = store.get_item(keys::AUTH_TOKEN, None).await;
        assert_eq!(read, Some(session));
    }

    #[tokio::test]
    async fn prefixed_keys_are_encrypted() {
        let (backend, store) = memory_store();
        store.set_item("payment_cards", &json!(["4111"])).await;
        let raw = backend.read("payment_cards").unwrap().unwrap();
        assert!(raw.starts_with(ENCRYPTION_MARKER));
    }

    #[tokio::test]
    async fn missing_bucket_returns_default() {
        let (_backend, store) = memory_store();
        let value: Vec<String> = store.get_item("nothing", vec!["fallback".into()]).await;
        assert_eq!(value, vec!["fallback"]);
        assert!(store.get_value("nothing").await.is_none());
    }

    #[tokio::test]
    async fn plain_json_in_sensitive_bucket_is_still_readable() {
        let (backend, store) = memory_store();
        backend.write(keys::USERS, r#"[{"id":"u1"}]"#).unwrap();

        let users = store.get_value(keys::USERS).await;
        assert_eq!(users, Some(json!([{"id": "u1"}])));
    }

    #[tokio::test]
    async fn undecryptable_marker_payload_falls_back_to_default() {
        let (backend, store) = memory_store();
        backend
            .write(keys::AUTH_TOKEN, &format!("{ENCRYPTION_MARKER}garbage"))
            .unwrap();

        let value: String = store.get_item(keys::AUTH_TOKEN, "default".into()).await;
        assert_eq!(value, "default");
    }

    #[tokio::test]
    async fn corrupt_plain_bucket_falls_back_to_default() {
        let (backend, store) = memory_store();
        backend.write(keys::BANNERS, "{not json").unwrap();

        let banners: Vec<serde_json::Value> = store.get_item(keys::BANNERS, Vec::new()).await;
        assert!(banners.is_empty());
    }

    #[tokio::test]
    async fn shape_mismatch_falls_back_to_default() {
        let (_backend, store) = memory_store();
        store.set_item(keys::TAGS, &json!({"not": "a list"})).await;

        let tags: Vec<String> = store.get_item(keys::TAGS, Vec::new()).await;
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn remove_and_has_item() {
        let (_backend, store) = memory_store();
        store.set_item(keys::MEDIA, &json!([])).await;
        assert!(store.has_item(keys::MEDIA));
        assert!(store.remove_item(keys::MEDIA));
        assert!(!store.has_item(keys::MEDIA));
        assert!(!store.remove_item(keys::MEDIA));
    }

    #[tokio::test]
    async fn keys_lists_everything() {
        let (_backend, store) = memory_store();
        store.set_item(keys::MEDIA, &json!([])).await;
        store.set_item(keys::USERS, &json!([])).await;
        assert_eq!(store.keys(), vec![keys::MEDIA.to_string(), keys::USERS.to_string()]);
    }

    #[tokio::test]
    async fn works_with_aead_gate() {
        let backend = Arc::new(MemoryBackend::new());
        let gate = AeadCryptoGate::from_base64(&AeadCryptoGate::generate_key().unwrap()).unwrap();
        let store = RecordStore::new(backend.clone(), Arc::new(gate));

        store.set_item(keys::CURRENT_USER, &json!({"id": "u1"})).await;
        assert_eq!(
            store.get_value(keys::CURRENT_USER).await,
            Some(json!({"id": "u1"}))
        );
    }

    #[tokio::test]
    async fn other_gate_cannot_read_and_degrades() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = RecordStore::new(backend.clone(), Arc::new(ReversingGate));
        writer.set_item(keys::AUTH_TOKEN, &json!("secret")).await;

        let gate = AeadCryptoGate::from_base64(&AeadCryptoGate::generate_key().unwrap()).unwrap();
        let reader = RecordStore::new(backend, Arc::new(gate));
        let value: Option<String> = reader.get_item(keys::AUTH_TOKEN, None).await;
        assert_eq!(value, None);
    }
}
