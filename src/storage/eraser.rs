// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Overwrite-then-delete for sensitive buckets.
//!
//! ## Limits
//!
//! This is a best-effort mitigation, not cryptographic erasure. The filler
//! goes through [`StorageBackend::overwrite`](super::StorageBackend::overwrite).
//! The filesystem backend writes it over the existing file in place and syncs
//! it (its normal writes go to a temp file that is renamed over the slot,
//! which would leave the old blocks unlinked but intact). The redb backend
//! uses the default, a regular transactional write, so earlier copy-on-write
//! pages keep the old ciphertext until redb reuses them. Journaling
//! filesystems, SSD wear levelling and OS caches may retain earlier bytes
//! either way. Sensitive buckets are encrypted at rest, which is the real
//! protection; the overwrite only shortens the window in which a stale slot
//! holds ciphertext.

use std::collections::BTreeSet;

use base64ct::{Base64, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{info, warn};

use super::backend::{StorageError, StorageResult};
use super::schema::keys;
use super::RecordStore;

/// Bytes of random filler written over a sensitive slot before deletion.
pub const FILLER_BYTES: usize = 4096;

/// Secure removal of buckets.
pub struct SecureEraser<'a> {
    store: &'a RecordStore,
    rng: SystemRandom,
}

impl<'a> SecureEraser<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            rng: SystemRandom::new(),
        }
    }

    /// Remove `key`, overwriting it with random filler first when sensitive.
    ///
    /// Returns whether the key existed. A failed overwrite is logged and the
    /// delete still proceeds.
    pub fn remove(&self, key: &str) -> bool {
        if self.store.is_sensitive(key) && self.store.has_item(key) {
            if let Err(e) = self.overwrite(key) {
                warn!(key = %key, error = %e, "Failed to overwrite sensitive bucket before delete");
            }
        }
        self.store.remove_item(key)
    }

    fn overwrite(&self, key: &str) -> StorageResult<()> {
        let mut filler = vec![0u8; FILLER_BYTES];
        self.rng
            .fill(&mut filler)
            .map_err(|_| StorageError::RandomUnavailable)?;
        self.store
            .backend()
            .overwrite(key, &Base64::encode_string(&filler))
    }

    /// Erase identity and auth-token buckets plus every other sensitive key
    /// currently present. Returns how many buckets were erased.
    pub fn logout(&self) -> usize {
        let mut targets: BTreeSet<String> = keys::IDENTITY.iter().map(|k| k.to_string()).collect();
        targets.extend(
            self.store
                .keys()
                .into_iter()
                .filter(|key| self.store.is_sensitive(key)),
        );

        let erased = targets.iter().filter(|key| self.remove(key)).count();
        info!(erased, "Logout erased sensitive buckets");
        erased
    }
}
