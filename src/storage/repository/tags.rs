// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Global tag side table.

use tracing::{debug, warn};

use super::super::schema::keys;
use super::super::RecordStore;

/// Repository for the shared tag list used by banners and media.
pub struct TagRepository<'a> {
    store: &'a RecordStore,
}

impl<'a> TagRepository<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// All known tags, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.store.get_item(keys::TAGS, Vec::new()).await;
        tags.sort();
        tags
    }

    /// Append tags not seen before. Blank tags are ignored.
    ///
    /// The bucket is only written when something was added. Returns the
    /// number of new tags.
    pub async fn register(&self, tags: &[String]) -> usize {
        let mut known: Vec<String> = self.store.get_item(keys::TAGS, Vec::new()).await;
        let before = known.len();

        for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !known.iter().any(|k| k == tag) {
                known.push(tag.to_string());
            }
        }

        let added = known.len() - before;
        if added == 0 {
            return 0;
        }
        if !self.store.set_item(keys::TAGS, &known).await {
            warn!(added, "Failed to persist new tags");
            return 0;
        }
        debug!(added, "Registered tags");
        added
    }
}
