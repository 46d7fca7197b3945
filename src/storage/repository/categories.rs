// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Category side tables for banners and media.
//!
//! Each categorized entity has its own table of `{id, name}` entries. The
//! `uncategorized` entry is always present and cannot be deleted; deleting
//! any other category moves its records to `uncategorized`.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::{Categorized, Collection};
use crate::error::{RepositoryError, RepositoryResult, ValidationErrors};
use crate::storage::audit::{AuditEvent, AuditEventType, AuditRepository};
use crate::storage::RecordStore;

/// Reserved category id every table contains.
pub const UNCATEGORIZED: &str = "uncategorized";

const UNCATEGORIZED_NAME: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    fn uncategorized() -> Self {
        Self {
            id: UNCATEGORIZED.to_string(),
            name: UNCATEGORIZED_NAME.to_string(),
        }
    }
}

/// Derive a URL-safe id from a display name.
///
/// `"Été Promotions!"` becomes `"ete-promotions"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Repository for the category table of `T`.
pub struct CategoryRepository<'a, T> {
    store: &'a RecordStore,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Categorized> CategoryRepository<'a, T> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// All categories; `uncategorized` is seeded on first read.
    pub async fn list(&self) -> Vec<Category> {
        let mut categories: Vec<Category> =
            self.store.get_item(T::CATEGORY_BUCKET, Vec::new()).await;

        if !categories.iter().any(|c| c.id == UNCATEGORIZED) {
            categories.insert(0, Category::uncategorized());
            if !self.store.set_item(T::CATEGORY_BUCKET, &categories).await {
                warn!(bucket = T::CATEGORY_BUCKET, "Failed to seed uncategorized category");
            }
        }

        categories
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.list().await.iter().any(|c| c.id == id)
    }

    /// Create a category named `name`.
    ///
    /// Names are unique case-insensitively; the id is the slug of the name.
    pub async fn create(&self, name: &str, actor: Option<&str>) -> RepositoryResult<Category> {
        let name = name.trim();
        let mut errors = ValidationErrors::new();
        errors.require("name", name);

        let id = slugify(name);
        let mut categories = self.list().await;

        if !name.is_empty() {
            if id.is_empty() {
                errors.add("name", "must contain at least one letter or digit");
            } else if categories
                .iter()
                .any(|c| c.name.to_lowercase() == name.to_lowercase())
            {
                errors.add("name", "already exists");
            } else if categories.iter().any(|c| c.id == id) {
                errors.add("name", "conflicts with an existing category id");
            }
        }
        errors.into_result()?;

        let category = Category {
            id,
            name: name.to_string(),
        };
        categories.push(category.clone());
        if !self.store.set_item(T::CATEGORY_BUCKET, &categories).await {
            return Err(RepositoryError::PersistFailed(T::CATEGORY_BUCKET.to_string()));
        }

        self.audit(AuditEventType::CategoryCreated, &category.id, actor)
            .await;
        info!(bucket = T::CATEGORY_BUCKET, category_id = %category.id, "Created category");
        Ok(category)
    }

    /// Delete a category and move its records to `uncategorized`.
    ///
    /// Returns `Ok(false)` if the category does not exist.
    pub async fn delete(&self, id: &str, actor: Option<&str>) -> RepositoryResult<bool> {
        if id == UNCATEGORIZED {
            return Err(RepositoryError::ReservedCategory(id.to_string()));
        }

        let mut categories = self.list().await;
        let before = categories.len();
        categories.retain(|c| c.id != id);
        if categories.len() == before {
            return Ok(false);
        }

        let records = Collection::<T>::new(self.store);
        let mut all = records.load().await;
        let mut reassigned = 0usize;
        for record in all.iter_mut().filter(|r| r.category() == id) {
            record.set_category(UNCATEGORIZED.to_string());
            reassigned += 1;
        }
        if reassigned > 0 {
            records.save(&all).await?;
        }

        if !self.store.set_item(T::CATEGORY_BUCKET, &categories).await {
            return Err(RepositoryError::PersistFailed(T::CATEGORY_BUCKET.to_string()));
        }

        self.audit(AuditEventType::CategoryDeleted, id, actor).await;
        info!(
            bucket = T::CATEGORY_BUCKET,
            category_id = %id,
            reassigned,
            "Deleted category"
        );
        Ok(true)
    }

    async fn audit(&self, event_type: AuditEventType, id: &str, actor: Option<&str>) {
        let event = AuditEvent::new(event_type)
            .with_actor(actor)
            .with_resource(T::CATEGORY_BUCKET, id);
        AuditRepository::new(self.store).log(event).await;
    }
}
