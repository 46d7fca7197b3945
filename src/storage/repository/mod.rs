// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to record store buckets.
//!
//! Each entity lives in a single bucket holding a JSON array. Every
//! mutation loads the whole bucket, changes it in memory and writes it back
//! in one `set_item` call; there is no partial write and no locking (see the
//! concurrency notes on [`crate::storage`]).

pub mod advertisements;
pub mod banners;
pub mod categories;
pub mod media;
pub mod tags;

use std::cmp::Ordering;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::audit::{AuditEvent, AuditEventType, AuditRepository};
use super::RecordStore;
use crate::error::{RepositoryError, RepositoryResult};

pub use advertisements::{
    AdLocation, AdStatus, Advertisement, AdvertisementFilter, AdvertisementPatch,
    AdvertisementRepository, AdvertisementSortField, NewAdvertisement, Targeting, TargetingPatch,
};
pub use banners::{
    Banner, BannerDesign, BannerFilter, BannerPatch, BannerRepository, BannerSortField,
    BannerStatus, BannerType, DesignButton, DesignColors, DesignCopy, DesignOverlay, DesignPatch,
    NewBanner,
};
pub use categories::{slugify, Category, CategoryRepository, UNCATEGORIZED};
pub use media::{Media, MediaFilter, MediaPatch, MediaRepository, MediaSortField, MediaType, NewMedia};
pub use tags::TagRepository;

/// A record stored as one element of a bucket array.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Bucket holding every record of this type.
    const BUCKET: &'static str;
    /// Resource name used in audit events.
    const RESOURCE: &'static str;

    type Filter: Default;
    type SortField: Copy;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn matches(&self, filter: &Self::Filter) -> bool;
    fn compare_by(&self, other: &Self, field: Self::SortField) -> Ordering;

    /// Ordering applied when the sort field compares equal.
    fn tie_break(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }
}

/// Records whose `category` points into a category side table.
pub trait Categorized: Entity {
    const CATEGORY_BUCKET: &'static str;

    fn category(&self) -> &str;
    fn set_category(&mut self, category: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Filter and sort options for `get_all`.
///
/// Without `sort_by` records are ordered by creation time.
#[derive(Debug, Clone)]
pub struct ListOptions<F, S> {
    pub filter: F,
    pub sort_by: Option<S>,
    pub order: SortOrder,
}

impl<F: Default, S> Default for ListOptions<F, S> {
    fn default() -> Self {
        Self {
            filter: F::default(),
            sort_by: None,
            order: SortOrder::default(),
        }
    }
}

impl<F, S> ListOptions<F, S> {
    pub fn filtered(filter: F) -> Self {
        Self {
            filter,
            sort_by: None,
            order: SortOrder::default(),
        }
    }

    pub fn sorted(mut self, field: S, order: SortOrder) -> Self {
        self.sort_by = Some(field);
        self.order = order;
        self
    }
}

/// Filter then sort `records`.
pub fn apply_list_options<T: Entity>(
    records: Vec<T>,
    options: &ListOptions<T::Filter, T::SortField>,
) -> Vec<T> {
    let mut selected: Vec<T> = records
        .into_iter()
        .filter(|r| r.matches(&options.filter))
        .collect();

    selected.sort_by(|a, b| {
        let primary = match options.sort_by {
            Some(field) => a.compare_by(b, field),
            None => a.created_at().cmp(&b.created_at()),
        };
        let primary = match options.order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.tie_break(b))
    });

    selected
}

/// Whole-bucket access to the records of one entity type.
pub(crate) struct Collection<'a, T> {
    store: &'a RecordStore,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> Collection<'a, T> {
    pub(crate) fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Every record; a missing or unreadable bucket loads as empty.
    pub(crate) async fn load(&self) -> Vec<T> {
        self.store.get_item(T::BUCKET, Vec::new()).await
    }

    pub(crate) async fn save(&self, records: &[T]) -> RepositoryResult<()> {
        if self.store.set_item(T::BUCKET, records).await {
            Ok(())
        } else {
            Err(RepositoryError::PersistFailed(T::BUCKET.to_string()))
        }
    }

    pub(crate) async fn find(&self, id: &str) -> Option<T> {
        self.load().await.into_iter().find(|r| r.id() == id)
    }

    pub(crate) async fn exists(&self, id: &str) -> bool {
        self.load().await.iter().any(|r| r.id() == id)
    }

    /// Append `record` and persist the bucket.
    pub(crate) async fn insert(&self, record: T) -> RepositoryResult<T> {
        let mut records = self.load().await;
        records.push(record.clone());
        self.save(&records).await?;
        Ok(record)
    }

    /// Swap in `record` for the stored record with the same id.
    ///
    /// Returns `Ok(false)` when no such record exists.
    pub(crate) async fn replace(&self, record: &T) -> RepositoryResult<bool> {
        let mut records = self.load().await;
        let Some(slot) = records.iter_mut().find(|r| r.id() == record.id()) else {
            return Ok(false);
        };
        *slot = record.clone();
        self.save(&records).await?;
        Ok(true)
    }

    /// Drop every record whose id is in `ids`, persisting only if something
    /// was removed. Returns the number removed.
    pub(crate) async fn remove_many(&self, ids: &[&str]) -> usize {
        let mut records = self.load().await;
        let before = records.len();
        records.retain(|r| !ids.contains(&r.id()));
        let removed = before - records.len();

        if removed == 0 {
            return 0;
        }
        match self.save(&records).await {
            Ok(()) => removed,
            Err(e) => {
                warn!(bucket = T::BUCKET, error = %e, "Failed to persist deletion");
                0
            }
        }
    }

    /// Best-effort audit entry for a record of this type.
    pub(crate) async fn audit(
        &self,
        event_type: AuditEventType,
        id: &str,
        actor: Option<&str>,
        details: Option<serde_json::Value>,
    ) {
        let mut event = AuditEvent::new(event_type)
            .with_actor(actor)
            .with_resource(T::RESOURCE, id);
        if let Some(details) = details {
            event = event.with_details(details);
        }
        AuditRepository::new(self.store).log(event).await;
    }
}

/// Case-insensitive substring match.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// True when `wanted` is empty or shares at least one tag with `tags`.
pub(crate) fn any_tag(tags: &[String], wanted: &[String]) -> bool {
    wanted.is_empty() || wanted.iter().any(|w| tags.contains(w))
}

/// Empty or missing categories are stored as [`UNCATEGORIZED`].
pub(crate) fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => UNCATEGORIZED.to_string(),
    }
}

/// Trim tags and drop blanks and exact duplicates, keeping first-seen order.
pub(crate) fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !cleaned.iter().any(|c| c == tag) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{day, memory_store};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Note {
        id: String,
        title: String,
        rank: i32,
        created_at: DateTime<Utc>,
    }

    #[derive(Default)]
    struct NoteFilter {
        search: Option<String>,
    }

    impl Entity for Note {
        const BUCKET: &'static str = "notes";
        const RESOURCE: &'static str = "note";
        type Filter = NoteFilter;
        type SortField = ();

        fn id(&self) -> &str {
            &self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn matches(&self, filter: &NoteFilter) -> bool {
            filter
                .search
                .as_deref()
                .is_none_or(|s| contains_ci(&self.title, s))
        }

        fn compare_by(&self, other: &Self, _field: ()) -> Ordering {
            self.title.cmp(&other.title)
        }

        fn tie_break(&self, other: &Self) -> Ordering {
            other.rank.cmp(&self.rank)
        }
    }

    fn note(id: &str, title: &str, rank: i32, d: u32) -> Note {
        Note {
            id: id.into(),
            title: title.into(),
            rank,
            created_at: day(2024, 1, d),
        }
    }

    #[test]
    fn default_order_is_newest_first() {
        let notes = vec![note("a", "x", 0, 1), note("b", "y", 0, 3), note("c", "z", 0, 2)];
        let sorted = apply_list_options(notes, &ListOptions::default());
        let ids: Vec<_> = sorted.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn ties_use_tie_break_in_both_orders() {
        let notes = vec![note("low", "same", 1, 1), note("high", "same", 9, 1)];
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let options = ListOptions::<NoteFilter, ()>::default().sorted((), order);
            let sorted = apply_list_options(notes.clone(), &options);
            assert_eq!(sorted[0].id, "high");
        }
    }

    #[test]
    fn search_is_case_insensitive() {
        let notes = vec![note("a", "Summer Sale", 0, 1), note("b", "Winter", 0, 2)];
        let options = ListOptions::filtered(NoteFilter {
            search: Some("sUMMER".into()),
        });
        let found: Vec<Note> = apply_list_options(notes, &options);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn helpers() {
        assert!(any_tag(&["a".into()], &[]));
        assert!(any_tag(&["a".into(), "b".into()], &["b".into(), "c".into()]));
        assert!(!any_tag(&["a".into()], &["c".into()]));
        assert_eq!(normalize_category(Some("  ")), UNCATEGORIZED);
        assert_eq!(normalize_category(None), UNCATEGORIZED);
        assert_eq!(normalize_category(Some("promotions")), "promotions");
        assert_eq!(
            clean_tags(&[" a ".into(), "".into(), "a".into(), "B".into()]),
            vec!["a".to_string(), "B".to_string()]
        );
    }

    #[tokio::test]
    async fn collection_round_trip() {
        let (_backend, store) = memory_store();
        let notes = Collection::<Note>::new(&store);

        notes.insert(note("a", "first", 0, 1)).await.unwrap();
        notes.insert(note("b", "second", 0, 2)).await.unwrap();
        assert!(notes.exists("a").await);

        let mut edited = notes.find("a").await.unwrap();
        edited.title = "edited".into();
        assert!(notes.replace(&edited).await.unwrap());
        assert!(!notes.replace(&note("zz", "ghost", 0, 1)).await.unwrap());
        assert_eq!(notes.find("a").await.unwrap().title, "edited");

        assert_eq!(notes.remove_many(&["a", "missing"]).await, 1);
        assert_eq!(notes.remove_many(&["missing"]).await, 0);
        assert_eq!(notes.load().await.len(), 1);
    }
}
