// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Advertisement repository.
//!
//! Status is derived by [`crate::scheduling`]. Reads return records with
//! their status recomputed against the repository clock but do not write
//! it back; every mutator (and [`AdvertisementRepository::refresh_statuses`])
//! persists the recomputed status.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    apply_list_options, contains_ci, Banner, BannerRepository, Collection, Entity, ListOptions,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{RepositoryResult, ValidationErrors};
use crate::scheduling::{self, PlacedAdvertisement};
use crate::storage::audit::AuditEventType;
use crate::storage::schema::keys;
use crate::storage::RecordStore;

/// Fixed site placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdLocation {
    HomeTop,
    HomeMiddle,
    HomeBottom,
    SidebarTop,
    SidebarBottom,
    ArticleTop,
    ArticleInline,
    ArticleBottom,
    Footer,
    Popup,
}

impl AdLocation {
    pub const ALL: [AdLocation; 10] = [
        AdLocation::HomeTop,
        AdLocation::HomeMiddle,
        AdLocation::HomeBottom,
        AdLocation::SidebarTop,
        AdLocation::SidebarBottom,
        AdLocation::ArticleTop,
        AdLocation::ArticleInline,
        AdLocation::ArticleBottom,
        AdLocation::Footer,
        AdLocation::Popup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdLocation::HomeTop => "home_top",
            AdLocation::HomeMiddle => "home_middle",
            AdLocation::HomeBottom => "home_bottom",
            AdLocation::SidebarTop => "sidebar_top",
            AdLocation::SidebarBottom => "sidebar_bottom",
            AdLocation::ArticleTop => "article_top",
            AdLocation::ArticleInline => "article_inline",
            AdLocation::ArticleBottom => "article_bottom",
            AdLocation::Footer => "footer",
            AdLocation::Popup => "popup",
        }
    }
}

impl fmt::Display for AdLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdLocation {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AdLocation::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationErrors::single("location", format!("unknown location `{s}`")))
    }
}

/// Advertisement lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    Draft,
    Scheduled,
    Active,
    Inactive,
    Expired,
}

impl AdStatus {
    /// Manually set states that recomputation never overrides.
    pub fn is_sticky(&self) -> bool {
        matches!(self, AdStatus::Draft | AdStatus::Inactive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdStatus::Draft => "draft",
            AdStatus::Scheduled => "scheduled",
            AdStatus::Active => "active",
            AdStatus::Inactive => "inactive",
            AdStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for AdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdStatus {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(AdStatus::Draft),
            "scheduled" => Ok(AdStatus::Scheduled),
            "active" => Ok(AdStatus::Active),
            "inactive" => Ok(AdStatus::Inactive),
            "expired" => Ok(AdStatus::Expired),
            _ => Err(ValidationErrors::single("status", format!("unknown status `{s}`"))),
        }
    }
}

/// Audience restrictions. Empty lists mean "everyone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Targeting {
    pub roles: Vec<String>,
    pub countries: Vec<String>,
    pub languages: Vec<String>,
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TargetingPatch {
    pub roles: Option<Vec<String>>,
    pub countries: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub devices: Option<Vec<String>>,
}

impl Targeting {
    pub fn merge(&mut self, patch: TargetingPatch) {
        if let Some(roles) = patch.roles {
            self.roles = roles;
        }
        if let Some(countries) = patch.countries {
            self.countries = countries;
        }
        if let Some(languages) = patch.languages {
            self.languages = languages;
        }
        if let Some(devices) = patch.devices {
            self.devices = devices;
        }
    }
}

/// A time-boxed placement of a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub id: String,
    pub name: String,
    pub banner_id: String,
    pub location: AdLocation,
    pub status: AdStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Pages this ad may appear on; empty means every page.
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub targeting: Targeting,
    #[serde(default)]
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub is_sponsored: bool,
    #[serde(default)]
    pub max_impressions: Option<u64>,
    #[serde(default)]
    pub max_clicks: Option<u64>,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
}

/// Input for [`AdvertisementRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewAdvertisement {
    pub name: String,
    pub banner_id: String,
    pub location: Option<AdLocation>,
    /// Only `Draft` and `Inactive` are kept; anything else is derived.
    pub status: Option<AdStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub pages: Vec<String>,
    pub targeting: Targeting,
    pub priority: i32,
    pub is_sponsored: bool,
    pub max_impressions: Option<u64>,
    pub max_clicks: Option<u64>,
}

/// Partial update. Double options clear a field with `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct AdvertisementPatch {
    pub name: Option<String>,
    pub banner_id: Option<String>,
    pub location: Option<AdLocation>,
    pub status: Option<AdStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub pages: Option<Vec<String>>,
    pub targeting: Option<TargetingPatch>,
    pub priority: Option<i32>,
    pub is_sponsored: Option<bool>,
    pub max_impressions: Option<Option<u64>>,
    pub max_clicks: Option<Option<u64>>,
}

#[derive(Debug, Clone, Default)]
pub struct AdvertisementFilter {
    /// Matched against the name.
    pub search: Option<String>,
    /// Compared with the recomputed status.
    pub status: Option<AdStatus>,
    pub location: Option<AdLocation>,
    pub banner_id: Option<String>,
    pub is_sponsored: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementSortField {
    Name,
    Priority,
    StartDate,
    CreatedAt,
    Impressions,
    Clicks,
}

impl Entity for Advertisement {
    const BUCKET: &'static str = keys::ADVERTISEMENTS;
    const RESOURCE: &'static str = "advertisement";
    type Filter = AdvertisementFilter;
    type SortField = AdvertisementSortField;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &AdvertisementFilter) -> bool {
        filter
            .search
            .as_deref()
            .is_none_or(|s| contains_ci(&self.name, s))
            && filter.status.is_none_or(|s| s == self.status)
            && filter.location.is_none_or(|l| l == self.location)
            && filter
                .banner_id
                .as_deref()
                .is_none_or(|b| b == self.banner_id)
            && filter.is_sponsored.is_none_or(|s| s == self.is_sponsored)
    }

    fn compare_by(&self, other: &Self, field: AdvertisementSortField) -> Ordering {
        match field {
            AdvertisementSortField::Name => {
                self.name.to_lowercase().cmp(&other.name.to_lowercase())
            }
            AdvertisementSortField::Priority => self.priority.cmp(&other.priority),
            AdvertisementSortField::StartDate => self.start_date.cmp(&other.start_date),
            AdvertisementSortField::CreatedAt => self.created_at.cmp(&other.created_at),
            AdvertisementSortField::Impressions => self.impressions.cmp(&other.impressions),
            AdvertisementSortField::Clicks => self.clicks.cmp(&other.clicks),
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority)
    }
}

/// Field checks that need no other bucket.
pub fn validate(ad: &Advertisement) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.require("name", &ad.name);
    errors.require("bannerId", &ad.banner_id);
    if let Some(end) = ad.end_date {
        if end <= ad.start_date {
            errors.add("endDate", "must be after startDate");
        }
    }
    if ad.max_impressions == Some(0) {
        errors.add("maxImpressions", "must be greater than 0");
    }
    if ad.max_clicks == Some(0) {
        errors.add("maxClicks", "must be greater than 0");
    }
    errors
}

/// Repository for advertisements.
pub struct AdvertisementRepository<'a> {
    store: &'a RecordStore,
    records: Collection<'a, Advertisement>,
    clock: Arc<dyn Clock>,
}

impl<'a> AdvertisementRepository<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            records: Collection::new(store),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` as the source of "now".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load_current(&self) -> Vec<Advertisement> {
        let now = self.now();
        self.records
            .load()
            .await
            .into_iter()
            .map(|ad| scheduling::with_recomputed_status(ad, now))
            .collect()
    }

    pub async fn get_all(
        &self,
        options: &ListOptions<AdvertisementFilter, AdvertisementSortField>,
    ) -> Vec<Advertisement> {
        apply_list_options(self.load_current().await, options)
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Advertisement> {
        let now = self.now();
        self.records
            .find(id)
            .await
            .map(|ad| scheduling::with_recomputed_status(ad, now))
    }

    pub async fn create(
        &self,
        data: NewAdvertisement,
        actor: Option<&str>,
    ) -> RepositoryResult<Advertisement> {
        let now = self.now();
        let mut errors = ValidationErrors::new();
        if data.location.is_none() {
            errors.add("location", "is required");
        }
        if data.start_date.is_none() {
            errors.add("startDate", "is required");
        }

        let status = match data.status {
            Some(s) if s.is_sticky() => s,
            _ => AdStatus::Scheduled,
        };
        let ad = Advertisement {
            id: uuid::Uuid::new_v4().to_string(),
            name: data.name.trim().to_string(),
            banner_id: data.banner_id.trim().to_string(),
            location: data.location.unwrap_or(AdLocation::HomeTop),
            status,
            start_date: data.start_date.unwrap_or(now),
            end_date: data.end_date,
            pages: data.pages,
            targeting: data.targeting,
            priority: data.priority,
            created_at: now,
            created_by: actor.map(str::to_string),
            updated_at: None,
            updated_by: None,
            is_sponsored: data.is_sponsored,
            max_impressions: data.max_impressions,
            max_clicks: data.max_clicks,
            impressions: 0,
            clicks: 0,
        };
        errors.extend(validate(&ad));
        self.check_banner(&ad.banner_id, &mut errors).await;
        errors.into_result()?;

        let ad = self
            .records
            .insert(scheduling::with_recomputed_status(ad, now))
            .await?;
        self.records
            .audit(AuditEventType::RecordCreated, &ad.id, actor, None)
            .await;
        info!(ad_id = %ad.id, location = %ad.location, status = %ad.status, "Created advertisement");
        Ok(ad)
    }

    /// Merge `patch` into the advertisement with `id`. `Ok(None)` if it does
    /// not exist.
    pub async fn update(
        &self,
        id: &str,
        patch: AdvertisementPatch,
        actor: Option<&str>,
    ) -> RepositoryResult<Option<Advertisement>> {
        let Some(mut ad) = self.records.find(id).await else {
            return Ok(None);
        };

        let banner_changed = patch
            .banner_id
            .as_deref()
            .is_some_and(|b| b.trim() != ad.banner_id);
        if let Some(name) = patch.name {
            ad.name = name.trim().to_string();
        }
        if let Some(banner_id) = patch.banner_id {
            ad.banner_id = banner_id.trim().to_string();
        }
        if let Some(location) = patch.location {
            ad.location = location;
        }
        if let Some(status) = patch.status {
            ad.status = status;
        }
        if let Some(start_date) = patch.start_date {
            ad.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            ad.end_date = end_date;
        }
        if let Some(pages) = patch.pages {
            ad.pages = pages;
        }
        if let Some(targeting) = patch.targeting {
            ad.targeting.merge(targeting);
        }
        if let Some(priority) = patch.priority {
            ad.priority = priority;
        }
        if let Some(is_sponsored) = patch.is_sponsored {
            ad.is_sponsored = is_sponsored;
        }
        if let Some(max_impressions) = patch.max_impressions {
            ad.max_impressions = max_impressions;
        }
        if let Some(max_clicks) = patch.max_clicks {
            ad.max_clicks = max_clicks;
        }

        let mut errors = validate(&ad);
        if banner_changed {
            self.check_banner(&ad.banner_id, &mut errors).await;
        }
        errors.into_result()?;

        let now = self.now();
        ad.updated_at = Some(now);
        ad.updated_by = actor.map(str::to_string);
        let ad = scheduling::with_recomputed_status(ad, now);

        if !self.records.replace(&ad).await? {
            return Ok(None);
        }
        self.records
            .audit(AuditEventType::RecordUpdated, id, actor, None)
            .await;
        Ok(Some(ad))
    }

    /// Set the status by hand. Only `Draft` and `Inactive` survive the
    /// recompute that follows; other values act as "resume scheduling".
    pub async fn change_status(
        &self,
        id: &str,
        status: AdStatus,
        actor: Option<&str>,
    ) -> RepositoryResult<Option<Advertisement>> {
        let Some(mut ad) = self.records.find(id).await else {
            return Ok(None);
        };
        let previous = ad.status;
        let now = self.now();
        ad.status = status;
        ad.updated_at = Some(now);
        ad.updated_by = actor.map(str::to_string);
        let ad = scheduling::with_recomputed_status(ad, now);

        if !self.records.replace(&ad).await? {
            return Ok(None);
        }
        self.records
            .audit(
                AuditEventType::StatusChanged,
                id,
                actor,
                Some(serde_json::json!({
                    "from": previous,
                    "requested": status,
                    "to": ad.status,
                })),
            )
            .await;
        info!(ad_id = %id, from = %previous, to = %ad.status, "Changed advertisement status");
        Ok(Some(ad))
    }

    pub async fn delete(&self, id: &str, actor: Option<&str>) -> bool {
        let removed = self.records.remove_many(&[id]).await == 1;
        if removed {
            self.records
                .audit(AuditEventType::RecordDeleted, id, actor, None)
                .await;
        }
        removed
    }

    pub async fn bulk_delete(&self, ids: &[&str], actor: Option<&str>) -> usize {
        let removed = self.records.remove_many(ids).await;
        if removed > 0 {
            self.records
                .audit(
                    AuditEventType::RecordsBulkDeleted,
                    &ids.join(","),
                    actor,
                    Some(serde_json::json!({ "requested": ids.len(), "removed": removed })),
                )
                .await;
        }
        removed
    }

    /// Count one impression. `Ok(None)` if the advertisement does not exist.
    pub async fn record_impression(&self, id: &str) -> RepositoryResult<Option<Advertisement>> {
        self.apply_counter(id, scheduling::record_impression).await
    }

    /// Count one click. `Ok(None)` if the advertisement does not exist.
    pub async fn record_click(&self, id: &str) -> RepositoryResult<Option<Advertisement>> {
        self.apply_counter(id, scheduling::record_click).await
    }

    async fn apply_counter(
        &self,
        id: &str,
        counter: fn(Advertisement, DateTime<Utc>) -> Advertisement,
    ) -> RepositoryResult<Option<Advertisement>> {
        let Some(ad) = self.records.find(id).await else {
            return Ok(None);
        };
        let ad = counter(ad, self.now());
        if !self.records.replace(&ad).await? {
            return Ok(None);
        }
        debug!(
            ad_id = %id,
            impressions = ad.impressions,
            clicks = ad.clicks,
            status = %ad.status,
            "Recorded advertisement activity"
        );
        Ok(Some(ad))
    }

    /// Recompute and persist every status. Returns how many changed.
    pub async fn refresh_statuses(&self) -> RepositoryResult<usize> {
        let now = self.now();
        let mut records = self.records.load().await;
        let mut changed = 0usize;

        for ad in records.iter_mut() {
            let status = scheduling::recompute_status(ad, now);
            if status != ad.status {
                debug!(ad_id = %ad.id, from = %ad.status, to = %status, "Status transition");
                ad.status = status;
                changed += 1;
            }
        }

        if changed > 0 {
            self.records.save(&records).await?;
        }
        Ok(changed)
    }

    /// Eligible advertisements for one placement, highest priority first,
    /// each joined with its banner.
    ///
    /// With `page` set, only ads listing that page (or listing none) are
    /// kept. Ads whose banner no longer exists are skipped.
    pub async fn get_active_ads_for_location(
        &self,
        location: AdLocation,
        page: Option<&str>,
        limit: usize,
    ) -> Vec<PlacedAdvertisement> {
        let selected = scheduling::select_for_placement(
            self.records.load().await,
            location,
            page,
            limit,
            self.now(),
        );
        if selected.is_empty() {
            return Vec::new();
        }

        let banners: HashMap<String, Banner> = BannerRepository::new(self.store)
            .load_all()
            .await
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        selected
            .into_iter()
            .filter_map(|advertisement| {
                let Some(banner) = banners.get(&advertisement.banner_id).cloned() else {
                    debug!(
                        ad_id = %advertisement.id,
                        banner_id = %advertisement.banner_id,
                        "Skipping ad with missing banner"
                    );
                    return None;
                };
                Some(PlacedAdvertisement {
                    advertisement,
                    banner,
                })
            })
            .collect()
    }

    async fn check_banner(&self, banner_id: &str, errors: &mut ValidationErrors) {
        if !banner_id.is_empty() && !BannerRepository::new(self.store).exists(banner_id).await {
            errors.add("bannerId", "references unknown banner");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::repository::{Media, MediaRepository, NewBanner, NewMedia, SortOrder};
    use crate::storage::BannerType;
    use crate::test_support::{day, memory_store};

    async fn seed_banner(store: &RecordStore) -> Banner {
        let media: Media = MediaRepository::new(store)
            .create(
                NewMedia {
                    name: "Hero".into(),
                    filename: "hero.png".into(),
                    path: "/uploads/hero.png".into(),
                    size: 1,
                    mime_type: "image/png".into(),
                    ..NewMedia::default()
                },
                None,
            )
            .await
            .unwrap();
        BannerRepository::new(store)
            .create(
                NewBanner {
                    title: "Sale".into(),
                    banner_type: Some(BannerType::Image),
                    media_id: media.id,
                    ..NewBanner::default()
                },
                None,
            )
            .await
            .unwrap()
    }

    fn repo_at(store: &RecordStore, now: DateTime<Utc>) -> AdvertisementRepository<'_> {
        AdvertisementRepository::new(store).with_clock(Arc::new(FixedClock(now)))
    }

    fn new_ad(name: &str, banner_id: &str, priority: i32) -> NewAdvertisement {
        NewAdvertisement {
            name: name.into(),
            banner_id: banner_id.into(),
            location: Some(AdLocation::HomeTop),
            start_date: Some(day(2024, 1, 10)),
            end_date: Some(day(2024, 1, 20)),
            priority,
            ..NewAdvertisement::default()
        }
    }

    #[test]
    fn parses_location_and_status() {
        assert_eq!("home_top".parse::<AdLocation>().unwrap(), AdLocation::HomeTop);
        assert!("basement".parse::<AdLocation>().unwrap_err().has_field("location"));
        assert_eq!("Expired".parse::<AdStatus>().unwrap(), AdStatus::Expired);
        assert_eq!(
            serde_json::to_value(AdLocation::ArticleInline).unwrap(),
            "article_inline"
        );
    }

    #[tokio::test]
    async fn create_validates_dates_and_banner() {
        let (_backend, store) = memory_store();
        let repo = repo_at(&store, day(2024, 1, 5));

        let mut data = new_ad("Launch", "missing", 0);
        data.end_date = Some(day(2024, 1, 10));
        data.location = None;
        let err = repo.create(data, None).await.unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has_field("endDate"));
        assert!(errors.has_field("bannerId"));
        assert!(errors.has_field("location"));
        assert!(!store.has_item(keys::ADVERTISEMENTS));
    }

    #[tokio::test]
    async fn create_derives_status_unless_sticky() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let repo = repo_at(&store, day(2024, 1, 5));

        let scheduled = repo.create(new_ad("A", &banner.id, 0), None).await.unwrap();
        assert_eq!(scheduled.status, AdStatus::Scheduled);

        let mut data = new_ad("B", &banner.id, 0);
        data.status = Some(AdStatus::Draft);
        let draft = repo.create(data, None).await.unwrap();
        assert_eq!(draft.status, AdStatus::Draft);
    }

    #[tokio::test]
    async fn reads_recompute_without_persisting() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let ad = repo_at(&store, day(2024, 1, 5))
            .create(new_ad("A", &banner.id, 0), None)
            .await
            .unwrap();

        let later = repo_at(&store, day(2024, 1, 15));
        assert_eq!(later.get_by_id(&ad.id).await.unwrap().status, AdStatus::Active);

        let raw: Vec<Advertisement> = store.get_item(keys::ADVERTISEMENTS, Vec::new()).await;
        assert_eq!(raw[0].status, AdStatus::Scheduled);

        assert_eq!(later.refresh_statuses().await.unwrap(), 1);
        assert_eq!(later.refresh_statuses().await.unwrap(), 0);
        let raw: Vec<Advertisement> = store.get_item(keys::ADVERTISEMENTS, Vec::new()).await;
        assert_eq!(raw[0].status, AdStatus::Active);
    }

    #[tokio::test]
    async fn update_merges_targeting_and_clears_end_date() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let repo = repo_at(&store, day(2024, 1, 25));

        let mut data = new_ad("A", &banner.id, 0);
        data.targeting = Targeting {
            roles: vec!["member".into()],
            countries: vec!["FR".into()],
            ..Targeting::default()
        };
        let ad = repo.create(data, None).await.unwrap();
        assert_eq!(ad.status, AdStatus::Expired);

        let patch = AdvertisementPatch {
            end_date: Some(None),
            targeting: Some(TargetingPatch {
                countries: Some(vec!["DE".into()]),
                ..TargetingPatch::default()
            }),
            ..AdvertisementPatch::default()
        };
        let updated = repo.update(&ad.id, patch, Some("editor")).await.unwrap().unwrap();
        assert_eq!(updated.targeting.roles, vec!["member".to_string()]);
        assert_eq!(updated.targeting.countries, vec!["DE".to_string()]);
        assert_eq!(updated.end_date, None);
        assert_eq!(updated.status, AdStatus::Active);
        assert_eq!(updated.updated_by.as_deref(), Some("editor"));

        let bad = AdvertisementPatch {
            end_date: Some(Some(day(2024, 1, 1))),
            ..AdvertisementPatch::default()
        };
        let err = repo.update(&ad.id, bad, None).await.unwrap_err();
        assert!(err.validation().unwrap().has_field("endDate"));
        assert!(repo
            .update("missing", AdvertisementPatch::default(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn change_status_keeps_only_sticky_states() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let repo = repo_at(&store, day(2024, 1, 15));
        let ad = repo.create(new_ad("A", &banner.id, 0), None).await.unwrap();

        let paused = repo
            .change_status(&ad.id, AdStatus::Inactive, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paused.status, AdStatus::Inactive);
        assert_eq!(repo.get_by_id(&ad.id).await.unwrap().status, AdStatus::Inactive);

        let resumed = repo
            .change_status(&ad.id, AdStatus::Expired, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resumed.status, AdStatus::Active);
    }

    #[tokio::test]
    async fn impression_cap_expires_and_persists() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let repo = repo_at(&store, day(2024, 1, 15));

        let mut data = new_ad("A", &banner.id, 0);
        data.max_impressions = Some(2);
        let ad = repo.create(data, None).await.unwrap();

        let once = repo.record_impression(&ad.id).await.unwrap().unwrap();
        assert_eq!(once.impressions, 1);
        assert_eq!(once.status, AdStatus::Active);

        let twice = repo.record_impression(&ad.id).await.unwrap().unwrap();
        assert_eq!(twice.impressions, 2);
        assert_eq!(twice.status, AdStatus::Expired);

        let clicked = repo.record_click(&ad.id).await.unwrap().unwrap();
        assert_eq!(clicked.clicks, 1);
        assert!(repo.record_click("missing").await.unwrap().is_none());

        let raw: Vec<Advertisement> = store.get_item(keys::ADVERTISEMENTS, Vec::new()).await;
        assert_eq!(raw[0].impressions, 2);
        assert_eq!(raw[0].status, AdStatus::Expired);
    }

    #[tokio::test]
    async fn get_all_ties_break_on_priority() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let repo = repo_at(&store, day(2024, 1, 15));

        repo.create(new_ad("Same", &banner.id, 1), None).await.unwrap();
        repo.create(new_ad("Same", &banner.id, 5), None).await.unwrap();
        repo.create(new_ad("Other", &banner.id, 3), None).await.unwrap();

        let options = ListOptions::default().sorted(AdvertisementSortField::Name, SortOrder::Descending);
        let listed = repo.get_all(&options).await;
        let order: Vec<_> = listed.iter().map(|a| (a.name.as_str(), a.priority)).collect();
        assert_eq!(order, [("Same", 5), ("Same", 1), ("Other", 3)]);

        let active = repo
            .get_all(&ListOptions::filtered(AdvertisementFilter {
                status: Some(AdStatus::Active),
                search: Some("oth".into()),
                ..AdvertisementFilter::default()
            }))
            .await;
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn placement_query_joins_banners() {
        let (_backend, store) = memory_store();
        let banner = seed_banner(&store).await;
        let repo = repo_at(&store, day(2024, 1, 15));

        let mut about = new_ad("About only", &banner.id, 10);
        about.pages = vec!["about".into()];
        repo.create(about, None).await.unwrap();

        let mut pricing = new_ad("Pricing only", &banner.id, 50);
        pricing.pages = vec!["pricing".into()];
        repo.create(pricing, None).await.unwrap();

        repo.create(new_ad("Everywhere", &banner.id, 5), None).await.unwrap();

        let mut sidebar = new_ad("Sidebar", &banner.id, 99);
        sidebar.location = Some(AdLocation::SidebarTop);
        repo.create(sidebar, None).await.unwrap();

        let mut draft = new_ad("Draft", &banner.id, 100);
        draft.status = Some(AdStatus::Draft);
        repo.create(draft, None).await.unwrap();

        let top = repo
            .get_active_ads_for_location(AdLocation::HomeTop, Some("about"), 1)
            .await;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].advertisement.name, "About only");
        assert_eq!(top[0].banner.id, banner.id);

        let all = repo
            .get_active_ads_for_location(AdLocation::HomeTop, Some("about"), 10)
            .await;
        let names: Vec<_> = all.iter().map(|p| p.advertisement.name.as_str()).collect();
        assert_eq!(names, ["About only", "Everywhere"]);

        BannerRepository::new(&store).delete(&banner.id, None).await;
        assert!(repo
            .get_active_ads_for_location(AdLocation::HomeTop, None, 10)
            .await
            .is_empty());
    }
}
