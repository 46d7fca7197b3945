// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Banner repository.
//!
//! A banner wraps one media record (`mediaId`) with a link and a visual
//! design. The media reference is checked whenever a banner is written.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    any_tag, apply_list_options, clean_tags, contains_ci, normalize_category, Categorized,
    Collection, Entity, ListOptions, MediaRepository, TagRepository,
};
use crate::error::{RepositoryResult, ValidationErrors};
use crate::storage::audit::AuditEventType;
use crate::storage::schema::keys;
use crate::storage::RecordStore;

const DEFAULT_WIDTH: u32 = 300;
const DEFAULT_HEIGHT: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerType {
    Image,
    Video,
    Html,
    Text,
}

impl FromStr for BannerType {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(BannerType::Image),
            "video" => Ok(BannerType::Video),
            "html" => Ok(BannerType::Html),
            "text" => Ok(BannerType::Text),
            _ => Err(ValidationErrors::single(
                "type",
                "must be one of image, video, html, text",
            )),
        }
    }
}

impl fmt::Display for BannerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BannerType::Image => "image",
            BannerType::Video => "video",
            BannerType::Html => "html",
            BannerType::Text => "text",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    Archived,
}

impl FromStr for BannerStatus {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(BannerStatus::Draft),
            "active" => Ok(BannerStatus::Active),
            "inactive" => Ok(BannerStatus::Inactive),
            "archived" => Ok(BannerStatus::Archived),
            _ => Err(ValidationErrors::single(
                "status",
                "must be one of draft, active, inactive, archived",
            )),
        }
    }
}

impl fmt::Display for BannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BannerStatus::Draft => "draft",
            BannerStatus::Active => "active",
            BannerStatus::Inactive => "inactive",
            BannerStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

// ========== Design ==========

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignColors {
    pub background: Option<String>,
    pub text: Option<String>,
    pub accent: Option<String>,
}

impl DesignColors {
    fn merge(&mut self, patch: DesignColors) {
        merge_field(&mut self.background, patch.background);
        merge_field(&mut self.text, patch.text);
        merge_field(&mut self.accent, patch.accent);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignCopy {
    pub headline: Option<String>,
    pub subheadline: Option<String>,
    pub body: Option<String>,
}

impl DesignCopy {
    fn merge(&mut self, patch: DesignCopy) {
        merge_field(&mut self.headline, patch.headline);
        merge_field(&mut self.subheadline, patch.subheadline);
        merge_field(&mut self.body, patch.body);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignButton {
    pub label: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
}

impl DesignButton {
    fn merge(&mut self, patch: DesignButton) {
        merge_field(&mut self.label, patch.label);
        merge_field(&mut self.background_color, patch.background_color);
        merge_field(&mut self.text_color, patch.text_color);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignOverlay {
    pub enabled: Option<bool>,
    pub color: Option<String>,
    /// 0.0 (transparent) to 1.0 (opaque).
    pub opacity: Option<f32>,
}

impl DesignOverlay {
    fn merge(&mut self, patch: DesignOverlay) {
        merge_field(&mut self.enabled, patch.enabled);
        merge_field(&mut self.color, patch.color);
        merge_field(&mut self.opacity, patch.opacity);
    }
}

fn merge_field<T>(slot: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *slot = patch;
    }
}

/// Visual design of a banner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerDesign {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub colors: DesignColors,
    #[serde(default)]
    pub copy: DesignCopy,
    #[serde(default)]
    pub button: DesignButton,
    #[serde(default)]
    pub overlay: DesignOverlay,
}

impl Default for BannerDesign {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            colors: DesignColors::default(),
            copy: DesignCopy::default(),
            button: DesignButton::default(),
            overlay: DesignOverlay::default(),
        }
    }
}

/// Field-by-field design update. Nested groups merge rather than replace.
#[derive(Debug, Clone, Default)]
pub struct DesignPatch {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub colors: Option<DesignColors>,
    pub copy: Option<DesignCopy>,
    pub button: Option<DesignButton>,
    pub overlay: Option<DesignOverlay>,
}

impl BannerDesign {
    pub fn merge(&mut self, patch: DesignPatch) {
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(colors) = patch.colors {
            self.colors.merge(colors);
        }
        if let Some(copy) = patch.copy {
            self.copy.merge(copy);
        }
        if let Some(button) = patch.button {
            self.button.merge(button);
        }
        if let Some(overlay) = patch.overlay {
            self.overlay.merge(overlay);
        }
    }
}

// ========== Records ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub banner_type: BannerType,
    pub media_id: String,
    #[serde(default)]
    pub link: String,
    pub status: BannerStatus,
    #[serde(default)]
    pub design: BannerDesign,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Input for [`BannerRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewBanner {
    pub title: String,
    pub banner_type: Option<BannerType>,
    pub media_id: String,
    pub link: String,
    /// Defaults to draft.
    pub status: Option<BannerStatus>,
    /// Applied over the default design.
    pub design: DesignPatch,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BannerPatch {
    pub title: Option<String>,
    pub banner_type: Option<BannerType>,
    pub media_id: Option<String>,
    pub link: Option<String>,
    pub status: Option<BannerStatus>,
    pub design: Option<DesignPatch>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct BannerFilter {
    /// Matched against title and link.
    pub search: Option<String>,
    pub banner_type: Option<BannerType>,
    pub status: Option<BannerStatus>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerSortField {
    Title,
    CreatedAt,
}

impl Entity for Banner {
    const BUCKET: &'static str = keys::BANNERS;
    const RESOURCE: &'static str = "banner";
    type Filter = BannerFilter;
    type SortField = BannerSortField;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &BannerFilter) -> bool {
        filter
            .search
            .as_deref()
            .is_none_or(|s| contains_ci(&self.title, s) || contains_ci(&self.link, s))
            && filter.banner_type.is_none_or(|t| t == self.banner_type)
            && filter.status.is_none_or(|s| s == self.status)
            && filter.category.as_deref().is_none_or(|c| c == self.category)
            && any_tag(&self.tags, &filter.tags)
    }

    fn compare_by(&self, other: &Self, field: BannerSortField) -> Ordering {
        match field {
            BannerSortField::Title => self.title.to_lowercase().cmp(&other.title.to_lowercase()),
            BannerSortField::CreatedAt => self.created_at.cmp(&other.created_at),
        }
    }
}

impl Categorized for Banner {
    const CATEGORY_BUCKET: &'static str = keys::BANNER_CATEGORIES;

    fn category(&self) -> &str {
        &self.category
    }

    fn set_category(&mut self, category: String) {
        self.category = category;
    }
}

/// A link is either empty, a site-relative path, or an absolute http(s) URL.
fn is_valid_link(link: &str) -> bool {
    if link.is_empty() || (link.starts_with('/') && !link.starts_with("//")) {
        return true;
    }
    url::Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Field checks that need no other bucket.
pub fn validate(banner: &Banner) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.require("title", &banner.title);
    errors.require("mediaId", &banner.media_id);
    if !is_valid_link(&banner.link) {
        errors.add("link", "must be an http(s) URL or a path starting with /");
    }
    if banner.design.width == 0 {
        errors.add("design.width", "must be greater than 0");
    }
    if banner.design.height == 0 {
        errors.add("design.height", "must be greater than 0");
    }
    if let Some(opacity) = banner.design.overlay.opacity {
        if !(0.0..=1.0).contains(&opacity) {
            errors.add("design.overlay.opacity", "must be between 0 and 1");
        }
    }
    errors
}

/// Repository for banner records.
pub struct BannerRepository<'a> {
    store: &'a RecordStore,
    records: Collection<'a, Banner>,
}

impl<'a> BannerRepository<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            records: Collection::new(store),
        }
    }

    pub async fn get_all(
        &self,
        options: &ListOptions<BannerFilter, BannerSortField>,
    ) -> Vec<Banner> {
        apply_list_options(self.records.load().await, options)
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Banner> {
        self.records.find(id).await
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.records.exists(id).await
    }

    /// Every banner, unfiltered.
    pub(crate) async fn load_all(&self) -> Vec<Banner> {
        self.records.load().await
    }

    pub async fn create(&self, data: NewBanner, actor: Option<&str>) -> RepositoryResult<Banner> {
        let mut design = BannerDesign::default();
        design.merge(data.design);

        let mut errors = ValidationErrors::new();
        if data.banner_type.is_none() {
            errors.add("type", "is required");
        }
        let banner = Banner {
            id: uuid::Uuid::new_v4().to_string(),
            title: data.title.trim().to_string(),
            banner_type: data.banner_type.unwrap_or(BannerType::Image),
            media_id: data.media_id.trim().to_string(),
            link: data.link.trim().to_string(),
            status: data.status.unwrap_or_default(),
            design,
            category: normalize_category(data.category.as_deref()),
            tags: clean_tags(&data.tags),
            created_at: Utc::now(),
            created_by: actor.map(str::to_string),
            updated_at: None,
            updated_by: None,
        };
        errors.extend(validate(&banner));
        self.check_media(&banner.media_id, &mut errors).await;
        errors.into_result()?;

        let banner = self.records.insert(banner).await?;
        TagRepository::new(self.store).register(&banner.tags).await;
        self.records
            .audit(AuditEventType::RecordCreated, &banner.id, actor, None)
            .await;
        info!(banner_id = %banner.id, media_id = %banner.media_id, "Created banner");
        Ok(banner)
    }

    /// Merge `patch` into the banner with `id`. `Ok(None)` if it does not exist.
    pub async fn update(
        &self,
        id: &str,
        patch: BannerPatch,
        actor: Option<&str>,
    ) -> RepositoryResult<Option<Banner>> {
        let Some(mut banner) = self.records.find(id).await else {
            return Ok(None);
        };

        let media_changed = patch
            .media_id
            .as_deref()
            .is_some_and(|m| m.trim() != banner.media_id);
        if let Some(title) = patch.title {
            banner.title = title.trim().to_string();
        }
        if let Some(banner_type) = patch.banner_type {
            banner.banner_type = banner_type;
        }
        if let Some(media_id) = patch.media_id {
            banner.media_id = media_id.trim().to_string();
        }
        if let Some(link) = patch.link {
            banner.link = link.trim().to_string();
        }
        if let Some(status) = patch.status {
            banner.status = status;
        }
        if let Some(design) = patch.design {
            banner.design.merge(design);
        }
        if let Some(category) = patch.category {
            banner.category = normalize_category(Some(&category));
        }
        if let Some(tags) = patch.tags {
            banner.tags = clean_tags(&tags);
        }
        banner.updated_at = Some(Utc::now());
        banner.updated_by = actor.map(str::to_string);

        let mut errors = validate(&banner);
        if media_changed {
            self.check_media(&banner.media_id, &mut errors).await;
        }
        errors.into_result()?;

        if !self.records.replace(&banner).await? {
            return Ok(None);
        }
        TagRepository::new(self.store).register(&banner.tags).await;
        self.records
            .audit(AuditEventType::RecordUpdated, id, actor, None)
            .await;
        Ok(Some(banner))
    }

    pub async fn change_status(
        &self,
        id: &str,
        status: BannerStatus,
        actor: Option<&str>,
    ) -> RepositoryResult<Option<Banner>> {
        let Some(mut banner) = self.records.find(id).await else {
            return Ok(None);
        };
        let previous = banner.status;
        banner.status = status;
        banner.updated_at = Some(Utc::now());
        banner.updated_by = actor.map(str::to_string);

        if !self.records.replace(&banner).await? {
            return Ok(None);
        }
        self.records
            .audit(
                AuditEventType::StatusChanged,
                id,
                actor,
                Some(serde_json::json!({ "from": previous, "to": status })),
            )
            .await;
        info!(banner_id = %id, from = %previous, to = %status, "Changed banner status");
        Ok(Some(banner))
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

    async fn check_media(&self, media_id: &str, errors: &mut ValidationErrors) {
        if !media_id.is_empty() && !MediaRepository::new(self.store).exists(media_id).await {
            errors.add("mediaId", "references unknown media");
        }
    }
}
