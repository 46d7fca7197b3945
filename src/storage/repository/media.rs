// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Media library repository.
//!
//! Media records describe already-uploaded files; byte transport happens
//! elsewhere. The media `type` is derived from the MIME type, falling back
//! to the file extension.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    any_tag, apply_list_options, clean_tags, contains_ci, normalize_category, Categorized,
    Collection, Entity, ListOptions, TagRepository,
};
use crate::error::{RepositoryResult, ValidationErrors};
use crate::storage::audit::AuditEventType;
use crate::storage::schema::keys;
use crate::storage::RecordStore;

/// Kind of media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl FromStr for MediaType {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "document" => Ok(MediaType::Document),
            "other" => Ok(MediaType::Other),
            _ => Err(ValidationErrors::single(
                "type",
                "must be one of image, video, audio, document, other",
            )),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
            MediaType::Other => "other",
        };
        f.write_str(s)
    }
}

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "txt", "csv", "rtf",
];

impl MediaType {
    /// Classify a file from its MIME type, or its extension when the MIME
    /// type is generic or missing.
    pub fn detect(filename: &str, mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        match mime.split('/').next().unwrap_or_default() {
            "image" => return MediaType::Image,
            "video" => return MediaType::Video,
            "audio" => return MediaType::Audio,
            "text" => return MediaType::Document,
            _ => {}
        }
        if mime == "application/pdf"
            || mime.starts_with("application/msword")
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
            || mime.starts_with("application/vnd.oasis.opendocument")
        {
            return MediaType::Document;
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match guess_mime(&extension).split('/').next() {
            Some("image") => MediaType::Image,
            Some("video") => MediaType::Video,
            Some("audio") => MediaType::Audio,
            _ if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) => MediaType::Document,
            _ => MediaType::Other,
        }
    }
}

/// MIME type for a lowercase file extension.
pub fn guess_mime(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

/// A media library entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub name: String,
    pub filename: String,
    pub path: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Playback length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Input for [`MediaRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewMedia {
    pub name: String,
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub mime_type: String,
    /// Overrides detection when set.
    pub media_type: Option<MediaType>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct MediaPatch {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub media_type: Option<MediaType>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub width: Option<Option<u32>>,
    pub height: Option<Option<u32>>,
    pub duration: Option<Option<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    /// Matched against name and filename.
    pub search: Option<String>,
    pub media_type: Option<MediaType>,
    pub category: Option<String>,
    /// Any-of match.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSortField {
    Name,
    Size,
    CreatedAt,
}

impl Entity for Media {
    const BUCKET: &'static str = keys::MEDIA;
    const RESOURCE: &'static str = "media";
    type Filter = MediaFilter;
    type SortField = MediaSortField;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &MediaFilter) -> bool {
        filter
            .search
            .as_deref()
            .is_none_or(|s| contains_ci(&self.name, s) || contains_ci(&self.filename, s))
            && filter.media_type.is_none_or(|t| t == self.media_type)
            && filter.category.as_deref().is_none_or(|c| c == self.category)
            && any_tag(&self.tags, &filter.tags)
    }

    fn compare_by(&self, other: &Self, field: MediaSortField) -> Ordering {
        match field {
            MediaSortField::Name => self.name.to_lowercase().cmp(&other.name.to_lowercase()),
            MediaSortField::Size => self.size.cmp(&other.size),
            MediaSortField::CreatedAt => self.created_at.cmp(&other.created_at),
        }
    }
}

impl Categorized for Media {
    const CATEGORY_BUCKET: &'static str = keys::MEDIA_CATEGORIES;

    fn category(&self) -> &str {
        &self.category
    }

    fn set_category(&mut self, category: String) {
        self.category = category;
    }
}

/// Check a media record; returns every problem found.
pub fn validate(media: &Media) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.require("name", &media.name);
    errors.require("filename", &media.filename);
    errors.require("path", &media.path);
    if media.width == Some(0) {
        errors.add("width", "must be greater than 0");
    }
    if media.height == Some(0) {
        errors.add("height", "must be greater than 0");
    }
    if let Some(duration) = media.duration {
        if !duration.is_finite() || duration < 0.0 {
            errors.add("duration", "must be a non-negative number of seconds");
        }
    }
    errors
}

/// Repository for media records.
pub struct MediaRepository<'a> {
    store: &'a RecordStore,
    records: Collection<'a, Media>,
}

impl<'a> MediaRepository<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            records: Collection::new(store),
        }
    }

    pub async fn get_all(&self, options: &ListOptions<MediaFilter, MediaSortField>) -> Vec<Media> {
        apply_list_options(self.records.load().await, options)
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Media> {
        self.records.find(id).await
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.records.exists(id).await
    }

    pub async fn create(&self, data: NewMedia, actor: Option<&str>) -> RepositoryResult<Media> {
        let media_type = data
            .media_type
            .unwrap_or_else(|| MediaType::detect(&data.filename, &data.mime_type));
        let media = Media {
            id: uuid::Uuid::new_v4().to_string(),
            name: data.name.trim().to_string(),
            filename: data.filename.trim().to_string(),
            path: data.path.trim().to_string(),
            media_type,
            size: data.size,
            mime_type: data.mime_type.trim().to_string(),
            tags: clean_tags(&data.tags),
            category: normalize_category(data.category.as_deref()),
            width: data.width,
            height: data.height,
            duration: data.duration,
            created_at: Utc::now(),
            created_by: actor.map(str::to_string),
            updated_at: None,
            updated_by: None,
        };
        validate(&media).into_result()?;

        let media = self.records.insert(media).await?;
        TagRepository::new(self.store).register(&media.tags).await;
        self.records
            .audit(AuditEventType::RecordCreated, &media.id, actor, None)
            .await;
        info!(media_id = %media.id, media_type = ?media.media_type, "Created media");
        Ok(media)
    }

    /// Merge `patch` into the record with `id`. `Ok(None)` if it does not exist.
    pub async fn update(
        &self,
        id: &str,
        patch: MediaPatch,
        actor: Option<&str>,
    ) -> RepositoryResult<Option<Media>> {
        let Some(mut media) = self.records.find(id).await else {
            return Ok(None);
        };

        let redetect = patch.media_type.is_none()
            && (patch.filename.is_some() || patch.mime_type.is_some());
        if let Some(name) = patch.name {
            media.name = name.trim().to_string();
        }
        if let Some(filename) = patch.filename {
            media.filename = filename.trim().to_string();
        }
        if let Some(path) = patch.path {
            media.path = path.trim().to_string();
        }
        if let Some(size) = patch.size {
            media.size = size;
        }
        if let Some(mime_type) = patch.mime_type {
            media.mime_type = mime_type.trim().to_string();
        }
        if let Some(media_type) = patch.media_type {
            media.media_type = media_type;
        } else if redetect {
            media.media_type = MediaType::detect(&media.filename, &media.mime_type);
        }
        if let Some(tags) = patch.tags {
            media.tags = clean_tags(&tags);
        }
        if let Some(category) = patch.category {
            media.category = normalize_category(Some(&category));
        }
        if let Some(width) = patch.width {
            media.width = width;
        }
        if let Some(height) = patch.height {
            media.height = height;
        }
        if let Some(duration) = patch.duration {
            media.duration = duration;
        }
        media.updated_at = Some(Utc::now());
        media.updated_by = actor.map(str::to_string);
        validate(&media).into_result()?;

        if !self.records.replace(&media).await? {
            return Ok(None);
        }
        TagRepository::new(self.store).register(&media.tags).await;
        self.records
            .audit(AuditEventType::RecordUpdated, id, actor, None)
            .await;
        Ok(Some(media))
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::{SortOrder, UNCATEGORIZED};
    use crate::test_support::memory_store;

    #[test]
    fn media_type_text_form() {
        for media_type in [
            MediaType::Image,
            MediaType::Video,
            MediaType::Audio,
            MediaType::Document,
            MediaType::Other,
        ] {
            assert_eq!(media_type.to_string().parse::<MediaType>().unwrap(), media_type);
            assert_eq!(
                serde_json::to_value(media_type).unwrap(),
                serde_json::json!(media_type.to_string())
            );
        }
        assert_eq!(" Video ".parse::<MediaType>().unwrap(), MediaType::Video);
        let err = "gif".parse::<MediaType>().unwrap_err();
        assert!(err.has_field("type"));
    }

    fn new_media(name: &str, filename: &str, mime: &str, size: u64) -> NewMedia {
        NewMedia {
            name: name.into(),
            filename: filename.into(),
            path: format!("/uploads/{filename}"),
            size,
            mime_type: mime.into(),
            ..NewMedia::default()
        }
    }

    #[test]
    fn detects_type() {
        assert_eq!(MediaType::detect("a.bin", "image/png"), MediaType::Image);
        assert_eq!(MediaType::detect("a.bin", "video/mp4"), MediaType::Video);
        assert_eq!(MediaType::detect("a.bin", "application/pdf"), MediaType::Document);
        assert_eq!(
            MediaType::detect("clip.MP3", "application/octet-stream"),
            MediaType::Audio
        );
        assert_eq!(MediaType::detect("report.docx", ""), MediaType::Document);
        assert_eq!(MediaType::detect("archive.zip", ""), MediaType::Other);
        assert_eq!(guess_mime("webp"), "image/webp");
    }

    #[test]
    fn serializes_type_field() {
        let json = serde_json::to_value(MediaType::Image).unwrap();
        assert_eq!(json, "image");
    }

    #[tokio::test]
    async fn create_derives_type_and_category() {
        let (_backend, store) = memory_store();
        let repo = MediaRepository::new(&store);

        let mut data = new_media("Hero", "hero.jpg", "", 10);
        data.tags = vec!["summer".into(), "summer".into()];
        let media = repo.create(data, Some("editor")).await.unwrap();

        assert_eq!(media.media_type, MediaType::Image);
        assert_eq!(media.category, UNCATEGORIZED);
        assert_eq!(media.tags, vec!["summer".to_string()]);
        assert_eq!(media.created_by.as_deref(), Some("editor"));
        assert_eq!(TagRepository::new(&store).list().await, vec!["summer".to_string()]);

        let stored = serde_json::to_value(&media).unwrap();
        assert_eq!(stored["type"], "image");
        assert_eq!(stored["mimeType"], "");
    }

    #[tokio::test]
    async fn create_rejects_missing_fields_without_writing() {
        let (_backend, store) = memory_store();
        let repo = MediaRepository::new(&store);

        let mut data = new_media("", "", "image/png", 1);
        data.width = Some(0);
        let err = repo.create(data, None).await.unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has_field("name"));
        assert!(errors.has_field("filename"));
        assert!(errors.has_field("width"));
        assert!(!store.has_item(keys::MEDIA));
    }

    #[tokio::test]
    async fn update_merges_and_redetects() {
        let (_backend, store) = memory_store();
        let repo = MediaRepository::new(&store);
        let media = repo
            .create(new_media("Clip", "clip.png", "image/png", 5), None)
            .await
            .unwrap();

        let patch = MediaPatch {
            filename: Some("clip.mp4".into()),
            mime_type: Some("video/mp4".into()),
            duration: Some(Some(12.5)),
            ..MediaPatch::default()
        };
        let updated = repo.update(&media.id, patch, Some("editor")).await.unwrap().unwrap();

        assert_eq!(updated.name, "Clip");
        assert_eq!(updated.media_type, MediaType::Video);
        assert_eq!(updated.duration, Some(12.5));
        assert_eq!(updated.updated_by.as_deref(), Some("editor"));
        assert!(updated.updated_at.is_some());

        assert!(repo
            .update("missing", MediaPatch::default(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn get_all_filters_and_sorts() {
        let (_backend, store) = memory_store();
        let repo = MediaRepository::new(&store);
        repo.create(new_media("Beach", "beach.png", "image/png", 300), None)
            .await
            .unwrap();
        repo.create(new_media("Anthem", "anthem.mp3", "audio/mpeg", 100), None)
            .await
            .unwrap();
        repo.create(new_media("Beach video", "beach.mp4", "video/mp4", 200), None)
            .await
            .unwrap();

        let options = ListOptions::filtered(MediaFilter {
            search: Some("BEACH".into()),
            ..MediaFilter::default()
        })
        .sorted(MediaSortField::Size, SortOrder::Ascending);
        let names: Vec<_> = repo
            .get_all(&options)
            .await
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, ["Beach video", "Beach"]);

        let audio = repo
            .get_all(&ListOptions::filtered(MediaFilter {
                media_type: Some(MediaType::Audio),
                ..MediaFilter::default()
            }))
            .await;
        assert_eq!(audio.len(), 1);
    }

    #[tokio::test]
    async fn get_all_matches_any_tag_and_exact_category() {
        let (_backend, store) = memory_store();
        let repo = MediaRepository::new(&store);
        for (name, category, tags) in [
            ("Beach", Some("summer"), vec!["sea", "sun"]),
            ("Slopes", Some("winter"), vec!["snow"]),
            ("Logo", None, vec!["brand", "sun"]),
        ] {
            let mut data = new_media(name, &format!("{}.png", name.to_lowercase()), "image/png", 1);
            data.category = category.map(str::to_string);
            data.tags = tags.into_iter().map(str::to_string).collect();
            repo.create(data, None).await.unwrap();
        }

        let names = |media: Vec<Media>| media.into_iter().map(|m| m.name).collect::<Vec<_>>();
        let list = |filter: MediaFilter| {
            ListOptions::filtered(filter).sorted(MediaSortField::Name, SortOrder::Ascending)
        };

        let tagged = repo
            .get_all(&list(MediaFilter {
                tags: vec!["snow".into(), "sun".into()],
                ..MediaFilter::default()
            }))
            .await;
        assert_eq!(names(tagged), ["Beach", "Logo", "Slopes"]);

        let case_mismatch = repo
            .get_all(&list(MediaFilter {
                tags: vec!["Sun".into()],
                ..MediaFilter::default()
            }))
            .await;
        assert!(case_mismatch.is_empty());

        let winter = repo
            .get_all(&list(MediaFilter {
                category: Some("winter".into()),
                ..MediaFilter::default()
            }))
            .await;
        assert_eq!(names(winter), ["Slopes"]);

        let uncategorized_sun = repo
            .get_all(&list(MediaFilter {
                category: Some(UNCATEGORIZED.into()),
                tags: vec!["sun".into()],
                ..MediaFilter::default()
            }))
            .await;
        assert_eq!(names(uncategorized_sun), ["Logo"]);
    }

    #[test]
    fn validate_collects_every_problem() {
        let media = Media {
            id: "m1".into(),
            name: " ".into(),
            filename: "clip.mp4".into(),
            path: String::new(),
            media_type: MediaType::Video,
            size: 1,
            mime_type: "video/mp4".into(),
            tags: Vec::new(),
            category: UNCATEGORIZED.into(),
            width: Some(0),
            height: None,
            duration: Some(-1.0),
            created_at: Utc::now(),
            created_by: None,
            updated_at: None,
            updated_by: None,
        };

        let errors = validate(&media);
        for field in ["name", "path", "width", "duration"] {
            assert!(errors.has_field(field), "{field}");
        }
        assert!(!errors.has_field("filename"));
        assert!(errors.into_result().is_err());
    }

    #[tokio::test]
    async fn delete_and_bulk_delete() {
        let (_backend, store) = memory_store();
        let repo = MediaRepository::new(&store);
        let a = repo.create(new_media("A", "a.png", "image/png", 1), None).await.unwrap();
        let b = repo.create(new_media("B", "b.png", "image/png", 1), None).await.unwrap();
        let c = repo.create(new_media("C", "c.png", "image/png", 1), None).await.unwrap();

        assert!(repo.delete(&a.id, None).await);
        assert!(!repo.delete(&a.id, None).await);
        assert_eq!(repo.bulk_delete(&[b.id.as_str(), c.id.as_str(), "missing"], None).await, 2);
        assert!(repo.get_all(&ListOptions::default()).await.is_empty());
    }
}
