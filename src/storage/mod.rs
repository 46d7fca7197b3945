// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Content Storage Module
//!
//! Persistent keyed-bucket storage for the content store. A bucket is a
//! named JSON document (usually an array of records) read and written as
//! one unit.
//!
//! ## Layers
//!
//! - [`StorageBackend`]: raw string slots (`fs`, `redb`, or in-memory)
//! - [`RecordStore`]: serialization plus transparent encryption of sensitive
//!   buckets through a [`CryptoGate`]
//! - [`SecureEraser`], [`BackupCoordinator`]: maintenance on top of the store
//! - [`repository`]: typed entity repositories
//!
//! ## Storage Layout (filesystem backend)
//!
//! ```text
//! /data/
//!   buckets/
//!     advertisements.json
//!     banners.json
//!     media.json
//!     banner_categories.json
//!     media_categories.json
//!     tags.json
//!     users.json            # enc:v1:<ciphertext>
//!     audit_2024-01-10.json # Daily audit logs
//! ```
//!
//! The redb backend keeps the same keys in a single `buckets` table inside
//! `/data/store.redb`.
//!
//! ## Concurrency
//!
//! There is no locking above the backend. Every mutation is a whole-bucket
//! read-modify-write, so two concurrent writers to the same bucket race and
//! the last write wins; the other writer's change is silently lost. Run a
//! single writer per data directory.

pub mod audit;
pub mod backend;
pub mod backup;
pub mod crypto;
pub mod eraser;
pub mod fs_backend;
pub mod paths;
pub mod record_store;
pub mod redb_backend;
pub mod repository;
pub mod schema;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use backend::{MemoryBackend, StorageBackend, StorageError, StorageResult};
pub use backup::{BackupCoordinator, BackupSnapshot, DEFAULT_SESSION_SLOT, USERS_SESSION_SLOT};
pub use crypto::{AeadCryptoGate, CryptoError, CryptoGate};
pub use eraser::SecureEraser;
pub use fs_backend::FsBackend;
pub use paths::StoragePaths;
pub use record_store::{RecordStore, ENCRYPTION_MARKER};
pub use redb_backend::RedbBackend;
pub use repository::{
    AdLocation, AdStatus, AdvertisementFilter, AdvertisementPatch, AdvertisementRepository,
    AdvertisementSortField, Advertisement, Banner, BannerDesign, BannerFilter, BannerPatch,
    BannerRepository, BannerSortField, BannerStatus, BannerType, Category, CategoryRepository,
    ListOptions, Media, MediaFilter, MediaPatch, MediaRepository, MediaSortField, MediaType,
    NewAdvertisement, NewBanner, NewMedia, SortOrder, TagRepository, Targeting, UNCATEGORIZED,
};
pub use schema::{keys, BucketRule, BucketSchema, Sensitivity};
