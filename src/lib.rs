// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Content Store - keyed-bucket persistence for placement content
//!
//! Local-only storage for advertisements, banners and media, with at-rest
//! encryption of sensitive buckets, best-effort secure erasure, snapshot
//! backup/restore and the advertisement scheduling lifecycle.
//!
//! ## Modules
//!
//! - `storage` - Backends, record store, erasure, backup, repositories
//! - `scheduling` - Advertisement status state machine and placement
//! - `sweeper` - Background status sweep (used by the daemon binary)
//! - `config` - Environment configuration

pub mod clock;
pub mod config;
pub mod error;
pub mod scheduling;
pub mod storage;
pub mod sweeper;

#[cfg(test)]
mod test_support;
