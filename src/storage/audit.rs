// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for repository mutations.
//!
//! Events are appended to one bucket per UTC day (`audit_YYYY-MM-DD`).
//! Logging is best-effort: a failed audit write is reported with `tracing`
//! and never fails the mutation that triggered it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::schema::keys;
use super::RecordStore;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RecordCreated,
    RecordUpdated,
    StatusChanged,
    RecordDeleted,
    RecordsBulkDeleted,
    CategoryCreated,
    CategoryDeleted,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Who triggered the event (if known).
    pub actor: Option<String>,
    /// Resource type (advertisement, banner, ...).
    pub resource_type: Option<String>,
    /// Resource affected.
    pub resource_id: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor: None,
            resource_type: None,
            resource_id: None,
            details: None,
        }
    }

    /// Set the actor, if any.
    pub fn with_actor(mut self, actor: Option<&str>) -> Self {
        self.actor = actor.map(str::to_string);
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Bucket key holding the events of `date`.
pub fn audit_key(date: NaiveDate) -> String {
    format!("{}{}", keys::AUDIT_PREFIX, date.format("%Y-%m-%d"))
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a RecordStore,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Append an event to its day bucket.
    pub async fn log(&self, event: AuditEvent) {
        let key = audit_key(event.timestamp.date_naive());
        let mut events: Vec<AuditEvent> = self.store.get_item(&key, Vec::new()).await;
        let event_type = event.event_type;
        events.push(event);

        if !self.store.set_item(&key, &events).await {
            warn!(key = %key, event_type = ?event_type, "Failed to record audit event");
        }
    }

    /// Read audit events for a specific date.
    pub async fn read_events(&self, date: NaiveDate) -> Vec<AuditEvent> {
        self.store.get_item(&audit_key(date), Vec::new()).await
    }

    /// Read events for an inclusive date range.
    pub async fn read_events_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<AuditEvent> {
        let mut all_events = Vec::new();
        let mut current = start;

        while current <= end {
            all_events.extend(self.read_events(current).await);
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }

        all_events
    }

    /// Search events by resource.
    pub async fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        date: NaiveDate,
    ) -> Vec<AuditEvent> {
        self.read_events(date)
            .await
            .into_iter()
            .filter(|e| {
                e.resource_type.as_deref() == Some(resource_type)
                    && e.resource_id.as_deref() == Some(resource_id)
            })
            .collect()
    }
}
