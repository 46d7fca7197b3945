// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Status Sweeper
//!
//! Background task that periodically persists derived advertisement
//! statuses, so stored records move from scheduled to active to expired
//! even when nothing writes to them.
//!
//! ## Strategy
//!
//! Every `interval` (default 60 s) the sweeper:
//! 1. Recomputes every advertisement status against now and writes the
//!    bucket back if any changed.
//! 2. If a cleanup age is configured, removes timestamped entries older
//!    than that many days.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::storage::{AdvertisementRepository, BackupCoordinator, MemoryBackend, RecordStore};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub statuses_changed: usize,
    pub entries_removed: usize,
}

pub struct StatusSweeper {
    store: Arc<RecordStore>,
    session: MemoryBackend,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cleanup_max_age_days: u32,
}

impl StatusSweeper {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            session: MemoryBackend::new(),
            clock: Arc::new(SystemClock),
            interval: DEFAULT_SWEEP_INTERVAL,
            cleanup_max_age_days: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Remove timestamped entries older than `days` on each sweep; `0` disables.
    pub fn with_cleanup_max_age_days(mut self, days: u32) -> Self {
        self.cleanup_max_age_days = days;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            cleanup_max_age_days = self.cleanup_max_age_days,
            "Status sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Status sweeper shutting down");
                return;
            }

            self.sweep().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Status sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let ads = AdvertisementRepository::new(&self.store).with_clock(self.clock.clone());
        match ads.refresh_statuses().await {
            Ok(changed) => report.statuses_changed = changed,
            Err(e) => warn!(error = %e, "Status sweeper: failed to persist statuses"),
        }

        if self.cleanup_max_age_days > 0 {
            report.entries_removed = BackupCoordinator::new(&self.store, &self.session)
                .cleanup_old_data(self.cleanup_max_age_days)
                .await;
        }

        if report != SweepReport::default() {
            info!(
                statuses_changed = report.statuses_changed,
                entries_removed = report.entries_removed,
                "Status sweeper: sweep complete"
            );
        }
        report
    }
}
