// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Advertisement lifecycle.
//!
//! Pure functions over [`Advertisement`] values with an explicit `now`.
//! `Draft` and `Inactive` are set by hand and never recomputed. Every other
//! status is derived, checking in order:
//!
//! 1. before `startDate` -> `Scheduled`
//! 2. after `endDate` -> `Expired`
//! 3. impression cap reached -> `Expired`
//! 4. click cap reached -> `Expired`
//! 5. otherwise `Active`

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::repository::{AdLocation, AdStatus, Advertisement, Banner};

/// An eligible advertisement joined with the banner it shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedAdvertisement {
    pub advertisement: Advertisement,
    pub banner: Banner,
}

fn reached(count: u64, cap: Option<u64>) -> bool {
    cap.is_some_and(|cap| count >= cap)
}

/// The status `ad` should have at `now`.
pub fn recompute_status(ad: &Advertisement, now: DateTime<Utc>) -> AdStatus {
    if ad.status.is_sticky() {
        return ad.status;
    }
    if now < ad.start_date {
        return AdStatus::Scheduled;
    }
    if ad.end_date.is_some_and(|end| now > end) {
        return AdStatus::Expired;
    }
    if reached(ad.impressions, ad.max_impressions) || reached(ad.clicks, ad.max_clicks) {
        return AdStatus::Expired;
    }
    AdStatus::Active
}

pub fn with_recomputed_status(mut ad: Advertisement, now: DateTime<Utc>) -> Advertisement {
    ad.status = recompute_status(&ad, now);
    ad
}

/// Count one impression. Reaching the impression cap expires the ad
/// immediately, whatever its status.
pub fn record_impression(mut ad: Advertisement, now: DateTime<Utc>) -> Advertisement {
    ad.impressions = ad.impressions.saturating_add(1);
    if reached(ad.impressions, ad.max_impressions) {
        ad.status = AdStatus::Expired;
        return ad;
    }
    with_recomputed_status(ad, now)
}

/// Count one click, with the same rule as [`record_impression`] for the
/// click cap.
pub fn record_click(mut ad: Advertisement, now: DateTime<Utc>) -> Advertisement {
    ad.clicks = ad.clicks.saturating_add(1);
    if reached(ad.clicks, ad.max_clicks) {
        ad.status = AdStatus::Expired;
        return ad;
    }
    with_recomputed_status(ad, now)
}

pub fn is_eligible_to_display(ad: &Advertisement, now: DateTime<Utc>) -> bool {
    recompute_status(ad, now) == AdStatus::Active
}

/// Click-through rate in percent; `0.0` before the first impression.
pub fn calculate_ctr(ad: &Advertisement) -> f64 {
    if ad.impressions == 0 {
        return 0.0;
    }
    ad.clicks as f64 / ad.impressions as f64 * 100.0
}

/// An empty page list matches every page.
pub fn matches_page(ad: &Advertisement, page: Option<&str>) -> bool {
    match page {
        None => true,
        Some(page) => ad.pages.is_empty() || ad.pages.iter().any(|p| p == page),
    }
}

/// Eligible ads at `location` (and `page`, if given), highest priority
/// first, at most `limit` of them. Statuses are recomputed.
pub fn select_for_placement(
    ads: Vec<Advertisement>,
    location: AdLocation,
    page: Option<&str>,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<Advertisement> {
    let mut eligible: Vec<Advertisement> = ads
        .into_iter()
        .map(|ad| with_recomputed_status(ad, now))
        .filter(|ad| ad.status == AdStatus::Active && ad.location == location)
        .filter(|ad| matches_page(ad, page))
        .collect();

    eligible.sort_by(|a, b| b.priority.cmp(&a.priority));
    eligible.truncate(limit);
    eligible
}
