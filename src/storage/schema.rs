// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bucket names and the sensitivity schema.
//!
//! Every bucket is either [`Sensitivity::Sensitive`] or
//! [`Sensitivity::Plain`]. The [`BucketSchema`] is the single place that
//! decides which; the record store consults it to encrypt on write and the
//! secure eraser consults it to overwrite before delete.

/// Well-known bucket keys.
pub mod keys {
    /// The currently signed-in identity.
    pub const CURRENT_USER: &str = "current_user";
    /// The session auth token.
    pub const AUTH_TOKEN: &str = "auth_token";
    /// The user collection.
    pub const USERS: &str = "users";

    pub const ADVERTISEMENTS: &str = "advertisements";
    pub const BANNERS: &str = "banners";
    pub const MEDIA: &str = "media";
    pub const BANNER_CATEGORIES: &str = "banner_categories";
    pub const MEDIA_CATEGORIES: &str = "media_categories";
    pub const TAGS: &str = "tags";

    /// Prefix of the daily audit buckets (`audit_YYYY-MM-DD`).
    pub const AUDIT_PREFIX: &str = "audit_";

    /// Keys wiped unconditionally on logout.
    pub const IDENTITY: [&str; 2] = [CURRENT_USER, AUTH_TOKEN];

    /// Keys captured by the user auto-backup.
    pub const USER_BACKUP: [&str; 3] = [USERS, CURRENT_USER, AUTH_TOKEN];
}

/// Whether a bucket is encrypted at rest and securely erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Sensitive,
    Plain,
}

/// One classification rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketRule {
    /// Applies to exactly this key.
    Exact(String, Sensitivity),
    /// Applies to every key starting with this prefix.
    Prefix(String, Sensitivity),
}

/// Table of bucket classification rules.
///
/// Exact rules win over prefix rules; among prefix rules the longest match
/// wins. Keys no rule matches are plain.
#[derive(Debug, Clone)]
pub struct BucketSchema {
    rules: Vec<BucketRule>,
}

impl Default for BucketSchema {
    fn default() -> Self {
        use Sensitivity::{Plain, Sensitive};

        let exact = [
            (keys::CURRENT_USER, Sensitive),
            (keys::AUTH_TOKEN, Sensitive),
            (keys::USERS, Sensitive),
            (keys::ADVERTISEMENTS, Plain),
            (keys::BANNERS, Plain),
            (keys::MEDIA, Plain),
            (keys::BANNER_CATEGORIES, Plain),
            (keys::MEDIA_CATEGORIES, Plain),
            (keys::TAGS, Plain),
        ];
        let prefixes = [
            ("personal_", Sensitive),
            ("financial_", Sensitive),
            ("payment_", Sensitive),
            (keys::AUDIT_PREFIX, Plain),
        ];

        let rules = exact
            .into_iter()
            .map(|(key, s)| BucketRule::Exact(key.to_string(), s))
            .chain(
                prefixes
                    .into_iter()
                    .map(|(prefix, s)| BucketRule::Prefix(prefix.to_string(), s)),
            )
            .collect();

        Self { rules }
    }
}

impl BucketSchema {
    /// Schema with no rules: everything is plain.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule. Later exact rules for the same key override earlier ones.
    pub fn with_rule(mut self, rule: BucketRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Classify a bucket key.
    pub fn classify(&self, key: &str) -> Sensitivity {
        let exact = self.rules.iter().rev().find_map(|rule| match rule {
            BucketRule::Exact(name, s) if name == key => Some(*s),
            _ => None,
        });
        if let Some(sensitivity) = exact {
            return sensitivity;
        }

        self.rules
            .iter()
            .filter_map(|rule| match rule {
                BucketRule::Prefix(prefix, s) if key.starts_with(prefix.as_str()) => {
                    Some((prefix.len(), *s))
                }
                _ => None,
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, s)| s)
            .unwrap_or(Sensitivity::Plain)
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.classify(key) == Sensitivity::Sensitive
    }
}
