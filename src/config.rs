// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values, and the typed configuration
//! the daemon loads at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory of the durable store | `/data` |
//! | `STORE_BACKEND` | Storage backend (`fs` or `redb`) | `fs` |
//! | `STORE_ENCRYPTION_KEY` | Base64 of the 32-byte key for sensitive buckets | Required |
//! | `SWEEP_INTERVAL_SECS` | Seconds between status sweeps | `60` |
//! | `CLEANUP_MAX_AGE_DAYS` | Age threshold for timestamped data cleanup, `0` disables | `0` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable selecting the storage backend.
pub const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Environment variable holding the base64 bucket encryption key.
///
/// Generate one with `AeadCryptoGate::generate_key()`. Losing it makes every
/// sensitive bucket unreadable (reads degrade to defaults).
pub const STORE_ENCRYPTION_KEY_ENV: &str = "STORE_ENCRYPTION_KEY";

pub const SWEEP_INTERVAL_SECS_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const CLEANUP_MAX_AGE_DAYS_ENV: &str = "CLEANUP_MAX_AGE_DAYS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Fs,
    Redb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Daemon configuration.
#[derive(Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    /// Base64 key; kept out of `Debug` output.
    pub encryption_key: String,
    pub sweep_interval: Duration,
    /// `0` disables cleanup.
    pub cleanup_max_age_days: u32,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("data_dir", &self.data_dir)
            .field("backend", &self.backend)
            .field("encryption_key", &"<redacted>")
            .field("sweep_interval", &self.sweep_interval)
            .field("cleanup_max_age_days", &self.cleanup_max_age_days)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl StoreConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = get(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DATA_ROOT));

        let backend = match get(STORE_BACKEND_ENV) {
            None => BackendKind::default(),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "fs" => BackendKind::Fs,
                "redb" => BackendKind::Redb,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: STORE_BACKEND_ENV,
                        value: v,
                        reason: "expected fs or redb",
                    })
                }
            },
        };

        let encryption_key = get(STORE_ENCRYPTION_KEY_ENV)
            .map(|k| k.trim().to_string())
            .ok_or(ConfigError::Missing(STORE_ENCRYPTION_KEY_ENV))?;

        let sweep_secs = match get(SWEEP_INTERVAL_SECS_ENV) {
            None => DEFAULT_SWEEP_INTERVAL_SECS,
            Some(v) => match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: SWEEP_INTERVAL_SECS_ENV,
                        value: v,
                        reason: "expected a positive number of seconds",
                    })
                }
            },
        };

        let cleanup_max_age_days = match get(CLEANUP_MAX_AGE_DAYS_ENV) {
            None => 0,
            Some(v) => v.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                name: CLEANUP_MAX_AGE_DAYS_ENV,
                value: v.clone(),
                reason: "expected a number of days",
            })?,
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            None => LogFormat::default(),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: LOG_FORMAT_ENV,
                        value: v,
                        reason: "expected json or pretty",
                    })
                }
            },
        };

        Ok(Self {
            data_dir,
            backend,
            encryption_key,
            sweep_interval: Duration::from_secs(sweep_secs),
            cleanup_max_age_days,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StoreConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[(STORE_ENCRYPTION_KEY_ENV, "a2V5")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.backend, BackendKind::Fs);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.cleanup_max_age_days, 0);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            (DATA_DIR_ENV, "/srv/content"),
            (STORE_BACKEND_ENV, "REDB"),
            (STORE_ENCRYPTION_KEY_ENV, "a2V5"),
            (SWEEP_INTERVAL_SECS_ENV, "5"),
            (CLEANUP_MAX_AGE_DAYS_ENV, "30"),
            (LOG_FORMAT_ENV, "json"),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/content"));
        assert_eq!(config.backend, BackendKind::Redb);
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.cleanup_max_age_days, 30);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn key_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing(_))));
        assert!(matches!(
            load(&[(STORE_ENCRYPTION_KEY_ENV, "  ")]),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn rejects_malformed_values() {
        for (name, value) in [
            (STORE_BACKEND_ENV, "sqlite"),
            (SWEEP_INTERVAL_SECS_ENV, "0"),
            (SWEEP_INTERVAL_SECS_ENV, "soon"),
            (CLEANUP_MAX_AGE_DAYS_ENV, "-1"),
            (LOG_FORMAT_ENV, "xml"),
        ] {
            let err = load(&[(STORE_ENCRYPTION_KEY_ENV, "a2V5"), (name, value)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{name}={value}");
        }
    }

    #[test]
    fn debug_redacts_key() {
        let config = load(&[(STORE_ENCRYPTION_KEY_ENV, "c2VjcmV0")]).unwrap();
        assert!(!format!("{config:?}").contains("c2VjcmV0"));
    }
}
