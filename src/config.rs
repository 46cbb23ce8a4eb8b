// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `BACKEND_API_URL` | Base URL of the rewards backend API | `http://localhost:5000/api` |
//! | `SESSION_DIR` | Directory of the durable session store | `.portal` |
//! | `CACHE_CAPACITY` | Max resource cache entries | `256` |
//! | `DEDUPE_INTERVAL_MS` | Window suppressing duplicate fetches per key | `2000` |
//! | `ERROR_RETRY_COUNT` | Retries for network/5xx failures | `3` |
//! | `ERROR_RETRY_INTERVAL_MS` | Delay between retries | `5000` |
//! | `EVENTS_REFRESH_INTERVAL_SECS` | Interval revalidation of the events list | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable name for the backend API base URL.
pub const BACKEND_API_URL_ENV: &str = "BACKEND_API_URL";

/// Environment variable name for the durable session store directory.
pub const SESSION_DIR_ENV: &str = "SESSION_DIR";

/// Environment variable name selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Path of the login page (unauthenticated landing).
pub const LOGIN_PATH: &str = "/";

/// Path of the dashboard root.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Lifetime of the session cookies.
pub const COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BACKEND_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_SESSION_DIR: &str = ".portal";
const DEFAULT_CACHE_CAPACITY: usize = 256;
const DEFAULT_DEDUPE_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_ERROR_RETRY_COUNT: u32 = 3;
const DEFAULT_ERROR_RETRY_INTERVAL: Duration = Duration::from_millis(5000);
const DEFAULT_EVENTS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid value: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Tuning knobs for the shared resource cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Max number of keys held before LRU eviction.
    pub capacity: usize,
    /// Calls for the same key within this window reuse the last request.
    pub dedupe_interval: Duration,
    /// Retries for retryable failures (network, 5xx).
    pub error_retry_count: u32,
    /// Delay between retries.
    pub error_retry_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            dedupe_interval: DEFAULT_DEDUPE_INTERVAL,
            error_retry_count: DEFAULT_ERROR_RETRY_COUNT,
            error_retry_interval: DEFAULT_ERROR_RETRY_INTERVAL,
        }
    }
}

/// Full portal configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub host: String,
    pub port: u16,
    pub backend_api_url: url::Url,
    pub session_dir: PathBuf,
    pub cache: CacheConfig,
    pub events_refresh_interval: Duration,
    pub log_format: LogFormat,
}

impl PortalConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = env_or_default(BACKEND_API_URL_ENV, DEFAULT_BACKEND_API_URL);
        let backend_api_url = url::Url::parse(&backend).map_err(|source| ConfigError::InvalidUrl {
            var: BACKEND_API_URL_ENV,
            source,
        })?;

        let log_format = match env_or_default(LOG_FORMAT_ENV, "pretty").as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_ENV,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            host: env_or_default("HOST", DEFAULT_HOST),
            port: env_parse("PORT", DEFAULT_PORT)?,
            backend_api_url,
            session_dir: PathBuf::from(env_or_default(SESSION_DIR_ENV, DEFAULT_SESSION_DIR)),
            cache: CacheConfig {
                capacity: env_parse("CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?,
                dedupe_interval: env_millis("DEDUPE_INTERVAL_MS", DEFAULT_DEDUPE_INTERVAL)?,
                error_retry_count: env_parse("ERROR_RETRY_COUNT", DEFAULT_ERROR_RETRY_COUNT)?,
                error_retry_interval: env_millis(
                    "ERROR_RETRY_INTERVAL_MS",
                    DEFAULT_ERROR_RETRY_INTERVAL,
                )?,
            },
            events_refresh_interval: env_parse(
                "EVENTS_REFRESH_INTERVAL_SECS",
                DEFAULT_EVENTS_REFRESH_INTERVAL.as_secs(),
            )
            .map(Duration::from_secs)?,
            log_format,
        })
    }
}

fn env_or_default(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::Invalid { var, value })
        }
        _ => Ok(default),
    }
}

fn env_millis(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    env_parse(var, default.as_millis() as u64).map(Duration::from_millis)
}
