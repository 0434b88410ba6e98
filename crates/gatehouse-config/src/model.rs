// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Gatehouse configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Delayed action queue worker settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Mini-app authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "gatehouse".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Bot username without `@`, used in deep links.
    #[serde(default)]
    pub bot_username: String,

    /// Mini-app URL the challenge link points at.
    #[serde(default = "default_challenge_url")]
    pub challenge_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_username: String::new(),
            challenge_url: default_challenge_url(),
        }
    }
}

fn default_challenge_url() -> String {
    "https://t.me/gatehouse_bot/challenge".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("gatehouse").join("gatehouse.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("gatehouse.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Delayed queue worker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// How often the worker polls for due messages.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum messages leased per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Seconds before an unacknowledged lease is redelivered.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Deliveries attempted before a message is parked as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds to wait before retrying a failed delivery.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            lease_secs: default_lease_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    16
}

fn default_lease_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_backoff_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Oldest acceptable mini-app `auth_date`, in seconds.
    #[serde(default = "default_max_init_data_age_secs")]
    pub max_init_data_age_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_init_data_age_secs: default_max_init_data_age_secs(),
        }
    }
}

fn default_max_init_data_age_secs() -> u64 {
    24 * 60 * 60
}
