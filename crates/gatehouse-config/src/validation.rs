// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::GatehouseConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &GatehouseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.log_level `{}` must be one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let url = config.telegram.challenge_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        errors.push(ConfigError::Validation {
            message: format!("telegram.challenge_url `{url}` must be an http(s) URL"),
        });
    }

    if config.telegram.bot_username.starts_with('@') {
        errors.push(ConfigError::Validation {
            message: "telegram.bot_username must not include the leading `@`".to_string(),
        });
    }

    if config.queue.poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.poll_interval_ms must be positive".to_string(),
        });
    }

    if config.queue.batch_size < 1 {
        errors.push(ConfigError::Validation {
            message: "queue.batch_size must be at least 1".to_string(),
        });
    }

    if config.queue.lease_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.lease_secs must be positive".to_string(),
        });
    }

    if config.queue.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: "queue.max_attempts must be at least 1".to_string(),
        });
    }

    if config.auth.max_init_data_age_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "auth.max_init_data_age_secs must be positive".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
