// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit request context passed into every engine operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatehouse_config::GatehouseConfig;
use gatehouse_core::types::timestamp;
use gatehouse_core::{BotApi, Clock, UserId};
use gatehouse_storage::Database;

/// Engine settings derived from the service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// The bot's own user id, recorded as the actor of system audit entries.
    pub bot_user: UserId,
    pub bot_username: String,
    /// Mini-app link; the target chat is appended as `?startapp=<chat>`.
    pub challenge_url: String,
    pub queue_max_attempts: u32,
    pub max_init_data_age_secs: u64,
}

impl EngineSettings {
    pub fn from_config(config: &GatehouseConfig, bot_user: UserId) -> Self {
        Self {
            bot_user,
            bot_username: config.telegram.bot_username.clone(),
            challenge_url: config.telegram.challenge_url.clone(),
            queue_max_attempts: config.queue.max_attempts,
            max_init_data_age_secs: config.auth.max_init_data_age_secs,
        }
    }
}

/// Shared handles for one engine instance. Cheap to clone.
#[derive(Clone)]
pub struct AdmissionContext {
    pub db: Database,
    pub bot: Arc<dyn BotApi>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<EngineSettings>,
}

impl AdmissionContext {
    pub fn new(
        db: Database,
        bot: Arc<dyn BotApi>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            db,
            bot,
            clock,
            settings: Arc::new(settings),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current time in the storage timestamp format.
    pub fn stamp(&self) -> String {
        timestamp(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = GatehouseConfig::default();
        config.telegram.bot_username = "gate_bot".into();
        config.queue.max_attempts = 9;
        let settings = EngineSettings::from_config(&config, UserId(42));
        assert_eq!(settings.bot_user, UserId(42));
        assert_eq!(settings.bot_username, "gate_bot");
        assert_eq!(settings.queue_max_attempts, 9);
        assert_eq!(settings.max_init_data_age_secs, config.auth.max_init_data_age_secs);
    }
}
