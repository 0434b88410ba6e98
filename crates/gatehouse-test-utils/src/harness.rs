// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles an engine context over a temporary SQLite
//! database with [`MockBot`], [`ManualClock`] and [`StaticVerifier`] plugged
//! into its seams.

use std::sync::Arc;

use gatehouse_admission::{AdmissionApi, AdmissionContext, Caller, EngineSettings, QueueWorker};
use gatehouse_config::GatehouseConfig;
use gatehouse_core::{
    AuditAction, AuditEntry, ChatAdministrator, ChatId, GatehouseError, UserId, UserProfile,
};
use gatehouse_storage::queries::{audit, chat_admin};
use gatehouse_storage::Database;
use serde_json::json;

use crate::clock::ManualClock;
use crate::mock_bot::MockBot;
use crate::verifier::StaticVerifier;

/// The bot's own user id inside the harness.
pub const BOT_USER: UserId = UserId(1);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: GatehouseConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = GatehouseConfig::default();
        config.telegram.bot_username = "gatehouse_bot".to_string();
        config.telegram.challenge_url = "https://gate.example/challenge".to_string();
        config.queue.retry_backoff_secs = 10;
        Self { config }
    }

    /// Overrides the service configuration (the database path is ignored).
    pub fn with_config(mut self, config: GatehouseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.queue.max_attempts = max_attempts;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, GatehouseError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| GatehouseError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let db = Database::open(&db_path).await?;

        let bot = Arc::new(MockBot::new());
        let clock = Arc::new(ManualClock::at_epoch());
        let verifier = Arc::new(StaticVerifier::new());
        let ctx = AdmissionContext::new(
            db.clone(),
            bot.clone(),
            clock.clone(),
            EngineSettings::from_config(&self.config, BOT_USER),
        );
        let api = AdmissionApi::new(ctx.clone(), verifier.clone());
        let worker = QueueWorker::new(ctx.clone(), &self.config.queue);

        Ok(TestHarness {
            db,
            bot,
            clock,
            verifier,
            ctx,
            api,
            worker,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine over a temp database.
pub struct TestHarness {
    pub db: Database,
    pub bot: Arc<MockBot>,
    pub clock: Arc<ManualClock>,
    pub verifier: Arc<StaticVerifier>,
    pub ctx: AdmissionContext,
    pub api: AdmissionApi,
    pub worker: QueueWorker,
    pub config: GatehouseConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<TestHarness, GatehouseError> {
        Self::builder().build().await
    }

    /// Makes `admins` the admin list of `chat`, titled "Chat {chat}".
    ///
    /// The mock bot reports the same list, so a later rebuild agrees.
    pub async fn seed_admins(&self, chat: ChatId, admins: &[UserId]) -> Result<(), GatehouseError> {
        let reported = admins
            .iter()
            .map(|user| ChatAdministrator {
                user: *user,
                is_owner: false,
                can_restrict_members: true,
                is_bot: false,
            })
            .collect();
        let info = json!({"id": chat.0, "title": format!("Chat {chat}")});
        self.bot.set_admins(chat, reported).await;
        self.bot.set_chat(chat, info.clone()).await;
        chat_admin::replace_all(&self.db, chat, admins, Some(info), &self.ctx.stamp()).await
    }

    /// Appends an admin action at the current clock time.
    pub async fn append(
        &self,
        chat: ChatId,
        user: UserId,
        action: AuditAction,
    ) -> Result<AuditEntry, GatehouseError> {
        audit::append(&self.db, chat, user, action, &self.ctx.stamp()).await
    }

    /// A verified caller for `user`, bypassing init data.
    pub fn caller(&self, user: UserProfile) -> Caller {
        Caller {
            user,
            start_param: None,
        }
    }

    /// Advances the clock and delivers every message that became due.
    ///
    /// Returns the number of deliveries.
    pub async fn advance_and_drain(&self, secs: i64) -> Result<usize, GatehouseError> {
        self.clock.advance(secs);
        self.drain_queue().await
    }

    /// Runs worker batches until nothing is due.
    pub async fn drain_queue(&self) -> Result<usize, GatehouseError> {
        let mut total = 0;
        loop {
            let n = self.worker.run_once().await?;
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }
    }
}

/// A plain user profile for tests.
pub fn profile(id: i64, first_name: &str) -> UserProfile {
    UserProfile {
        id: UserId(id),
        first_name: first_name.to_string(),
        last_name: None,
        username: None,
        language_code: None,
        is_bot: false,
    }
}
