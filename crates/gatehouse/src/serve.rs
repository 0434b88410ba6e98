// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gatehouse serve` command implementation.
//!
//! Opens storage, resolves the bot identity, then runs the delayed queue
//! worker and the Telegram update dispatcher side by side until a shutdown
//! signal arrives.

use std::sync::Arc;

use gatehouse_admission::{AdmissionContext, EngineSettings, QueueWorker};
use gatehouse_config::GatehouseConfig;
use gatehouse_core::{GatehouseError, SystemClock};
use gatehouse_storage::Database;
use gatehouse_telegram::{dispatch, TelegramBot};
use tracing::{error, info, warn};

use crate::shutdown;

/// Settings for this process, preferring the configured bot username.
fn engine_settings(
    config: &GatehouseConfig,
    bot_user: gatehouse_core::UserId,
    reported_username: String,
) -> EngineSettings {
    let mut settings = EngineSettings::from_config(config, bot_user);
    if settings.bot_username.is_empty() {
        settings.bot_username = reported_username;
    } else if !settings.bot_username.eq_ignore_ascii_case(&reported_username) {
        warn!(
            configured = %settings.bot_username,
            reported = %reported_username,
            "telegram.bot_username does not match the bot token"
        );
    }
    settings
}

/// Runs the `gatehouse serve` command.
pub async fn run_serve(config: GatehouseConfig) -> Result<(), GatehouseError> {
    gatehouse_admission::metrics::register_metrics();

    let telegram = TelegramBot::new(&config.telegram)?;
    let (bot_user, username) = telegram.identity().await?;
    let settings = engine_settings(&config, bot_user, username);
    info!(bot_user = %settings.bot_user, username = %settings.bot_username, "bot identity resolved");

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "database opened");

    let ctx = AdmissionContext::new(
        db.clone(),
        Arc::new(telegram.clone()),
        Arc::new(SystemClock),
        settings,
    );
    let cancel = shutdown::install_signal_handler();

    let worker = QueueWorker::new(ctx.clone(), &config.queue);
    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_cancel).await });

    dispatch::run(telegram.bot().clone(), ctx, cancel.clone()).await;

    // The dispatcher can also stop on its own; make sure the worker follows.
    cancel.cancel();
    if let Err(e) = worker_handle.await {
        error!(error = %e, "queue worker task failed");
    }

    db.close().await?;
    info!("gatehouse stopped");
    Ok(())
}
