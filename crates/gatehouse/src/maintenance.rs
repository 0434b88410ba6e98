// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gatehouse migrate` and `gatehouse replay`.

use gatehouse_config::GatehouseConfig;
use gatehouse_core::GatehouseError;
use gatehouse_storage::queries::replay;
use gatehouse_storage::{Database, ReplayReport};
use tracing::info;

/// Opens the database, which applies pending migrations, and closes it again.
pub async fn run_migrate(config: &GatehouseConfig) -> Result<(), GatehouseError> {
    let path = &config.storage.database_path;
    let db = Database::open_with(path, config.storage.wal_mode).await?;
    db.close().await?;
    info!(path = %path, "database schema is up to date");
    println!("gatehouse: database ready at {path}");
    Ok(())
}

/// Rebuilds the projected tables from the audit log.
pub async fn run_replay(config: &GatehouseConfig) -> Result<(), GatehouseError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let report = replay::rebuild_projections(&db).await;
    db.close().await?;
    let report = report?;
    println!("{}", describe(&report));
    Ok(())
}

fn describe(report: &ReplayReport) -> String {
    format!(
        "gatehouse: replayed {} audit entries ({} chat config rows, {} forms, {} notification preferences)",
        report.entries, report.chat_configs, report.forms, report.admin_notifications
    )
}
