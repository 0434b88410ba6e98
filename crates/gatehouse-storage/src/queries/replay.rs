// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rebuilds the projected tables from the audit log.

use gatehouse_core::GatehouseError;
use tracing::info;

use crate::database::Database;
use crate::models::ReplayReport;
use crate::queries::{audit, projection};

/// Truncates `chat_config`, `form` and `admin_notification`, then folds every
/// audit entry back in, in `seq` order, in one transaction.
pub async fn rebuild_projections(db: &Database) -> Result<ReplayReport, GatehouseError> {
    let report = db
        .connection()
        .call(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM chat_config;
                 DELETE FROM form;
                 DELETE FROM admin_notification;",
            )?;
            let entries = {
                let mut stmt = tx.prepare(
                    "SELECT seq, chat, id, user, action, created_at FROM audit ORDER BY seq ASC",
                )?;
                let rows = stmt.query_map([], audit::entry_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            for entry in &entries {
                projection::apply(&tx, entry)?;
            }
            let report = tx.query_row(
                "SELECT (SELECT COUNT(*) FROM chat_config), (SELECT COUNT(*) FROM form),
                        (SELECT COUNT(*) FROM admin_notification)",
                [],
                |row| {
                    Ok(ReplayReport {
                        entries: entries.len(),
                        chat_configs: row.get(0)?,
                        forms: row.get(1)?,
                        admin_notifications: row.get(2)?,
                    })
                },
            )?;
            tx.commit()?;
            Ok(report)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    info!(
        entries = report.entries,
        chat_configs = report.chat_configs,
        forms = report.forms,
        "projections rebuilt from audit log"
    );
    Ok(report)
}

/// Serialized contents of every projected table, for comparisons.
pub async fn snapshot(db: &Database) -> Result<Vec<String>, GatehouseError> {
    db.connection()
        .call(|conn| {
            let mut out = Vec::new();
            for sql in [
                "SELECT chat || '|' || language || '|' || value || '|' || created_at || '|' || updated_at
                 FROM chat_config ORDER BY chat, language",
                "SELECT chat || '|' || language || '|' || id || '|' || enabled || '|' || content
                        || '|' || COALESCE(deleted_at, '-') || '|' || created_at || '|' || updated_at
                 FROM form ORDER BY chat, language, id",
                "SELECT chat || '|' || user || '|' || enabled || '|' || updated_at
                 FROM admin_notification ORDER BY chat, user",
            ] {
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                for row in rows {
                    out.push(row?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
