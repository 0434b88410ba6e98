// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The projector: folds one audit entry into the derived tables.
//!
//! Runs inside the transaction that inserts the entry, and again for every
//! entry during replay. It reads nothing but the entry and the projected
//! tables, and stamps rows with the entry's own `created_at`, so replaying the
//! log reproduces the tables exactly.

use gatehouse_core::{AuditAction, AuditEntry};
use rusqlite::{params, Transaction};

/// Applies `entry` to `chat_config`, `form`, and `admin_notification`.
pub(crate) fn apply(tx: &Transaction<'_>, entry: &AuditEntry) -> rusqlite::Result<()> {
    let chat = entry.chat.0;
    let at = entry.created_at.as_str();
    let language = entry.action.language();

    match &entry.action {
        AuditAction::ChatConfigUpdate { value, .. } => {
            let patch = value.to_string();
            // json_patch('{}', ..) strips nulls on first insert; on conflict the
            // raw patch is applied so nulls remove existing members.
            tx.execute(
                "INSERT INTO chat_config (chat, language, value, created_at, updated_at)
                 VALUES (?1, ?2, json_patch('{}', ?3), ?4, ?4)
                 ON CONFLICT (chat, language) DO UPDATE
                 SET value = json_patch(chat_config.value, ?3), updated_at = ?4",
                params![chat, language, patch, at],
            )?;
        }
        AuditAction::ChatConfigReset { .. } => {
            tx.execute(
                "DELETE FROM chat_config WHERE chat = ?1 AND language = ?2",
                params![chat, language],
            )?;
        }
        AuditAction::DropLanguage { .. } => {
            tx.execute(
                "DELETE FROM chat_config WHERE chat = ?1 AND language = ?2",
                params![chat, language],
            )?;
            tx.execute(
                "DELETE FROM form WHERE chat = ?1 AND language = ?2",
                params![chat, language],
            )?;
        }
        AuditAction::FormEnable { id, .. } => {
            // Siblings first: the partial unique index allows one enabled form.
            tx.execute(
                "UPDATE form SET enabled = 0
                 WHERE chat = ?1 AND language = ?2 AND id != ?3 AND deleted_at IS NULL",
                params![chat, language, id],
            )?;
            tx.execute(
                "UPDATE form SET enabled = 1
                 WHERE chat = ?1 AND language = ?2 AND id = ?3 AND deleted_at IS NULL",
                params![chat, language, id],
            )?;
        }
        AuditAction::FormUpdate { id, content, .. } => {
            let content = serde_json::to_string(content)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                "INSERT INTO form (chat, language, id, content, enabled, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4,
                         NOT EXISTS (SELECT 1 FROM form WHERE chat = ?1 AND language = ?2),
                         ?5, ?5)
                 ON CONFLICT (chat, language, id) DO UPDATE
                 SET content = excluded.content, updated_at = excluded.updated_at",
                params![chat, language, id, content, at],
            )?;
        }
        AuditAction::FormDelete { id, .. } => {
            tx.execute(
                "UPDATE form SET deleted_at = ?4, enabled = 0
                 WHERE chat = ?1 AND language = ?2 AND id = ?3",
                params![chat, language, id, at],
            )?;
        }
        AuditAction::FormRecover { id, .. } => {
            tx.execute(
                "UPDATE form SET deleted_at = NULL
                 WHERE chat = ?1 AND language = ?2 AND id = ?3",
                params![chat, language, id],
            )?;
        }
        AuditAction::FormDeleteForever { id, .. } => {
            tx.execute(
                "DELETE FROM form
                 WHERE chat = ?1 AND language = ?2 AND id = ?3 AND deleted_at IS NOT NULL",
                params![chat, language, id],
            )?;
        }
        AuditAction::ChatAdminToggleNotification { value, user } => {
            let target = user.unwrap_or(entry.user).0;
            tx.execute(
                "INSERT INTO admin_notification (chat, user, enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (chat, user) DO UPDATE
                 SET enabled = excluded.enabled, updated_at = excluded.updated_at",
                params![chat, target, value, at],
            )?;
        }
        AuditAction::ChatDeparted => {
            tx.execute("DELETE FROM chat_config WHERE chat = ?1", params![chat])?;
        }
    }
    Ok(())
}
