// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit log append and history.
//!
//! Appending is the only way to change chat configuration, forms, or
//! notification preferences. The admin check, the insert, and the projection
//! share one transaction.

use gatehouse_core::types::generate_token;
use gatehouse_core::{AuditAction, AuditEntry, ChatId, GatehouseError, UserId};
use rusqlite::{params, Transaction};
use tracing::debug;

use crate::database::{decode_json, encode_json, Database};
use crate::queries::projection;

const ORIGIN_ADMIN: &str = "admin";
const ORIGIN_SYSTEM: &str = "system";

enum AppendOutcome {
    Appended(AuditEntry),
    Denied,
    Missing(String),
    Invalid(String),
}

/// Appends an admin action and applies its projection.
///
/// Fails with `PermissionDenied` when `user` is not an admin of `chat`, with
/// `ValidationFailed` for malformed payloads, and with `NotFound` when a form
/// action names a form that does not exist. Nothing is written on failure.
pub async fn append(
    db: &Database,
    chat: ChatId,
    user: UserId,
    action: AuditAction,
    now: &str,
) -> Result<AuditEntry, GatehouseError> {
    if action.is_system() {
        return Err(GatehouseError::PermissionDenied(format!(
            "`{}` can only be recorded by the service",
            action.kind()
        )));
    }
    action.validate()?;
    let encoded = encode_json(&action)?;
    let now = now.to_string();

    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let is_admin: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM chat_admin WHERE chat = ?1 AND user = ?2)",
                params![chat.0, user.0],
                |row| row.get(0),
            )?;
            if !is_admin {
                return Ok(AppendOutcome::Denied);
            }
            if let Some(problem) = precondition(&tx, chat, &action)? {
                return Ok(problem);
            }
            let entry = insert(&tx, chat, user, action, &encoded, ORIGIN_ADMIN, now)?;
            tx.commit()?;
            Ok(AppendOutcome::Appended(entry))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        AppendOutcome::Appended(entry) => {
            debug!(chat = %entry.chat, user = %entry.user, action = entry.action.kind(), seq = entry.seq, "audit entry appended");
            Ok(entry)
        }
        AppendOutcome::Denied => Err(GatehouseError::PermissionDenied(format!(
            "user {user} is not an admin of chat {chat}"
        ))),
        AppendOutcome::Missing(what) => Err(GatehouseError::NotFound(what)),
        AppendOutcome::Invalid(why) => Err(GatehouseError::ValidationFailed(why)),
    }
}

/// Records a fact observed by the service itself (no admin gate).
///
/// `actor` is the bot's own user id.
pub async fn append_system(
    db: &Database,
    chat: ChatId,
    actor: UserId,
    action: AuditAction,
    now: &str,
) -> Result<AuditEntry, GatehouseError> {
    if !action.is_system() {
        return Err(GatehouseError::Internal(format!(
            "`{}` is not a system action",
            action.kind()
        )));
    }
    let encoded = encode_json(&action)?;
    let now = now.to_string();
    let entry = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let entry = insert(&tx, chat, actor, action, &encoded, ORIGIN_SYSTEM, now)?;
            tx.commit()?;
            Ok(entry)
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    debug!(chat = %entry.chat, action = entry.action.kind(), seq = entry.seq, "system audit entry appended");
    Ok(entry)
}

fn insert(
    tx: &Transaction<'_>,
    chat: ChatId,
    user: UserId,
    action: AuditAction,
    encoded: &str,
    origin: &str,
    now: String,
) -> rusqlite::Result<AuditEntry> {
    let id = generate_token();
    tx.execute(
        "INSERT INTO audit (chat, id, user, origin, action, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![chat.0, id, user.0, origin, encoded, now],
    )?;
    let entry = AuditEntry {
        seq: tx.last_insert_rowid(),
        chat,
        id,
        user,
        action,
        created_at: now,
    };
    projection::apply(tx, &entry)?;
    Ok(entry)
}

/// State-dependent checks for form actions.
fn precondition(
    tx: &Transaction<'_>,
    chat: ChatId,
    action: &AuditAction,
) -> rusqlite::Result<Option<AppendOutcome>> {
    if let AuditAction::ChatAdminToggleNotification { user: Some(target), .. } = action {
        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM chat_admin WHERE chat = ?1 AND user = ?2)",
            params![chat.0, target.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(Some(AppendOutcome::Missing(format!("admin {target}"))));
        }
    }
    let Some(id) = action.form_id() else {
        return Ok(None);
    };
    if matches!(action, AuditAction::FormUpdate { .. }) {
        return Ok(None);
    }
    let deleted: Option<bool> = match tx.query_row(
        "SELECT deleted_at IS NOT NULL FROM form WHERE chat = ?1 AND language = ?2 AND id = ?3",
        params![chat.0, action.language(), id],
        |row| row.get(0),
    ) {
        Ok(deleted) => Some(deleted),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e),
    };
    let Some(deleted) = deleted else {
        return Ok(Some(AppendOutcome::Missing(format!("form {id}"))));
    };
    let outcome = match action {
        AuditAction::FormEnable { .. } if deleted => Some(AppendOutcome::Invalid(format!(
            "form {id} is deleted and cannot be enabled"
        ))),
        AuditAction::FormDeleteForever { .. } if !deleted => Some(AppendOutcome::Invalid(
            format!("form {id} must be deleted before it can be removed permanently"),
        )),
        _ => None,
    };
    Ok(outcome)
}

/// Audit history of one chat, newest first.
pub async fn list_for_chat(
    db: &Database,
    chat: ChatId,
    limit: u32,
) -> Result<Vec<AuditEntry>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, chat, id, user, action, created_at FROM audit
                 WHERE chat = ?1 ORDER BY seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![chat.0, limit], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub(crate) fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let action: String = row.get(4)?;
    Ok(AuditEntry {
        seq: row.get(0)?,
        chat: ChatId(row.get(1)?),
        id: row.get(2)?,
        user: UserId(row.get(3)?),
        action: decode_json(4, &action)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{chat_admin, chat_config, forms};
    use serde_json::json;
    use tempfile::tempdir;

    const NOW: &str = "2026-01-01T00:00:00.000Z";
    const FORM_A: &str = "formAaaaaaaaaaaaaaaaa";

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        chat_admin::replace_all(&db, ChatId(100), &[UserId(1)], None, NOW)
            .await
            .unwrap();
        (db, dir)
    }

    fn sample_form() -> gatehouse_core::FormContent {
        serde_json::from_value(json!({
            "tag": "t",
            "description": "d",
            "pages": [{"id": "pageaaaaaaaaaaaaaaaaa", "subtitle": "s",
                       "fields": [{"id": "labelaaaaaaaaaaaaaaaa", "type": "label", "content": "hi"}]}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn non_admin_append_is_denied_and_writes_nothing() {
        let (db, _dir) = setup_db().await;

        let err = append(
            &db,
            ChatId(100),
            UserId(2),
            AuditAction::ChatConfigUpdate { language: None, value: json!({"ban_duration": 60}) },
            NOW,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatehouseError::PermissionDenied(_)));

        let counts: (i64, i64, i64) = db
            .connection()
            .call(|conn| -> Result<_, rusqlite::Error> {
                conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM audit), (SELECT COUNT(*) FROM chat_config),
                            (SELECT COUNT(*) FROM form)",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
            })
            .await
            .unwrap();
        assert_eq!(counts, (0, 0, 0));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn config_updates_merge() {
        let (db, _dir) = setup_db().await;
        for value in [json!({"ban_duration": 600}), json!({"challenge_timeout": 120})] {
            append(&db, ChatId(100), UserId(1), AuditAction::ChatConfigUpdate { language: None, value }, NOW)
                .await
                .unwrap();
        }
        let config = chat_config::effective(&db, ChatId(100), "").await.unwrap();
        assert_eq!(config.ban_duration, 600);
        assert_eq!(config.challenge_timeout, 120);
        assert_eq!(config.notification_direct_timeout, 300);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn null_member_removes_stored_value() {
        let (db, _dir) = setup_db().await;
        for value in [json!({"ban_duration": 600, "enabled": false}), json!({"ban_duration": null})] {
            append(&db, ChatId(100), UserId(1), AuditAction::ChatConfigUpdate { language: None, value }, NOW)
                .await
                .unwrap();
        }
        let stored = chat_config::stored_patch(&db, ChatId(100), "").await.unwrap();
        assert_eq!(stored, Some(json!({"enabled": false})));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_write() {
        let (db, _dir) = setup_db().await;
        let err = append(
            &db,
            ChatId(100),
            UserId(1),
            AuditAction::ChatConfigUpdate { language: None, value: json!({"ban_duration": "x"}) },
            NOW,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatehouseError::ValidationFailed(_)));
        assert!(list_for_chat(&db, ChatId(100), 10).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn form_lifecycle_enforces_preconditions() {
        let (db, _dir) = setup_db().await;
        let admin = UserId(1);
        let chat = ChatId(100);

        let err = append(&db, chat, admin, AuditAction::FormEnable { id: FORM_A.into(), language: None }, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::NotFound(_)));

        append(
            &db,
            chat,
            admin,
            AuditAction::FormUpdate { id: FORM_A.into(), language: None, content: sample_form() },
            NOW,
        )
        .await
        .unwrap();
        let listed = forms::list(&db, chat, None).await.unwrap();
        assert!(listed[0].enabled, "first form is enabled automatically");

        let err = append(&db, chat, admin, AuditAction::FormDeleteForever { id: FORM_A.into(), language: None }, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::ValidationFailed(_)));

        append(&db, chat, admin, AuditAction::FormDelete { id: FORM_A.into(), language: None }, NOW)
            .await
            .unwrap();
        let err = append(&db, chat, admin, AuditAction::FormEnable { id: FORM_A.into(), language: None }, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::ValidationFailed(_)));

        append(&db, chat, admin, AuditAction::FormDeleteForever { id: FORM_A.into(), language: None }, NOW)
            .await
            .unwrap();
        assert!(forms::list(&db, chat, None).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn system_actions_bypass_admin_gate_but_not_the_other_way() {
        let (db, _dir) = setup_db().await;
        append(
            &db,
            ChatId(100),
            UserId(1),
            AuditAction::ChatConfigUpdate { language: None, value: json!({"enabled": false}) },
            NOW,
        )
        .await
        .unwrap();

        let err = append(&db, ChatId(100), UserId(1), AuditAction::ChatDeparted, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::PermissionDenied(_)));

        let entry = append_system(&db, ChatId(100), UserId(999), AuditAction::ChatDeparted, NOW)
            .await
            .unwrap();
        assert_eq!(entry.user, UserId(999));
        assert!(chat_config::stored_patch(&db, ChatId(100), "").await.unwrap().is_none());

        let history = list_for_chat(&db, ChatId(100), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, AuditAction::ChatDeparted);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn audit_rows_cannot_be_updated_or_deleted() {
        let (db, _dir) = setup_db().await;
        append(
            &db,
            ChatId(100),
            UserId(1),
            AuditAction::ChatConfigReset { language: None },
            NOW,
        )
        .await
        .unwrap();
        let (update, delete) = db
            .connection()
            .call(|conn| -> Result<_, rusqlite::Error> {
                let update = conn.execute("UPDATE audit SET user = 5", []).is_err();
                let delete = conn.execute("DELETE FROM audit", []).is_err();
                Ok((update, delete))
            })
            .await
            .unwrap();
        assert!(update && delete);
        db.close().await.unwrap();
    }
}
