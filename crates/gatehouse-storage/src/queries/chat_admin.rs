// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The materialized admin list and notification targets.

use gatehouse_core::{ChatId, GatehouseError, UserId};
use rusqlite::params;
use serde_json::Value;

use crate::database::{decode_json, Database};
use crate::models::{AdminRecord, AdministeredChat};
use crate::queries::{chat_info, sessions};

/// Replaces the admin list of `chat` wholesale, refreshing the cached chat
/// info in the same transaction when given.
pub async fn replace_all(
    db: &Database,
    chat: ChatId,
    admins: &[UserId],
    info: Option<Value>,
    now: &str,
) -> Result<(), GatehouseError> {
    let admins: Vec<i64> = admins.iter().map(|u| u.0).collect();
    let info = info.map(|v| v.to_string());
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if let Some(info) = &info {
                chat_info::store(&tx, chat, info, &now)?;
            }
            tx.execute("DELETE FROM chat_admin WHERE chat = ?1", params![chat.0])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO chat_admin (chat, user, created_at) VALUES (?1, ?2, ?3)",
                )?;
                for user in &admins {
                    stmt.execute(params![chat.0, user, now])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn is_admin(db: &Database, chat: ChatId, user: UserId) -> Result<bool, GatehouseError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM chat_admin WHERE chat = ?1 AND user = ?2)",
                params![chat.0, user.0],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Admins of `chat` with their private chat and notification preference.
pub async fn list(db: &Database, chat: ChatId) -> Result<Vec<AdminRecord>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT a.user, p.private_chat, COALESCE(n.enabled, 1)
                 FROM chat_admin a
                 LEFT JOIN user_private_chat p ON p.user = a.user
                 LEFT JOIN admin_notification n ON n.chat = a.chat AND n.user = a.user
                 WHERE a.chat = ?1
                 ORDER BY a.user",
            )?;
            let rows = stmt.query_map(params![chat.0], |row| {
                Ok(AdminRecord {
                    user: UserId(row.get(0)?),
                    private_chat: row.get::<_, Option<i64>>(1)?.map(ChatId),
                    receive_notification: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Private chats of admins who want answer notifications for `chat`.
pub async fn notification_targets(db: &Database, chat: ChatId) -> Result<Vec<ChatId>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.private_chat
                 FROM chat_admin a
                 JOIN user_private_chat p ON p.user = a.user
                 LEFT JOIN admin_notification n ON n.chat = a.chat AND n.user = a.user
                 WHERE a.chat = ?1 AND COALESCE(n.enabled, 1)
                 ORDER BY a.user",
            )?;
            let rows = stmt.query_map(params![chat.0], |row| Ok(ChatId(row.get(0)?)))?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Chats `user` administers, with cached info and pending sessions.
pub async fn administered_chats(
    db: &Database,
    user: UserId,
) -> Result<Vec<AdministeredChat>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let chats: Vec<(i64, Option<String>)> = {
                let mut stmt = conn.prepare(
                    "SELECT a.chat, i.info FROM chat_admin a
                     LEFT JOIN chat_info i ON i.chat = a.chat
                     WHERE a.user = ?1 ORDER BY a.chat",
                )?;
                let rows = stmt.query_map(params![user.0], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<rusqlite::Result<_>>()?
            };
            let mut out = Vec::with_capacity(chats.len());
            for (chat, info) in chats {
                let info = info.map(|text| decode_json(1, &text)).transpose()?;
                out.push(AdministeredChat {
                    chat: ChatId(chat),
                    info,
                    sessions: sessions::load_for_chat(conn, ChatId(chat))?,
                });
            }
            Ok(out)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
