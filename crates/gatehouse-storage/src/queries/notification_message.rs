// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger of the live answer notification per (nonce, target chat).

use gatehouse_core::{ChatId, GatehouseError, MessageId, Nonce};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

/// Records `message` as the live notification, returning the one it replaces.
pub async fn replace(
    db: &Database,
    nonce: &Nonce,
    chat: ChatId,
    message: MessageId,
    now: &str,
) -> Result<Option<MessageId>, GatehouseError> {
    let nonce = nonce.0.clone();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let previous: Option<i32> = tx
                .query_row(
                    "SELECT message_id FROM notification_message WHERE nonce = ?1 AND chat = ?2",
                    params![nonce, chat.0],
                    |row| row.get(0),
                )
                .optional()?;
            tx.execute(
                "INSERT INTO notification_message (nonce, chat, message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (nonce, chat) DO UPDATE
                 SET message_id = excluded.message_id, created_at = excluded.created_at",
                params![nonce, chat.0, message.0, now],
            )?;
            tx.commit()?;
            Ok(previous.map(MessageId))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether `message` is still the live notification for (nonce, chat).
pub async fn is_live(
    db: &Database,
    nonce: &Nonce,
    chat: ChatId,
    message: MessageId,
) -> Result<bool, GatehouseError> {
    let nonce = nonce.0.clone();
    db.connection()
        .call(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM notification_message WHERE nonce = ?1 AND chat = ?2 AND message_id = ?3",
                    params![nonce, chat.0, message.0],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Removes the ledger row for (nonce, chat) if `message` is still the live one.
///
/// Returns `false` when the notification was superseded or its session resolved.
pub async fn take(
    db: &Database,
    nonce: &Nonce,
    chat: ChatId,
    message: MessageId,
) -> Result<bool, GatehouseError> {
    let nonce = nonce.0.clone();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM notification_message WHERE nonce = ?1 AND chat = ?2 AND message_id = ?3",
                params![nonce, chat.0, message.0],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every live notification of `nonce` as (target chat, message).
pub async fn list(db: &Database, nonce: &Nonce) -> Result<Vec<(ChatId, MessageId)>, GatehouseError> {
    let nonce = nonce.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT chat, message_id FROM notification_message WHERE nonce = ?1 ORDER BY chat",
            )?;
            let rows = stmt.query_map(params![nonce], |row| {
                Ok((ChatId(row.get(0)?), MessageId(row.get(1)?)))
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
