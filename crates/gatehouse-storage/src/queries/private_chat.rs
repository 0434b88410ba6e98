// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of users' private chats with the bot.

use gatehouse_core::{ChatId, GatehouseError, UserId};
use rusqlite::params;

use crate::database::Database;

/// Records that `user` can be reached at `private_chat`.
pub async fn record(
    db: &Database,
    user: UserId,
    private_chat: ChatId,
    now: &str,
) -> Result<(), GatehouseError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_private_chat (user, private_chat, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (user) DO UPDATE
                 SET private_chat = excluded.private_chat, updated_at = excluded.updated_at",
                params![user.0, private_chat.0, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Forgets a private chat after the user blocked the bot. Returns rows removed.
pub async fn remove_chat(db: &Database, private_chat: ChatId) -> Result<usize, GatehouseError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM user_private_chat WHERE private_chat = ?1",
                params![private_chat.0],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, user: UserId) -> Result<Option<ChatId>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT private_chat FROM user_private_chat WHERE user = ?1",
                params![user.0],
                |row| row.get(0),
            );
            match result {
                Ok(chat) => Ok(Some(ChatId(chat))),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
