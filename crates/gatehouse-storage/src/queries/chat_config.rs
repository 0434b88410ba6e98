// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reads of the `chat_config` projection.

use gatehouse_core::{ChatConfig, ChatId, GatehouseError};
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::database::{decode_json, Database};

/// Every stored `(language, patch)` row of a chat.
pub async fn layers(db: &Database, chat: ChatId) -> Result<Vec<(String, Value)>, GatehouseError> {
    db.connection()
        .call(move |conn| load_layers(conn, chat))
        .await
        .map_err(crate::database::map_tr_err)
}

pub(crate) fn load_layers(conn: &Connection, chat: ChatId) -> rusqlite::Result<Vec<(String, Value)>> {
    let mut stmt =
        conn.prepare("SELECT language, value FROM chat_config WHERE chat = ?1 ORDER BY language")?;
    let rows = stmt.query_map(params![chat.0], |row| {
        let value: String = row.get(1)?;
        Ok((row.get(0)?, decode_json(1, &value)?))
    })?;
    rows.collect()
}

/// Effective configuration of `chat` for a user speaking `language`.
pub async fn effective(
    db: &Database,
    chat: ChatId,
    language: &str,
) -> Result<ChatConfig, GatehouseError> {
    let layers = layers(db, chat).await?;
    ChatConfig::for_language(&layers, language)
}

/// The raw stored patch for one (chat, language), as admins edit it.
pub async fn stored_patch(
    db: &Database,
    chat: ChatId,
    language: &str,
) -> Result<Option<Value>, GatehouseError> {
    let language = language.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT value FROM chat_config WHERE chat = ?1 AND language = ?2",
                params![chat.0, language],
                |row| {
                    let value: String = row.get(0)?;
                    decode_json(0, &value)
                },
            );
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
