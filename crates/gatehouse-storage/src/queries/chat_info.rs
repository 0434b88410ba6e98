// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached `getChat` results.

use gatehouse_core::{ChatId, GatehouseError};
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::database::{decode_json, Database};

pub async fn upsert(db: &Database, chat: ChatId, info: &Value, now: &str) -> Result<(), GatehouseError> {
    let info = info.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            store(conn, chat, &info, &now)?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub(crate) fn store(conn: &Connection, chat: ChatId, info: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO chat_info (chat, info, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT (chat) DO UPDATE SET info = excluded.info, updated_at = excluded.updated_at",
        params![chat.0, info, now],
    )?;
    Ok(())
}

pub async fn get(db: &Database, chat: ChatId) -> Result<Option<Value>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT info FROM chat_info WHERE chat = ?1",
                params![chat.0],
                |row| {
                    let info: String = row.get(0)?;
                    decode_json(0, &info)
                },
            );
            match result {
                Ok(info) => Ok(Some(info)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Chat title from the cached info, if known.
pub fn title(info: &Value) -> Option<&str> {
    info.get("title").and_then(Value::as_str)
}
