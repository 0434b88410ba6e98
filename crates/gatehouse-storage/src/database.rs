// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Every multi-statement operation runs as one transaction inside one `call`.

use std::path::Path;

use gatehouse_core::GatehouseError;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::migrations::run_migrations;

/// Handle to the Gatehouse SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode and runs
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, GatehouseError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`], with explicit control over WAL mode.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, GatehouseError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| GatehouseError::Storage {
                source: Box::new(e),
            })?;
        }

        // Migrations need a plain connection; run them off the async runtime.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), GatehouseError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update_and_check(None, "journal_mode", journal, |_| Ok(()))
                .map_err(storage_err)?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| GatehouseError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| GatehouseError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(self) -> Result<(), GatehouseError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into `GatehouseError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> GatehouseError {
    GatehouseError::Storage {
        source: Box::new(e),
    }
}

pub(crate) fn storage_err(e: rusqlite::Error) -> GatehouseError {
    GatehouseError::Storage {
        source: Box::new(e),
    }
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, GatehouseError> {
    serde_json::to_string(value).map_err(|e| GatehouseError::Internal(format!("encode json: {e}")))
}

/// Decodes a JSON text column, surfacing failures as column conversion errors.
pub(crate) fn decode_json<T: DeserializeOwned>(column: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
