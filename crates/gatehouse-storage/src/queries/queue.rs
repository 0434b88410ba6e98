// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable delayed queue with at-least-once delivery.
//!
//! Entries become visible at `available_at`. Leasing marks them `processing`
//! until `locked_until`; a lease that runs out without an ack or fail makes
//! the entry deliverable again.

use chrono::{DateTime, Duration, Utc};
use gatehouse_core::types::timestamp;
use gatehouse_core::{GatehouseError, QueuedAction};
use rusqlite::{params, Connection};

use crate::database::{encode_json, Database};
use crate::models::{queue_status, QueueEntry, QueueStats};

const SELECT_ENTRY: &str = "SELECT id, kind, payload, status, attempts, max_attempts, available_at,
        locked_until, last_error, created_at, updated_at FROM queue";

/// `now + secs`, or `ValidationFailed` when the delay does not fit a timestamp.
///
/// Runs before a connection closure so an overflow never reaches the
/// background connection thread.
pub fn delay_until(now: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>, GatehouseError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delay| now.checked_add_signed(delay))
        .ok_or_else(|| GatehouseError::ValidationFailed(format!("delay of {secs}s is out of range")))
}

/// Enqueues `action` to be delivered `delay_secs` after `now`.
pub async fn enqueue(
    db: &Database,
    action: &QueuedAction,
    delay_secs: u64,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<i64, GatehouseError> {
    let kind = action.kind();
    let payload = encode_json(action)?;
    let available_at = delay_until(now, delay_secs)?;
    db.connection()
        .call(move |conn| enqueue_on(conn, kind, &payload, available_at, now, max_attempts))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Inserts a queue row on an open connection or transaction.
pub(crate) fn enqueue_on(
    conn: &Connection,
    kind: &str,
    payload: &str,
    available_at: DateTime<Utc>,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> rusqlite::Result<i64> {
    let available_at = timestamp(available_at);
    let now = timestamp(now);
    conn.execute(
        "INSERT INTO queue (kind, payload, max_attempts, available_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![kind, payload, max_attempts, available_at, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Leases up to `limit` due entries for `lease_secs`, oldest due first.
///
/// Due means pending and available, or processing with an expired lease.
pub async fn lease_due(
    db: &Database,
    now: DateTime<Utc>,
    lease_secs: u64,
    limit: usize,
) -> Result<Vec<QueueEntry>, GatehouseError> {
    let locked_until = timestamp(delay_until(now, lease_secs)?);
    let now = timestamp(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let due: Vec<QueueEntry> = {
                let mut stmt = tx.prepare(&format!(
                    "{SELECT_ENTRY}
                     WHERE (status = 'pending' AND available_at <= ?1)
                        OR (status = 'processing' AND locked_until <= ?1)
                     ORDER BY available_at ASC, id ASC
                     LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![now, limit as i64], entry_from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            };
            for entry in &due {
                tx.execute(
                    "UPDATE queue SET status = 'processing', locked_until = ?2, updated_at = ?3
                     WHERE id = ?1",
                    params![entry.id, locked_until, now],
                )?;
            }
            tx.commit()?;
            Ok(due
                .into_iter()
                .map(|entry| QueueEntry {
                    status: queue_status::PROCESSING.to_string(),
                    locked_until: Some(locked_until.clone()),
                    updated_at: now.clone(),
                    ..entry
                })
                .collect())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Marks an entry as successfully delivered.
pub async fn ack(db: &Database, id: i64, now: DateTime<Utc>) -> Result<(), GatehouseError> {
    let now = timestamp(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL, updated_at = ?2
                 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Records a failed delivery.
///
/// Increments attempts. Once `max_attempts` is reached the entry is parked as
/// `failed`; otherwise it becomes available again after `backoff_secs`.
/// Returns `true` when the entry was parked.
pub async fn fail(
    db: &Database,
    id: i64,
    error: &str,
    now: DateTime<Utc>,
    backoff_secs: u64,
) -> Result<bool, GatehouseError> {
    let error = error.to_string();
    let retry_at = timestamp(delay_until(now, backoff_secs)?);
    let now = timestamp(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let (attempts, max_attempts): (i32, i32) = tx.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let parked = new_attempts >= max_attempts;
            if parked {
                tx.execute(
                    "UPDATE queue SET status = 'failed', attempts = ?2, last_error = ?3,
                     locked_until = NULL, updated_at = ?4
                     WHERE id = ?1",
                    params![id, new_attempts, error, now],
                )?;
            } else {
                tx.execute(
                    "UPDATE queue SET status = 'pending', attempts = ?2, last_error = ?3,
                     locked_until = NULL, available_at = ?4, updated_at = ?5
                     WHERE id = ?1",
                    params![id, new_attempts, error, retry_at, now],
                )?;
            }
            tx.commit()?;
            Ok(parked)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<QueueEntry>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(&format!("{SELECT_ENTRY} WHERE id = ?1"), params![id], entry_from_row);
            match result {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Entry counts per status.
pub async fn stats(db: &Database) -> Result<QueueStats, GatehouseError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM queue GROUP BY status")?;
            let mut rows = stmt.query([])?;
            let mut stats = QueueStats::default();
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                match status.as_str() {
                    queue_status::PENDING => stats.pending = count,
                    queue_status::PROCESSING => stats.processing = count,
                    queue_status::COMPLETED => stats.completed = count,
                    queue_status::FAILED => stats.failed = count,
                    _ => {}
                }
            }
            Ok(stats)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        kind: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        available_at: row.get(6)?,
        locked_until: row.get(7)?,
        last_error: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
