// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session rows and the claim primitive.
//!
//! A session row exists exactly while its challenge is unresolved. Resolution
//! is claimed by deleting the row with `DELETE ... RETURNING`: the caller that
//! gets the row back owns every side effect, everyone else sees zero rows.

use chrono::{DateTime, Utc};
use gatehouse_core::types::timestamp;
use gatehouse_core::{
    Answer, ChatConfig, ChatId, GatehouseError, MessageId, Nonce, QueuedAction, Session, UserId,
    UserProfile,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use tracing::debug;

use crate::database::{decode_json, encode_json, Database};
use crate::models::{ClaimedSession, CreatedSession};
use crate::queries::{chat_config, forms, queue};

const COLUMNS: &str = "chat, user, user_info, user_chat_info, nonce, language, welcome_message,
        form, answer, created_at, updated_at";

/// Who is allowed to claim a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimGuard {
    /// An admin of the session's chat.
    Admin { actor: UserId },
    /// The challenge timeout for `user`; only claims sessions that were never answered.
    Timeout { user: UserId },
}

/// Input for [`create`].
#[derive(Debug, Clone)]
pub struct NewSession {
    pub chat: ChatId,
    pub user_info: UserProfile,
    pub nonce: Nonce,
    /// Seconds until the `welcome-timeout` delivery.
    pub challenge_timeout: u64,
    pub queue_max_attempts: u32,
}

enum ClaimOutcome {
    Claimed {
        session: Session,
        language: String,
        layers: Vec<(String, Value)>,
        notifications: Vec<(ChatId, MessageId)>,
    },
    Forbidden,
    Gone,
}

enum SubmitOutcome {
    Stored(Session),
    NotOwner,
    Invalid(GatehouseError),
    Gone,
}

/// Persists a fresh session and schedules its timeout, atomically.
///
/// Any earlier session of the same (chat, user) is replaced. The form
/// snapshot is the chat's enabled form for the user's language.
pub async fn create(
    db: &Database,
    new: NewSession,
    now: DateTime<Utc>,
) -> Result<CreatedSession, GatehouseError> {
    let user_info = encode_json(&new.user_info)?;
    let timeout = QueuedAction::WelcomeTimeout {
        chat_id: new.chat,
        nonce: new.nonce.clone(),
        target_user: new.user_info.id,
        welcome_message: None,
    };
    let payload = encode_json(&timeout)?;
    let timeout_at = queue::delay_until(now, new.challenge_timeout)?;
    let stamp = timestamp(now);

    let (session, replaced_welcome, queue_id) = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let chat = new.chat;
            let user = new.user_info.id;
            let language = new.user_info.language().to_string();

            let replaced: Option<(String, Option<i32>)> = tx
                .query_row(
                    "DELETE FROM session WHERE chat = ?1 AND user = ?2 RETURNING nonce, welcome_message",
                    params![chat.0, user.0],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((old_nonce, _)) = &replaced {
                tx.execute("DELETE FROM notification_message WHERE nonce = ?1", params![old_nonce])?;
            }

            let form = forms::load_enabled(&tx, chat, &language)?;
            let form_json = form
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                "INSERT INTO session (chat, user, user_info, nonce, language, form, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![chat.0, user.0, user_info, new.nonce.0, language, form_json, stamp],
            )?;
            let queue_id = queue::enqueue_on(
                &tx,
                timeout.kind(),
                &payload,
                timeout_at,
                now,
                new.queue_max_attempts,
            )?;
            tx.commit()?;

            let session = Session {
                chat,
                user,
                user_info: new.user_info,
                user_chat_info: None,
                nonce: new.nonce,
                welcome_message: None,
                form,
                answer: None,
                created_at: stamp.clone(),
                updated_at: stamp,
            };
            Ok((session, replaced.and_then(|(_, msg)| msg).map(MessageId), queue_id))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    debug!(chat = %session.chat, user = %session.user, nonce = %session.nonce, queue_id, "session created");
    Ok(CreatedSession {
        session,
        replaced_welcome,
        queue_id,
    })
}

/// Records the welcome message id. Returns `false` if the session is already gone.
pub async fn set_welcome_message(
    db: &Database,
    chat: ChatId,
    nonce: &Nonce,
    message: MessageId,
    now: &str,
) -> Result<bool, GatehouseError> {
    let nonce = nonce.0.clone();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE session SET welcome_message = ?3, updated_at = ?4 WHERE chat = ?1 AND nonce = ?2",
                params![chat.0, nonce, message.0, now],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, chat: ChatId, user: UserId) -> Result<Option<Session>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM session WHERE chat = ?1 AND user = ?2"),
                params![chat.0, user.0],
                |row| Ok(session_from_row(row)?.0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_nonce(db: &Database, nonce: &Nonce) -> Result<Option<Session>, GatehouseError> {
    let nonce = nonce.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM session WHERE nonce = ?1"),
                params![nonce],
                |row| Ok(session_from_row(row)?.0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Pending and answered sessions of `chat`, oldest first.
pub async fn list_for_chat(db: &Database, chat: ChatId) -> Result<Vec<Session>, GatehouseError> {
    db.connection()
        .call(move |conn| load_for_chat(conn, chat))
        .await
        .map_err(crate::database::map_tr_err)
}

pub(crate) fn load_for_chat(conn: &Connection, chat: ChatId) -> rusqlite::Result<Vec<Session>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM session WHERE chat = ?1 ORDER BY created_at, user"
    ))?;
    let rows = stmt.query_map(params![chat.0], |row| Ok(session_from_row(row)?.0))?;
    rows.collect()
}

/// Stores `answer` on the session identified by `nonce`, owned by `user`.
///
/// The answer is checked against the session's own form snapshot. A session
/// may be answered again until it is resolved.
pub async fn submit_answer(
    db: &Database,
    user: UserId,
    nonce: &Nonce,
    answer: Answer,
    now: &str,
) -> Result<Session, GatehouseError> {
    let nonce_text = nonce.0.clone();
    let answer_json = encode_json(&answer)?;
    let now = now.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let found = tx
                .query_row(
                    &format!("SELECT {COLUMNS} FROM session WHERE nonce = ?1"),
                    params![nonce_text],
                    |row| Ok(session_from_row(row)?.0),
                )
                .optional()?;
            let Some(mut session) = found else {
                return Ok(SubmitOutcome::Gone);
            };
            if session.user != user {
                return Ok(SubmitOutcome::NotOwner);
            }
            if let Some(form) = &session.form
                && let Err(e) = form.check_answer(&answer)
            {
                return Ok(SubmitOutcome::Invalid(e));
            }
            tx.execute(
                "UPDATE session SET answer = ?2, updated_at = ?3 WHERE nonce = ?1",
                params![nonce_text, answer_json, now],
            )?;
            tx.commit()?;
            session.answer = Some(answer);
            session.updated_at = now;
            Ok(SubmitOutcome::Stored(session))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        SubmitOutcome::Stored(session) => {
            debug!(chat = %session.chat, user = %session.user, nonce = %session.nonce, "answer stored");
            Ok(session)
        }
        SubmitOutcome::NotOwner => Err(GatehouseError::PermissionDenied(format!(
            "session {nonce} belongs to another user"
        ))),
        SubmitOutcome::Invalid(e) => Err(e),
        SubmitOutcome::Gone => Err(GatehouseError::NotFound(format!("session {nonce}"))),
    }
}

/// Refreshes the form snapshot of an unanswered session from the currently
/// enabled form. Answered sessions are returned unchanged.
pub async fn reload_form(
    db: &Database,
    user: UserId,
    nonce: &Nonce,
    now: &str,
) -> Result<Session, GatehouseError> {
    let nonce_text = nonce.0.clone();
    let now = now.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let found = tx
                .query_row(
                    &format!("SELECT {COLUMNS} FROM session WHERE nonce = ?1"),
                    params![nonce_text],
                    session_from_row,
                )
                .optional()?;
            let Some((mut session, language)) = found else {
                return Ok(SubmitOutcome::Gone);
            };
            if session.user != user {
                return Ok(SubmitOutcome::NotOwner);
            }
            if session.answer.is_some() {
                return Ok(SubmitOutcome::Stored(session));
            }
            let form = forms::load_enabled(&tx, session.chat, &language)?;
            if form != session.form {
                let form_json = form
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                tx.execute(
                    "UPDATE session SET form = ?2, updated_at = ?3 WHERE nonce = ?1",
                    params![nonce_text, form_json, now],
                )?;
                session.form = form;
                session.updated_at = now;
            }
            tx.commit()?;
            Ok(SubmitOutcome::Stored(session))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        SubmitOutcome::Stored(session) => Ok(session),
        SubmitOutcome::NotOwner => Err(GatehouseError::PermissionDenied(format!(
            "session {nonce} belongs to another user"
        ))),
        SubmitOutcome::Invalid(e) => Err(e),
        SubmitOutcome::Gone => Err(GatehouseError::NotFound(format!("session {nonce}"))),
    }
}

/// Stores the user's private-chat profile on their pending session in `chat`
/// and detaches the welcome message.
///
/// Returns `None` when there is no session, otherwise the welcome message that
/// was detached (if any).
pub async fn set_user_chat_info(
    db: &Database,
    chat: ChatId,
    user: UserId,
    info: &Value,
    now: &str,
) -> Result<Option<Option<MessageId>>, GatehouseError> {
    let info = info.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let welcome: Option<Option<i32>> = tx
                .query_row(
                    "SELECT welcome_message FROM session WHERE chat = ?1 AND user = ?2",
                    params![chat.0, user.0],
                    |row| row.get(0),
                )
                .optional()?;
            if welcome.is_some() {
                tx.execute(
                    "UPDATE session SET user_chat_info = ?3, welcome_message = NULL, updated_at = ?4
                     WHERE chat = ?1 AND user = ?2",
                    params![chat.0, user.0, info, now],
                )?;
            }
            tx.commit()?;
            Ok(welcome.map(|msg| msg.map(MessageId)))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Drops the session of a member who left, without any resolution side effects.
pub async fn discard(db: &Database, chat: ChatId, user: UserId) -> Result<Option<Session>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx
                .query_row(
                    &format!("DELETE FROM session WHERE chat = ?1 AND user = ?2 RETURNING {COLUMNS}"),
                    params![chat.0, user.0],
                    |row| Ok(session_from_row(row)?.0),
                )
                .optional()?;
            if let Some(session) = &removed {
                tx.execute(
                    "DELETE FROM notification_message WHERE nonce = ?1",
                    params![session.nonce.0],
                )?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The claim primitive.
///
/// Atomically deletes the session identified by `nonce` (and `chat`, when
/// known) if `guard` admits the caller, and reads the chat configuration for
/// the session's language in the same transaction. Fails with
/// `PermissionDenied` when the session exists but the guard rejects the
/// caller, and with `NotFound` when there is nothing left to claim.
pub async fn claim(
    db: &Database,
    chat: Option<ChatId>,
    nonce: &Nonce,
    guard: ClaimGuard,
) -> Result<ClaimedSession, GatehouseError> {
    let nonce_text = nonce.0.clone();
    let chat_filter = chat.map(|c| c.0);
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let claimed = match guard {
                ClaimGuard::Admin { actor } => tx
                    .query_row(
                        &format!(
                            "DELETE FROM session
                             WHERE nonce = ?1 AND (?2 IS NULL OR chat = ?2)
                               AND EXISTS (SELECT 1 FROM chat_admin a
                                           WHERE a.chat = session.chat AND a.user = ?3)
                             RETURNING {COLUMNS}"
                        ),
                        params![nonce_text, chat_filter, actor.0],
                        session_from_row,
                    )
                    .optional()?,
                ClaimGuard::Timeout { user } => tx
                    .query_row(
                        &format!(
                            "DELETE FROM session
                             WHERE nonce = ?1 AND (?2 IS NULL OR chat = ?2)
                               AND user = ?3 AND answer IS NULL
                             RETURNING {COLUMNS}"
                        ),
                        params![nonce_text, chat_filter, user.0],
                        session_from_row,
                    )
                    .optional()?,
            };

            let Some((session, language)) = claimed else {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS (SELECT 1 FROM session WHERE nonce = ?1 AND (?2 IS NULL OR chat = ?2))",
                    params![nonce_text, chat_filter],
                    |row| row.get(0),
                )?;
                return Ok(match guard {
                    ClaimGuard::Admin { .. } if exists => ClaimOutcome::Forbidden,
                    _ => ClaimOutcome::Gone,
                });
            };

            let layers = chat_config::load_layers(&tx, session.chat)?;
            let notifications = take_notifications(&tx, &session.nonce)?;
            tx.commit()?;
            Ok(ClaimOutcome::Claimed {
                session,
                language,
                layers,
                notifications,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        ClaimOutcome::Claimed {
            session,
            language,
            layers,
            notifications,
        } => {
            let config = ChatConfig::for_language(&layers, &language)?;
            debug!(chat = %session.chat, user = %session.user, nonce = %session.nonce, ?guard, "session claimed");
            Ok(ClaimedSession {
                session,
                config,
                notifications,
            })
        }
        ClaimOutcome::Forbidden => Err(GatehouseError::PermissionDenied(format!(
            "not allowed to resolve session {nonce}"
        ))),
        ClaimOutcome::Gone => Err(GatehouseError::NotFound(format!("session {nonce}"))),
    }
}

fn take_notifications(tx: &Transaction<'_>, nonce: &Nonce) -> rusqlite::Result<Vec<(ChatId, MessageId)>> {
    let mut stmt = tx.prepare(
        "DELETE FROM notification_message WHERE nonce = ?1 RETURNING chat, message_id",
    )?;
    let rows = stmt.query_map(params![nonce.0], |row| {
        Ok((ChatId(row.get(0)?), MessageId(row.get(1)?)))
    })?;
    let mut out = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    out.sort_by_key(|(chat, _)| *chat);
    Ok(out)
}

/// Decodes a row selected with [`COLUMNS`] into the session and its language.
fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Session, String)> {
    let user_info: String = row.get(2)?;
    let user_chat_info: Option<String> = row.get(3)?;
    let form: Option<String> = row.get(7)?;
    let answer: Option<String> = row.get(8)?;
    let session = Session {
        chat: ChatId(row.get(0)?),
        user: UserId(row.get(1)?),
        user_info: decode_json(2, &user_info)?,
        user_chat_info: user_chat_info.map(|v| decode_json(3, &v)).transpose()?,
        nonce: Nonce(row.get(4)?),
        welcome_message: row.get::<_, Option<i32>>(6)?.map(MessageId),
        form: form.map(|v| decode_json(7, &v)).transpose()?,
        answer: answer.map(|v| decode_json(8, &v)).transpose()?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    };
    Ok((session, row.get(5)?))
}
