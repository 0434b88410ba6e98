// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types returned by the query modules.
//!
//! Session, audit, and config shapes live in `gatehouse-core`; this module
//! adds the storage-only views.

use gatehouse_core::{
    ChatConfig, ChatId, FormContent, GatehouseError, QueuedAction, Session, UserId,
};
use serde::Serialize;

/// A form template row as listed for admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormRecord {
    pub id: String,
    pub language: String,
    pub content: FormContent,
    pub enabled: bool,
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One administrator of a chat with their delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRecord {
    pub user: UserId,
    /// The admin's private chat with the bot, if they ever sent `/start`.
    pub private_chat: Option<ChatId>,
    pub receive_notification: bool,
}

/// A chat the caller administers, with its pending sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdministeredChat {
    pub chat: ChatId,
    /// Cached `getChat` result, if any.
    pub info: Option<serde_json::Value>,
    pub sessions: Vec<Session>,
}

/// A session removed by the claim primitive, with the configuration read in
/// the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedSession {
    pub session: Session,
    pub config: ChatConfig,
    /// Live answer notifications of the session as (target chat, message).
    pub notifications: Vec<(ChatId, gatehouse_core::MessageId)>,
}

/// Result of creating a session.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session: Session,
    /// Welcome message of a session for the same (chat, user) that was replaced.
    pub replaced_welcome: Option<gatehouse_core::MessageId>,
    pub queue_id: i64,
}

/// Queue entry lifecycle.
pub mod queue_status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

/// A leased delayed-queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub kind: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl QueueEntry {
    /// Decodes the payload.
    pub fn action(&self) -> Result<QueuedAction, GatehouseError> {
        serde_json::from_str(&self.payload).map_err(|e| {
            GatehouseError::Internal(format!("queue entry {} has a malformed payload: {e}", self.id))
        })
    }
}

/// Per-status queue counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Summary of a projection rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub entries: usize,
    pub chat_configs: i64,
    pub forms: i64,
    pub admin_notifications: i64,
}
