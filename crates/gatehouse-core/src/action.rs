// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit actions (the only writable surface for settings and forms) and
//! delayed queue messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat_config::validate_patch;
use crate::error::GatehouseError;
use crate::form::FormContent;
use crate::types::{is_token, ChatId, MessageId, Nonce, UserId};

/// A state-changing admin action, as stored in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
    ChatConfigUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        value: Value,
    },
    ChatConfigReset {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    DropLanguage {
        language: String,
    },
    FormEnable {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    FormUpdate {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        content: FormContent,
    },
    FormDelete {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    FormRecover {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    FormDeleteForever {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// Turns answer notifications on or off for one admin (the actor by default).
    ChatAdminToggleNotification {
        value: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<UserId>,
    },
    /// System fact: the bot left the chat. Never accepted from an admin.
    ChatDeparted,
}

impl AuditAction {
    /// The `type` tag as stored.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditAction::ChatConfigUpdate { .. } => "chat_config_update",
            AuditAction::ChatConfigReset { .. } => "chat_config_reset",
            AuditAction::DropLanguage { .. } => "drop_language",
            AuditAction::FormEnable { .. } => "form_enable",
            AuditAction::FormUpdate { .. } => "form_update",
            AuditAction::FormDelete { .. } => "form_delete",
            AuditAction::FormRecover { .. } => "form_recover",
            AuditAction::FormDeleteForever { .. } => "form_delete_forever",
            AuditAction::ChatAdminToggleNotification { .. } => "chat_admin_toggle_notification",
            AuditAction::ChatDeparted => "chat_departed",
        }
    }

    /// Language the action applies to (empty = default language).
    pub fn language(&self) -> &str {
        match self {
            AuditAction::DropLanguage { language } => language,
            AuditAction::ChatConfigUpdate { language, .. }
            | AuditAction::ChatConfigReset { language }
            | AuditAction::FormEnable { language, .. }
            | AuditAction::FormUpdate { language, .. }
            | AuditAction::FormDelete { language, .. }
            | AuditAction::FormRecover { language, .. }
            | AuditAction::FormDeleteForever { language, .. } => language.as_deref().unwrap_or(""),
            AuditAction::ChatAdminToggleNotification { .. } | AuditAction::ChatDeparted => "",
        }
    }

    /// Form id targeted by form actions.
    pub fn form_id(&self) -> Option<&str> {
        match self {
            AuditAction::FormEnable { id, .. }
            | AuditAction::FormUpdate { id, .. }
            | AuditAction::FormDelete { id, .. }
            | AuditAction::FormRecover { id, .. }
            | AuditAction::FormDeleteForever { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Facts recorded by the service itself rather than by an admin.
    pub fn is_system(&self) -> bool {
        matches!(self, AuditAction::ChatDeparted)
    }

    /// Payload checks that need no storage access.
    pub fn validate(&self) -> Result<(), GatehouseError> {
        if let Some(id) = self.form_id()
            && !is_token(id)
        {
            return Err(GatehouseError::ValidationFailed(format!(
                "form id `{id}` is malformed"
            )));
        }
        match self {
            AuditAction::ChatConfigUpdate { value, .. } => validate_patch(value),
            AuditAction::DropLanguage { language } if language.trim().is_empty() => Err(
                GatehouseError::ValidationFailed("the default language cannot be dropped".into()),
            ),
            AuditAction::FormUpdate { content, .. } => content.validate(),
            _ => Ok(()),
        }
    }
}

/// An immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: i64,
    pub chat: ChatId,
    pub id: String,
    pub user: UserId,
    pub action: AuditAction,
    pub created_at: String,
}

/// A message submitted to the delayed queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QueuedAction {
    /// Fires `challenge_timeout` seconds after a join.
    WelcomeTimeout {
        chat_id: ChatId,
        nonce: Nonce,
        target_user: UserId,
        #[serde(default)]
        welcome_message: Option<MessageId>,
    },
    /// Fires `notification_direct_timeout` seconds after a direct-mode notification.
    NotificationExpired {
        chat_id: ChatId,
        nonce: Nonce,
        target_user: UserId,
        message_id: MessageId,
    },
}

impl QueuedAction {
    pub fn kind(&self) -> &'static str {
        match self {
            QueuedAction::WelcomeTimeout { .. } => "welcome-timeout",
            QueuedAction::NotificationExpired { .. } => "notification-expired",
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            QueuedAction::WelcomeTimeout { chat_id, .. }
            | QueuedAction::NotificationExpired { chat_id, .. } => *chat_id,
        }
    }

    pub fn nonce(&self) -> &Nonce {
        match self {
            QueuedAction::WelcomeTimeout { nonce, .. }
            | QueuedAction::NotificationExpired { nonce, .. } => nonce,
        }
    }
}
