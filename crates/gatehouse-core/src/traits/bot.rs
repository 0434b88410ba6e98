// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound bot API surface used by the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatehouseError;
use crate::types::{ChatAdministrator, ChatId, MessageId, UserId};

/// An inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Callback { text: String, data: String },
    Url { text: String, url: String },
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Button::Callback {
            text: text.into(),
            data: data.into(),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// A message to be sent by the bot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    /// Render `text` as Telegram HTML.
    pub parse_html: bool,
    /// Inline keyboard rows.
    pub buttons: Vec<Vec<Button>>,
    pub reply_to: Option<MessageId>,
    pub silent: bool,
    pub protect_content: bool,
}

impl OutgoingMessage {
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_html: true,
            ..Self::default()
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Vec<Button>>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn reply_to(mut self, message: Option<MessageId>) -> Self {
        self.reply_to = message;
        self
    }
}

/// Member permission presets applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberPermissions {
    /// Cannot send anything while the challenge is pending.
    Muted,
    /// Regular member rights restored after acceptance.
    Full,
}

/// Telegram operations the engine performs.
///
/// Implementations map transport errors to
/// [`GatehouseError::ExternalActionFailed`].
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(
        &self,
        chat: ChatId,
        message: OutgoingMessage,
    ) -> Result<MessageId, GatehouseError>;

    /// Copies `message` from `from` into `to`, attaching an inline keyboard.
    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    ) -> Result<MessageId, GatehouseError>;

    /// Deletes a message. A message that is already gone counts as success.
    async fn delete_message(&self, chat: ChatId, message: MessageId)
    -> Result<(), GatehouseError>;

    /// Replaces the inline keyboard of a sent message. Empty rows remove it.
    async fn edit_buttons(
        &self,
        chat: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    ) -> Result<(), GatehouseError>;

    /// Bans a member. `until = None` bans permanently.
    async fn ban_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), GatehouseError>;

    async fn restrict_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
        permissions: MemberPermissions,
    ) -> Result<(), GatehouseError>;

    async fn get_chat_administrators(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatAdministrator>, GatehouseError>;

    /// Raw chat object, cached verbatim for the mini-app.
    async fn get_chat(&self, chat: ChatId) -> Result<serde_json::Value, GatehouseError>;
}
