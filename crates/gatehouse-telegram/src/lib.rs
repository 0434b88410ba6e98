// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for the Gatehouse admission engine.
//!
//! [`TelegramBot`] implements [`BotApi`] on top of teloxide, and
//! [`dispatch::run`] long-polls for updates and routes them into
//! `gatehouse_admission`.

pub mod convert;
pub mod dispatch;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_config::model::TelegramConfig;
use gatehouse_core::{
    BotApi, Button, ChatAdministrator, ChatId, GatehouseError, MemberPermissions, MessageId,
    OutgoingMessage, UserId,
};
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, ParseMode, ReplyParameters};
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::convert::{keyboard, tg_chat, tg_message, tg_user};

/// Bot API client backed by teloxide.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    /// Creates a client from the service configuration.
    ///
    /// Requires `telegram.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, GatehouseError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            GatehouseError::Config("telegram.bot_token is required to talk to Telegram".into())
        })?;

        if token.trim().is_empty() {
            return Err(GatehouseError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Resolves the bot's own user id and username via `getMe`.
    pub async fn identity(&self) -> Result<(UserId, String), GatehouseError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| failed("getMe", e))?;
        Ok((
            convert::user_id(me.user.id),
            me.user.username.clone().unwrap_or_default(),
        ))
    }
}

fn failed(method: &'static str, e: RequestError) -> GatehouseError {
    metrics::counter!("gatehouse_telegram_api_errors_total", "method" => method).increment(1);
    GatehouseError::external(format!("{method} failed: {e}"), e)
}

#[async_trait]
impl BotApi for TelegramBot {
    async fn send_message(
        &self,
        chat: ChatId,
        message: OutgoingMessage,
    ) -> Result<MessageId, GatehouseError> {
        let mut request = self.bot.send_message(tg_chat(chat), message.text);
        if message.parse_html {
            request = request.parse_mode(ParseMode::Html);
        }
        if !message.buttons.is_empty() {
            request = request.reply_markup(keyboard(&message.buttons)?);
        }
        if let Some(reply) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(tg_message(reply)));
        }
        if message.silent {
            request = request.disable_notification(true);
        }
        if message.protect_content {
            request = request.protect_content(true);
        }
        let sent = request.await.map_err(|e| failed("sendMessage", e))?;
        Ok(MessageId(sent.id.0))
    }

    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    ) -> Result<MessageId, GatehouseError> {
        let mut request = self
            .bot
            .copy_message(tg_chat(to), tg_chat(from), tg_message(message));
        if !buttons.is_empty() {
            request = request.reply_markup(keyboard(&buttons)?);
        }
        let copied = request.await.map_err(|e| failed("copyMessage", e))?;
        Ok(MessageId(copied.0))
    }

    async fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), GatehouseError> {
        match self
            .bot
            .delete_message(tg_chat(chat), tg_message(message))
            .await
        {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageToDeleteNotFound)) => {
                debug!(chat = %chat, message = %message, "message already deleted");
                Ok(())
            }
            Err(e) => Err(failed("deleteMessage", e)),
        }
    }

    async fn edit_buttons(
        &self,
        chat: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    ) -> Result<(), GatehouseError> {
        let request = self
            .bot
            .edit_message_reply_markup(tg_chat(chat), tg_message(message))
            .reply_markup(keyboard(&buttons)?);
        match request.await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(failed("editMessageReplyMarkup", e)),
        }
    }

    async fn ban_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), GatehouseError> {
        let mut request = self.bot.ban_chat_member(tg_chat(chat), tg_user(user)?);
        if let Some(until) = until {
            request = request.until_date(until);
        }
        request.await.map_err(|e| failed("banChatMember", e))?;
        Ok(())
    }

    async fn restrict_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
        permissions: MemberPermissions,
    ) -> Result<(), GatehouseError> {
        let permissions = match permissions {
            MemberPermissions::Muted => ChatPermissions::empty(),
            MemberPermissions::Full => ChatPermissions::all(),
        };
        self.bot
            .restrict_chat_member(tg_chat(chat), tg_user(user)?, permissions)
            .await
            .map_err(|e| failed("restrictChatMember", e))?;
        Ok(())
    }

    async fn get_chat_administrators(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatAdministrator>, GatehouseError> {
        let members = self
            .bot
            .get_chat_administrators(tg_chat(chat))
            .await
            .map_err(|e| failed("getChatAdministrators", e))?;
        Ok(members.iter().map(convert::administrator).collect())
    }

    async fn get_chat(&self, chat: ChatId) -> Result<serde_json::Value, GatehouseError> {
        let info = self
            .bot
            .get_chat(tg_chat(chat))
            .await
            .map_err(|e| failed("getChat", e))?;
        serde_json::to_value(&info)
            .map_err(|e| GatehouseError::Internal(format!("failed to encode chat info: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(String::from),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        let result = TelegramBot::new(&config_with_token(None));
        let err = result.err().unwrap().to_string();
        assert!(err.contains("bot_token is required"), "{err}");
    }

    #[test]
    fn new_rejects_blank_token() {
        let result = TelegramBot::new(&config_with_token(Some("  ")));
        let err = result.err().unwrap().to_string();
        assert!(err.contains("cannot be empty"), "{err}");
    }

    #[test]
    fn new_accepts_token() {
        assert!(TelegramBot::new(&config_with_token(Some("123:ABC"))).is_ok());
    }
}
