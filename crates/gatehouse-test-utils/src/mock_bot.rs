// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock bot API for deterministic testing.
//!
//! `MockBot` implements `BotApi`, records every call (including the ones it
//! was told to fail), and hands out increasing message ids.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{
    BotApi, Button, ChatAdministrator, ChatId, GatehouseError, MemberPermissions, MessageId,
    OutgoingMessage, UserId,
};
use serde_json::json;
use tokio::sync::Mutex;

/// One recorded bot API call.
#[derive(Debug, Clone, PartialEq)]
pub enum BotCall {
    SendMessage {
        chat: ChatId,
        message: OutgoingMessage,
        id: MessageId,
    },
    CopyMessage {
        to: ChatId,
        from: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
        id: MessageId,
    },
    DeleteMessage {
        chat: ChatId,
        message: MessageId,
    },
    EditButtons {
        chat: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    },
    BanChatMember {
        chat: ChatId,
        user: UserId,
        until: Option<DateTime<Utc>>,
    },
    RestrictChatMember {
        chat: ChatId,
        user: UserId,
        permissions: MemberPermissions,
    },
    GetChatAdministrators {
        chat: ChatId,
    },
    GetChat {
        chat: ChatId,
    },
}

/// A scripted bot.
pub struct MockBot {
    calls: Mutex<Vec<BotCall>>,
    next_message: AtomicI32,
    admins: Mutex<HashMap<ChatId, Vec<ChatAdministrator>>>,
    chats: Mutex<HashMap<ChatId, serde_json::Value>>,
    failing_operations: Mutex<HashSet<&'static str>>,
    failing_chats: Mutex<HashSet<ChatId>>,
}

impl MockBot {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message: AtomicI32::new(1000),
            admins: Mutex::new(HashMap::new()),
            chats: Mutex::new(HashMap::new()),
            failing_operations: Mutex::new(HashSet::new()),
            failing_chats: Mutex::new(HashSet::new()),
        }
    }

    /// Sets what `get_chat_administrators` returns for `chat`.
    pub async fn set_admins(&self, chat: ChatId, admins: Vec<ChatAdministrator>) {
        self.admins.lock().await.insert(chat, admins);
    }

    /// Sets what `get_chat` returns for `chat`. Unknown chats return `{"id": chat}`.
    pub async fn set_chat(&self, chat: ChatId, info: serde_json::Value) {
        self.chats.lock().await.insert(chat, info);
    }

    /// Makes every call of `operation` (e.g. `"ban_chat_member"`) fail.
    pub async fn fail_operation(&self, operation: &'static str) {
        self.failing_operations.lock().await.insert(operation);
    }

    /// Makes every call targeting `chat` fail.
    pub async fn fail_chat(&self, chat: ChatId) {
        self.failing_chats.lock().await.insert(chat);
    }

    /// Clears injected failures.
    pub async fn heal(&self) {
        self.failing_operations.lock().await.clear();
        self.failing_chats.lock().await.clear();
    }

    pub async fn calls(&self) -> Vec<BotCall> {
        self.calls.lock().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Messages sent, as (chat, message, assigned id).
    pub async fn sent_messages(&self) -> Vec<(ChatId, OutgoingMessage, MessageId)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                BotCall::SendMessage { chat, message, id } => Some((*chat, message.clone(), *id)),
                _ => None,
            })
            .collect()
    }

    pub async fn bans(&self) -> Vec<(ChatId, UserId, Option<DateTime<Utc>>)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                BotCall::BanChatMember { chat, user, until } => Some((*chat, *user, *until)),
                _ => None,
            })
            .collect()
    }

    pub async fn restrictions(&self) -> Vec<(ChatId, UserId, MemberPermissions)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                BotCall::RestrictChatMember {
                    chat,
                    user,
                    permissions,
                } => Some((*chat, *user, *permissions)),
                _ => None,
            })
            .collect()
    }

    pub async fn deleted(&self) -> Vec<(ChatId, MessageId)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                BotCall::DeleteMessage { chat, message } => Some((*chat, *message)),
                _ => None,
            })
            .collect()
    }

    pub async fn edits(&self) -> Vec<(ChatId, MessageId, Vec<Vec<Button>>)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                BotCall::EditButtons {
                    chat,
                    message,
                    buttons,
                } => Some((*chat, *message, buttons.clone())),
                _ => None,
            })
            .collect()
    }

    /// Copies made, as (to, from, source message, assigned id).
    pub async fn copies(&self) -> Vec<(ChatId, ChatId, MessageId, MessageId)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                BotCall::CopyMessage {
                    to, from, message, id, ..
                } => Some((*to, *from, *message, *id)),
                _ => None,
            })
            .collect()
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.next_message.fetch_add(1, Ordering::SeqCst))
    }

    async fn record(
        &self,
        operation: &'static str,
        chat: ChatId,
        call: BotCall,
    ) -> Result<(), GatehouseError> {
        self.calls.lock().await.push(call);
        let fails = self.failing_operations.lock().await.contains(operation)
            || self.failing_chats.lock().await.contains(&chat);
        if fails {
            return Err(GatehouseError::external(
                format!("{operation} failed"),
                std::io::Error::other("injected failure"),
            ));
        }
        Ok(())
    }
}

impl Default for MockBot {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BotApi for MockBot {
    async fn send_message(
        &self,
        chat: ChatId,
        message: OutgoingMessage,
    ) -> Result<MessageId, GatehouseError> {
        let id = self.next_id();
        self.record("send_message", chat, BotCall::SendMessage { chat, message, id })
            .await?;
        Ok(id)
    }

    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    ) -> Result<MessageId, GatehouseError> {
        let id = self.next_id();
        self.record(
            "copy_message",
            to,
            BotCall::CopyMessage {
                to,
                from,
                message,
                buttons,
                id,
            },
        )
        .await?;
        Ok(id)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), GatehouseError> {
        self.record("delete_message", chat, BotCall::DeleteMessage { chat, message })
            .await
    }

    async fn edit_buttons(
        &self,
        chat: ChatId,
        message: MessageId,
        buttons: Vec<Vec<Button>>,
    ) -> Result<(), GatehouseError> {
        self.record(
            "edit_buttons",
            chat,
            BotCall::EditButtons {
                chat,
                message,
                buttons,
            },
        )
        .await
    }

    async fn ban_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), GatehouseError> {
        self.record("ban_chat_member", chat, BotCall::BanChatMember { chat, user, until })
            .await
    }

    async fn restrict_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
        permissions: MemberPermissions,
    ) -> Result<(), GatehouseError> {
        self.record(
            "restrict_chat_member",
            chat,
            BotCall::RestrictChatMember {
                chat,
                user,
                permissions,
            },
        )
        .await
    }

    async fn get_chat_administrators(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatAdministrator>, GatehouseError> {
        self.record("get_chat_administrators", chat, BotCall::GetChatAdministrators { chat })
            .await?;
        Ok(self.admins.lock().await.get(&chat).cloned().unwrap_or_default())
    }

    async fn get_chat(&self, chat: ChatId) -> Result<serde_json::Value, GatehouseError> {
        self.record("get_chat", chat, BotCall::GetChat { chat }).await?;
        Ok(self
            .chats
            .lock()
            .await
            .get(&chat)
            .cloned()
            .unwrap_or_else(|| json!({"id": chat.0})))
    }
}
