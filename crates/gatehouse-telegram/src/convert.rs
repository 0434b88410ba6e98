// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between teloxide types and engine types.

use gatehouse_admission::membership::MemberStatus;
use gatehouse_core::{Button, ChatAdministrator, ChatId, GatehouseError, MessageId, UserId, UserProfile};
use reqwest::Url;
use teloxide::types::{
    ChatMember, ChatMemberStatus, InlineKeyboardButton, InlineKeyboardMarkup, User,
};

pub fn tg_chat(chat: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat.0)
}

pub fn tg_message(message: MessageId) -> teloxide::types::MessageId {
    teloxide::types::MessageId(message.0)
}

/// Telegram user ids are unsigned on the wire.
pub fn tg_user(user: UserId) -> Result<teloxide::types::UserId, GatehouseError> {
    u64::try_from(user.0)
        .map(teloxide::types::UserId)
        .map_err(|_| GatehouseError::ValidationFailed(format!("invalid user id {user}")))
}

pub fn user_id(user: teloxide::types::UserId) -> UserId {
    UserId(user.0 as i64)
}

pub fn chat_id(chat: teloxide::types::ChatId) -> ChatId {
    ChatId(chat.0)
}

/// Snapshot of a Telegram user.
pub fn profile(user: &User) -> UserProfile {
    UserProfile {
        id: user_id(user.id),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        language_code: user.language_code.clone(),
        is_bot: user.is_bot,
    }
}

pub fn member_status(member: &ChatMember) -> MemberStatus {
    match member.kind.status() {
        ChatMemberStatus::Owner => MemberStatus::Creator,
        ChatMemberStatus::Administrator => MemberStatus::Administrator {
            can_restrict_members: member.kind.can_restrict_members(),
            can_delete_messages: member.kind.can_delete_messages(),
            can_manage_chat: member.kind.can_manage_chat(),
        },
        ChatMemberStatus::Member => MemberStatus::Member,
        ChatMemberStatus::Restricted => MemberStatus::Restricted,
        ChatMemberStatus::Left => MemberStatus::Left,
        ChatMemberStatus::Banned => MemberStatus::Kicked,
    }
}

pub fn administrator(member: &ChatMember) -> ChatAdministrator {
    ChatAdministrator {
        user: user_id(member.user.id),
        is_owner: member.kind.status() == ChatMemberStatus::Owner,
        can_restrict_members: member.kind.can_restrict_members(),
        is_bot: member.user.is_bot,
    }
}

/// Builds an inline keyboard. Empty rows produce an empty keyboard.
pub fn keyboard(rows: &[Vec<Button>]) -> Result<InlineKeyboardMarkup, GatehouseError> {
    let mut markup = Vec::with_capacity(rows.len());
    for row in rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            buttons.push(match button {
                Button::Callback { text, data } => InlineKeyboardButton::callback(text, data),
                Button::Url { text, url } => {
                    let url = Url::parse(url).map_err(|e| {
                        GatehouseError::Internal(format!("invalid button url `{url}`: {e}"))
                    })?;
                    InlineKeyboardButton::url(text, url)
                }
            });
        }
        markup.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(markup))
}
