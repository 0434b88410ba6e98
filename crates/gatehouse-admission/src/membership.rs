// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership sync: the admin list, member transitions and the bot's own
//! membership.

use gatehouse_core::{
    AuditAction, ChatId, GatehouseError, MessageId, OutgoingMessage, Session, UserId, UserProfile,
};
use gatehouse_storage::queries::{audit, chat_admin, chat_config, private_chat};
use tracing::{debug, info, warn};

use crate::context::AdmissionContext;
use crate::lifecycle;
use crate::notify::delete_quietly;

/// A chat member's status as Telegram reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator {
        can_restrict_members: bool,
        can_delete_messages: bool,
        can_manage_chat: bool,
    },
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    fn is_admin(&self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator { .. })
    }
}

/// What a member update changed.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberTransition {
    Ignored,
    /// The admin list was rebuilt and includes the user.
    AdminAdded,
    /// The admin list was rebuilt without the user.
    AdminRemoved,
    SessionCreated(Session),
    SessionDiscarded(Session),
}

pub(crate) const RIGHTS_WARNING: &str =
    "Insufficient rights: I need permission to delete messages, restrict members and manage the chat.";

/// Rebuilds the admin list of `chat` from Telegram, wholesale.
///
/// The cached chat info is refreshed in the same transaction when `getChat`
/// succeeds. Returns the qualifying admins.
pub async fn rebuild_admins(ctx: &AdmissionContext, chat: ChatId) -> Result<Vec<UserId>, GatehouseError> {
    let admins: Vec<UserId> = ctx
        .bot
        .get_chat_administrators(chat)
        .await?
        .into_iter()
        .filter(|admin| admin.qualifies())
        .map(|admin| admin.user)
        .collect();
    let info = match ctx.bot.get_chat(chat).await {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(chat = %chat, error = %e, "failed to refresh chat info");
            None
        }
    };
    chat_admin::replace_all(&ctx.db, chat, &admins, info, &ctx.stamp()).await?;
    info!(chat = %chat, admins = admins.len(), "admin list rebuilt");
    Ok(admins)
}

/// Handles `/reload` in a group. Replies only when `caller` is an admin.
pub async fn reload(ctx: &AdmissionContext, chat: ChatId, caller: UserId) -> Result<bool, GatehouseError> {
    let admins = rebuild_admins(ctx, chat).await?;
    if !admins.contains(&caller) {
        return Ok(false);
    }
    if let Err(e) = ctx.bot.send_message(chat, OutgoingMessage::plain("reloaded")).await {
        warn!(chat = %chat, error = %e, "failed to confirm reload");
    }
    Ok(true)
}

/// Applies a chat-member update for a user other than the bot.
pub async fn on_chat_member(
    ctx: &AdmissionContext,
    chat: ChatId,
    user: UserProfile,
    old: MemberStatus,
    new: MemberStatus,
) -> Result<MemberTransition, GatehouseError> {
    if user.is_bot {
        return Ok(MemberTransition::Ignored);
    }
    match (old, new) {
        _ if old.is_admin() || new.is_admin() => {
            let admins = rebuild_admins(ctx, chat).await?;
            let transition = if admins.contains(&user.id) {
                MemberTransition::AdminAdded
            } else {
                MemberTransition::AdminRemoved
            };
            debug!(chat = %chat, user = %user.id, ?transition, "admin role changed");
            Ok(transition)
        }
        (MemberStatus::Left, MemberStatus::Member) => {
            Ok(match lifecycle::admit_new_member(ctx, chat, user).await? {
                Some(session) => MemberTransition::SessionCreated(session),
                None => MemberTransition::Ignored,
            })
        }
        (_, MemberStatus::Left | MemberStatus::Kicked) => {
            Ok(match lifecycle::member_left(ctx, chat, user.id).await? {
                Some(session) => MemberTransition::SessionDiscarded(session),
                None => MemberTransition::Ignored,
            })
        }
        _ => Ok(MemberTransition::Ignored),
    }
}

/// Applies an update to the bot's own membership.
///
/// In a group: warns about missing rights, records a departure fact when the
/// bot leaves, and otherwise rebuilds the admin list. In a private chat a
/// block forgets the chat.
pub async fn on_bot_membership(
    ctx: &AdmissionContext,
    chat: ChatId,
    private: bool,
    new: MemberStatus,
) -> Result<(), GatehouseError> {
    if private {
        if new == MemberStatus::Kicked {
            let removed = private_chat::remove_chat(&ctx.db, chat).await?;
            info!(chat = %chat, removed, "bot blocked in private chat");
        }
        return Ok(());
    }

    match new {
        MemberStatus::Administrator {
            can_restrict_members,
            can_delete_messages,
            can_manage_chat,
        } if !(can_restrict_members && can_delete_messages && can_manage_chat) => {
            if let Err(e) = ctx.bot.send_message(chat, OutgoingMessage::plain(RIGHTS_WARNING)).await {
                warn!(chat = %chat, error = %e, "failed to send rights warning");
            }
        }
        MemberStatus::Left | MemberStatus::Kicked => {
            audit::append_system(
                &ctx.db,
                chat,
                ctx.settings.bot_user,
                AuditAction::ChatDeparted,
                &ctx.stamp(),
            )
            .await?;
            info!(chat = %chat, "bot left chat");
            return Ok(());
        }
        _ => {}
    }
    rebuild_admins(ctx, chat).await?;
    Ok(())
}

/// Deletes the "X joined" service message when the chat asks for it.
pub async fn on_join_message(
    ctx: &AdmissionContext,
    chat: ChatId,
    user: &UserProfile,
    message: MessageId,
) -> Result<bool, GatehouseError> {
    let config = chat_config::effective(&ctx.db, chat, user.language()).await?;
    if !config.delete_new_chat_member_message {
        return Ok(false);
    }
    delete_quietly(ctx, chat, message).await;
    Ok(true)
}
