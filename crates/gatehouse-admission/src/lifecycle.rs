// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle: join, deep-link start, reload, submit, leave.
//!
//! Resolution lives in [`crate::resolver`]; this module covers everything
//! that happens while a session is still pending.

use gatehouse_core::{
    Answer, Button, ChatId, GatehouseError, MemberPermissions, Nonce, OutgoingMessage, Session,
    UserId, UserProfile,
};
use gatehouse_storage::queries::sessions::{self, NewSession};
use gatehouse_storage::queries::{chat_admin, chat_config, chat_info, private_chat};
use tracing::{debug, info, warn};

use crate::context::AdmissionContext;
use crate::format;
use crate::metrics;
use crate::notify::{self, delete_quietly};

/// What a private `/start` led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Only the private chat was recorded.
    Registered,
    /// The user has a pending session in the chat and got the challenge link.
    Challenge { chat: ChatId },
    /// The user administers the chat and got the management hint.
    AdminHint { chat: ChatId },
}

/// Starts a challenge for a user who just became a regular member of `chat`.
///
/// Returns `None` for bots and for chats whose effective `enabled` is false.
/// A failed restrict or welcome message is logged; the session and its
/// timeout are persisted regardless.
pub async fn admit_new_member(
    ctx: &AdmissionContext,
    chat: ChatId,
    profile: UserProfile,
) -> Result<Option<Session>, GatehouseError> {
    if profile.is_bot {
        return Ok(None);
    }
    let config = chat_config::effective(&ctx.db, chat, profile.language()).await?;
    if !config.enabled {
        debug!(chat = %chat, user = %profile.id, "admission disabled for chat");
        return Ok(None);
    }

    if let Err(e) = ctx
        .bot
        .restrict_chat_member(chat, profile.id, MemberPermissions::Muted)
        .await
    {
        metrics::record_external_failure("restrict_chat_member");
        warn!(chat = %chat, user = %profile.id, error = %e, "failed to restrict new member");
    }

    let created = sessions::create(
        &ctx.db,
        NewSession {
            chat,
            user_info: profile,
            nonce: Nonce::generate(),
            challenge_timeout: config.challenge_timeout,
            queue_max_attempts: ctx.settings.queue_max_attempts,
        },
        ctx.now(),
    )
    .await?;
    if let Some(previous) = created.replaced_welcome {
        delete_quietly(ctx, chat, previous).await;
    }

    let mut session = created.session;
    let welcome = OutgoingMessage {
        silent: true,
        protect_content: true,
        ..OutgoingMessage::html(format::welcome_text(&session.user_info))
    }
    .with_buttons(vec![vec![Button::url("Verify", verify_url(ctx, chat))]]);
    match ctx.bot.send_message(chat, welcome).await {
        Ok(message) => {
            if sessions::set_welcome_message(&ctx.db, chat, &session.nonce, message, &ctx.stamp())
                .await?
            {
                session.welcome_message = Some(message);
            } else {
                // Resolved while the welcome was in flight.
                delete_quietly(ctx, chat, message).await;
            }
        }
        Err(e) => {
            metrics::record_external_failure("send_message");
            warn!(chat = %chat, user = %session.user, error = %e, "failed to send welcome message");
        }
    }

    metrics::record_session_created();
    info!(
        chat = %chat,
        user = %session.user,
        nonce = %session.nonce,
        form = session.form.is_some(),
        timeout = config.challenge_timeout,
        "session created"
    );
    Ok(Some(session))
}

/// Handles `/start [payload]` in the user's private chat with the bot.
///
/// Always records the private chat. A numeric payload names the group the
/// user is joining: a pending member gets the mini-app link (and the group
/// welcome message goes away), an admin of that group gets a hint instead.
pub async fn handle_start(
    ctx: &AdmissionContext,
    private: ChatId,
    user: &UserProfile,
    payload: &str,
) -> Result<StartOutcome, GatehouseError> {
    let stamp = ctx.stamp();
    private_chat::record(&ctx.db, user.id, private, &stamp).await?;
    let Ok(chat) = payload.trim().parse::<i64>().map(ChatId) else {
        return Ok(StartOutcome::Registered);
    };

    let private_info = match ctx.bot.get_chat(private).await {
        Ok(info) => info,
        Err(e) => {
            warn!(chat = %private, error = %e, "failed to fetch private chat, keeping public profile");
            serde_json::to_value(user)
                .map_err(|e| GatehouseError::Internal(format!("profile encoding: {e}")))?
        }
    };

    if let Some(welcome) =
        sessions::set_user_chat_info(&ctx.db, chat, user.id, &private_info, &stamp).await?
    {
        if let Some(message) = welcome {
            delete_quietly(ctx, chat, message).await;
        }
        let title = chat_info::get(&ctx.db, chat)
            .await?
            .as_ref()
            .and_then(chat_info::title)
            .map(format::escape_html)
            .unwrap_or_else(|| chat.to_string());
        let link = format!("{}?startapp={chat}", ctx.settings.challenge_url);
        let reply = OutgoingMessage::html(format!("Joining <b>{title}</b>"))
            .with_buttons(vec![vec![Button::url("Verify", link)]]);
        send_reply(ctx, private, reply).await;
        debug!(chat = %chat, user = %user.id, "challenge link sent");
        return Ok(StartOutcome::Challenge { chat });
    }

    if chat_admin::is_admin(&ctx.db, chat, user.id).await? {
        let hint = OutgoingMessage::plain(
            "Use the menu button to manage join requests (send /menu if it is missing).",
        );
        send_reply(ctx, private, hint).await;
        return Ok(StartOutcome::AdminHint { chat });
    }
    Ok(StartOutcome::Registered)
}

/// Refreshes the form snapshot of an unanswered session owned by `user`.
pub async fn reload_form(
    ctx: &AdmissionContext,
    user: UserId,
    nonce: &Nonce,
) -> Result<Session, GatehouseError> {
    sessions::reload_form(&ctx.db, user, nonce, &ctx.stamp()).await
}

/// Stores an answer and notifies admins.
///
/// Notification problems are logged and never fail the submission.
pub async fn submit_answer(
    ctx: &AdmissionContext,
    user: UserId,
    nonce: &Nonce,
    answer: Answer,
) -> Result<Session, GatehouseError> {
    let session = sessions::submit_answer(&ctx.db, user, nonce, answer, &ctx.stamp()).await?;
    info!(chat = %session.chat, user = %user, nonce = %nonce, "answer submitted");
    if let Err(e) = notify::dispatch_answer(ctx, &session).await {
        warn!(chat = %session.chat, nonce = %nonce, error = %e, "answer dispatch failed");
    }
    Ok(session)
}

/// Discards the pending session of a member who left and removes its welcome.
pub async fn member_left(
    ctx: &AdmissionContext,
    chat: ChatId,
    user: UserId,
) -> Result<Option<Session>, GatehouseError> {
    let removed = sessions::discard(&ctx.db, chat, user).await?;
    if let Some(session) = &removed {
        if let Some(message) = session.welcome_message {
            delete_quietly(ctx, chat, message).await;
        }
        info!(chat = %chat, user = %user, nonce = %session.nonce, "session discarded");
    }
    Ok(removed)
}

fn verify_url(ctx: &AdmissionContext, chat: ChatId) -> String {
    format!("https://t.me/{}?start={chat}", ctx.settings.bot_username)
}

async fn send_reply(ctx: &AdmissionContext, chat: ChatId, message: OutgoingMessage) {
    if let Err(e) = ctx.bot.send_message(chat, message).await {
        metrics::record_external_failure("send_message");
        warn!(chat = %chat, error = %e, "failed to reply");
    }
}
