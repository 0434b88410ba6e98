// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answer notifications.
//!
//! The chat's effective `notification_mode` decides the audience. Every
//! delivered copy carries accept / reject / ban controls keyed by the session
//! nonce, and is recorded in the notification ledger so that at most one copy
//! per target chat is live. Bot API failures are logged and counted. Only
//! an expiry forward that reached nobody is returned as an error.

use futures::future::join_all;
use gatehouse_core::{
    ChatId, GatehouseError, MessageId, NotificationMode, Nonce, OutgoingMessage, QueuedAction,
    Session,
};
use gatehouse_storage::queries::{chat_admin, chat_config, chat_info, notification_message, queue};
use tracing::{debug, info, warn};

use crate::context::AdmissionContext;
use crate::format;
use crate::metrics;

/// What a dispatch reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub mode: NotificationMode,
    pub delivered: Vec<(ChatId, MessageId)>,
    pub failed: Vec<ChatId>,
}

/// Sends the answer of `session` to the audience its chat is configured for.
pub async fn dispatch_answer(
    ctx: &AdmissionContext,
    session: &Session,
) -> Result<DispatchReport, GatehouseError> {
    let config = chat_config::effective(&ctx.db, session.chat, session.user_info.language()).await?;
    let title = chat_title(ctx, session.chat).await?;
    let text = format::answer_notification(session, &title);

    let targets = match config.notification_mode {
        NotificationMode::Private => chat_admin::notification_targets(&ctx.db, session.chat).await?,
        NotificationMode::External if config.notification_external_chat_id != 0 => {
            vec![ChatId(config.notification_external_chat_id)]
        }
        NotificationMode::External => {
            warn!(chat = %session.chat, "external notification mode without a target chat");
            Vec::new()
        }
        NotificationMode::Direct => vec![session.chat],
    };
    if targets.is_empty() {
        debug!(chat = %session.chat, mode = %config.notification_mode, "no notification targets");
    }

    let sends = targets.iter().map(|target| {
        let text = text.clone();
        async move { (*target, send_answer(ctx, *target, text, &session.nonce).await) }
    });
    let mut report = DispatchReport {
        mode: config.notification_mode,
        delivered: Vec::new(),
        failed: Vec::new(),
    };
    for (target, result) in join_all(sends).await {
        let mode = config.notification_mode.to_string();
        match result {
            Ok(message) => {
                metrics::record_notification(&mode, true);
                report.delivered.push((target, message));
            }
            Err(e) => {
                metrics::record_notification(&mode, false);
                warn!(chat = %session.chat, target = %target, error = %e, "answer notification failed");
                report.failed.push(target);
            }
        }
    }

    if config.notification_mode == NotificationMode::Direct
        && let Some((_, message)) = report.delivered.first()
    {
        let expiry = QueuedAction::NotificationExpired {
            chat_id: session.chat,
            nonce: session.nonce.clone(),
            target_user: session.user,
            message_id: *message,
        };
        queue::enqueue(
            &ctx.db,
            &expiry,
            config.notification_direct_timeout,
            ctx.now(),
            ctx.settings.queue_max_attempts,
        )
        .await?;
    }

    info!(
        chat = %session.chat,
        nonce = %session.nonce,
        mode = %report.mode,
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "answer dispatched"
    );
    Ok(report)
}

/// Moves an expired direct-mode notification out of the group.
///
/// Runs only if `message` is still the live notification for the session;
/// otherwise it was superseded or its session resolved, and nothing happens.
/// Copies go to every admin with notifications enabled. The ledger row and
/// the original are retired only after that, so a failed run can be
/// redelivered. When there are targets but no copy got through, the run
/// fails with a retryable error. Returns the number of copies delivered.
pub async fn forward_expired(
    ctx: &AdmissionContext,
    chat: ChatId,
    nonce: &Nonce,
    message: MessageId,
) -> Result<usize, GatehouseError> {
    if !notification_message::is_live(&ctx.db, nonce, chat, message).await? {
        debug!(chat = %chat, nonce = %nonce, "direct notification no longer live");
        return Ok(0);
    }
    let targets = chat_admin::notification_targets(&ctx.db, chat).await?;
    let copies = targets.iter().map(|target| async move {
        let result = ctx
            .bot
            .copy_message(*target, chat, message, format::resolution_controls(nonce))
            .await;
        (*target, result)
    });

    let mut delivered = 0;
    for (target, result) in join_all(copies).await {
        match result {
            Ok(copy) => {
                delivered += 1;
                metrics::record_notification("private", true);
                if let Some(previous) =
                    notification_message::replace(&ctx.db, nonce, target, copy, &ctx.stamp()).await?
                {
                    delete_quietly(ctx, target, previous).await;
                }
            }
            Err(e) => {
                metrics::record_notification("private", false);
                warn!(chat = %chat, target = %target, error = %e, "forwarding expired notification failed");
            }
        }
    }
    if delivered == 0 && !targets.is_empty() {
        return Err(GatehouseError::Internal(format!(
            "no copy of expired notification {message} reached any of {} admins",
            targets.len()
        )));
    }

    if notification_message::take(&ctx.db, nonce, chat, message).await? {
        delete_quietly(ctx, chat, message).await;
    }
    info!(chat = %chat, nonce = %nonce, delivered, "direct notification expired");
    Ok(delivered)
}

/// Sends one notification copy and retires the previous copy in that chat.
async fn send_answer(
    ctx: &AdmissionContext,
    target: ChatId,
    text: String,
    nonce: &Nonce,
) -> Result<MessageId, GatehouseError> {
    let message = OutgoingMessage::html(text).with_buttons(format::resolution_controls(nonce));
    let sent = ctx.bot.send_message(target, message).await?;
    if let Some(previous) =
        notification_message::replace(&ctx.db, nonce, target, sent, &ctx.stamp()).await?
    {
        delete_quietly(ctx, target, previous).await;
    }
    Ok(sent)
}

async fn chat_title(ctx: &AdmissionContext, chat: ChatId) -> Result<String, GatehouseError> {
    let info = chat_info::get(&ctx.db, chat).await?;
    Ok(info
        .as_ref()
        .and_then(chat_info::title)
        .map(str::to_string)
        .unwrap_or_else(|| chat.to_string()))
}

/// Deletes a message, logging instead of failing.
pub(crate) async fn delete_quietly(ctx: &AdmissionContext, chat: ChatId, message: MessageId) {
    if let Err(e) = ctx.bot.delete_message(chat, message).await {
        metrics::record_external_failure("delete_message");
        warn!(chat = %chat, message = %message, error = %e, "failed to delete message");
    }
}
