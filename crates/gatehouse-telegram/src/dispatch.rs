// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long polling and update routing.
//!
//! Each update type is mapped onto one engine entry point:
//!
//! | update | engine |
//! |---|---|
//! | `chat_member` | [`membership::on_chat_member`] |
//! | `my_chat_member` | [`membership::on_bot_membership`] |
//! | `callback_query` | [`resolver::resolve`] |
//! | `/start <chat>` in private | [`lifecycle::handle_start`] |
//! | `/reload` in a group | [`membership::reload`] |
//! | join service message | [`membership::on_join_message`] |

use gatehouse_admission::{lifecycle, membership, resolver, AdmissionContext};
use gatehouse_core::{GatehouseError, MessageId, Verb};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, CallbackQuery, ChatMemberUpdated};
use teloxide::update_listeners::Polling;
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::convert::{chat_id, member_status, profile, user_id};

type HandlerResult = Result<(), GatehouseError>;

pub const ALREADY_HANDLED: &str = "This session no longer exists or was already handled.";
const NOT_ALLOWED: &str = "Only chat admins can do this.";
const FAILED: &str = "Something went wrong, please try again later.";

/// How a callback query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackReply {
    pub text: &'static str,
    pub alert: bool,
    /// Strip the controls from the clicked message.
    pub clear_controls: bool,
}

/// Maps a resolution result to the callback answer shown to the admin.
pub fn callback_reply(verb: Verb, error: Option<&GatehouseError>) -> CallbackReply {
    match error {
        None => CallbackReply {
            text: match verb {
                Verb::Accept => "Accepted",
                Verb::Reject => "Rejected",
                Verb::Ban => "Banned",
            },
            alert: false,
            clear_controls: false,
        },
        Some(e) if e.is_already_handled() => CallbackReply {
            text: ALREADY_HANDLED,
            alert: false,
            clear_controls: true,
        },
        Some(GatehouseError::PermissionDenied(_)) => CallbackReply {
            text: NOT_ALLOWED,
            alert: true,
            clear_controls: false,
        },
        Some(_) => CallbackReply {
            text: FAILED,
            alert: true,
            clear_controls: false,
        },
    }
}

/// Commands the bot answers. The `start` payload is the chat id from the
/// welcome deep link.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "start verification")]
    Start(String),
    #[command(description = "reload the chat admin list")]
    Reload,
}

fn record_update(kind: &'static str) {
    metrics::counter!("gatehouse_telegram_updates_total", "kind" => kind).increment(1);
}

async fn on_command(msg: Message, command: Command, ctx: AdmissionContext) -> HandlerResult {
    let chat = chat_id(msg.chat.id);
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    match command {
        Command::Start(payload) if msg.chat.is_private() => {
            record_update("start");
            let outcome = lifecycle::handle_start(&ctx, chat, &profile(from), payload.trim()).await?;
            debug!(chat = %chat, ?outcome, "start handled");
        }
        Command::Reload if msg.chat.is_group() || msg.chat.is_supergroup() => {
            record_update("reload");
            membership::reload(&ctx, chat, user_id(from.id)).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn on_join_message(msg: Message, ctx: AdmissionContext) -> HandlerResult {
    let Some(joined) = msg.new_chat_members() else {
        return Ok(());
    };
    record_update("join_message");
    if let Some(user) = joined.first() {
        let chat = chat_id(msg.chat.id);
        membership::on_join_message(&ctx, chat, &profile(user), MessageId(msg.id.0)).await?;
    }
    Ok(())
}

async fn on_callback_query(bot: Bot, query: CallbackQuery, ctx: AdmissionContext) -> HandlerResult {
    record_update("callback_query");
    let Some((verb, nonce)) = query.data.as_deref().and_then(Verb::parse_callback) else {
        bot.answer_callback_query(query.id.clone())
            .await
            .map_err(|e| GatehouseError::external(format!("answerCallbackQuery failed: {e}"), e))?;
        return Ok(());
    };

    let actor = user_id(query.from.id);
    let result = resolver::resolve(&ctx, None, &nonce, verb, actor).await;
    if let Err(e) = &result
        && !e.is_already_handled()
        && !matches!(e, GatehouseError::PermissionDenied(_))
    {
        error!(nonce = %nonce, actor = %actor, error = %e, "callback resolution failed");
    }

    let reply = callback_reply(verb, result.as_ref().err());
    if reply.clear_controls
        && let Some(message) = query.message.as_ref()
        && let Err(e) = ctx
            .bot
            .edit_buttons(chat_id(message.chat().id), MessageId(message.id().0), Vec::new())
            .await
    {
        debug!(error = %e, "failed to clear stale controls");
    }

    bot.answer_callback_query(query.id.clone())
        .text(reply.text)
        .show_alert(reply.alert)
        .await
        .map_err(|e| GatehouseError::external(format!("answerCallbackQuery failed: {e}"), e))?;
    Ok(())
}

async fn on_chat_member(update: ChatMemberUpdated, ctx: AdmissionContext) -> HandlerResult {
    record_update("chat_member");
    let chat = chat_id(update.chat.id);
    let transition = membership::on_chat_member(
        &ctx,
        chat,
        profile(&update.new_chat_member.user),
        member_status(&update.old_chat_member),
        member_status(&update.new_chat_member),
    )
    .await?;
    debug!(chat = %chat, ?transition, "member update applied");
    Ok(())
}

async fn on_my_chat_member(update: ChatMemberUpdated, ctx: AdmissionContext) -> HandlerResult {
    record_update("my_chat_member");
    membership::on_bot_membership(
        &ctx,
        chat_id(update.chat.id),
        update.chat.is_private(),
        member_status(&update.new_chat_member),
    )
    .await
}

/// Routing tree for every update type the service subscribes to.
pub fn schema() -> UpdateHandler<GatehouseError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
                .branch(dptree::endpoint(on_join_message)),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback_query))
        .branch(Update::filter_chat_member().endpoint(on_chat_member))
        .branch(Update::filter_my_chat_member().endpoint(on_my_chat_member))
}

/// Update types requested from Telegram. `chat_member` is opt-in.
pub fn allowed_updates() -> Vec<AllowedUpdate> {
    vec![
        AllowedUpdate::Message,
        AllowedUpdate::CallbackQuery,
        AllowedUpdate::ChatMember,
        AllowedUpdate::MyChatMember,
    ]
}

/// Long-polls Telegram and routes updates until `cancel` fires.
pub async fn run(bot: Bot, ctx: AdmissionContext, cancel: CancellationToken) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "failed to publish the command list");
    }
    let listener = Polling::builder(bot.clone())
        .allowed_updates(allowed_updates())
        .build();
    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![ctx])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "error while handling Telegram update",
        ))
        .build();
    let shutdown = dispatcher.shutdown_token();

    info!("starting Telegram long polling");
    tokio::select! {
        () = dispatcher.dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("error from the Telegram update listener"),
        ) => {}
        () = async {
            cancel.cancelled().await;
            if let Ok(done) = shutdown.shutdown() {
                done.await;
            }
        } => {}
    }
    info!("Telegram long polling stopped");
}
