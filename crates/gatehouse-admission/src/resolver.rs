// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The admission resolver: accept, reject, ban and expire.
//!
//! Every entry point claims the session through
//! [`sessions::claim`](gatehouse_storage::queries::sessions::claim) first. Only
//! the winner of the claim touches Telegram, and it does so after the claim
//! has committed. Bot API failures from that point on are logged and reported
//! in [`Resolution::failed_actions`]; the claim is never rolled back.

use chrono::{DateTime, Duration, Utc};
use gatehouse_core::{
    ChatId, GatehouseError, MemberPermissions, Nonce, Session, UserId, Verb,
};
use gatehouse_storage::queries::sessions::{self, ClaimGuard};
use gatehouse_storage::ClaimedSession;
use tracing::{debug, info, warn};

use crate::context::AdmissionContext;
use crate::format;
use crate::metrics;

/// What happened to the member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    /// Timed ban for the chat's `ban_duration`.
    Rejected { until: DateTime<Utc> },
    /// Permanent ban.
    Banned,
    /// The challenge timed out; timed ban for the chat's `ban_duration`.
    Expired { until: DateTime<Utc> },
}

/// A session resolved by this caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub session: Session,
    pub outcome: Outcome,
    /// Bot API operations that failed after the claim.
    pub failed_actions: Vec<&'static str>,
}

/// Resolves a session on behalf of an admin.
///
/// `chat` may be omitted when only the nonce is known (callback controls).
/// Fails with `PermissionDenied` if `actor` is not an admin of the session's
/// chat, and with `NotFound` if the session was already resolved.
pub async fn resolve(
    ctx: &AdmissionContext,
    chat: Option<ChatId>,
    nonce: &Nonce,
    verb: Verb,
    actor: UserId,
) -> Result<Resolution, GatehouseError> {
    let label = verb.to_string();
    let claimed = match sessions::claim(&ctx.db, chat, nonce, ClaimGuard::Admin { actor }).await {
        Ok(claimed) => claimed,
        Err(e) => {
            metrics::record_resolution(&label, claim_failure(&e));
            debug!(nonce = %nonce, verb = %verb, actor = %actor, error = %e, "claim refused");
            return Err(e);
        }
    };
    metrics::record_resolution(&label, "claimed");

    let now = ctx.now();
    let outcome = match verb {
        Verb::Accept => Outcome::Accepted,
        Verb::Reject => Outcome::Rejected {
            until: ban_deadline(now, claimed.config.ban_duration),
        },
        Verb::Ban => Outcome::Banned,
    };
    let resolution = carry_out(ctx, claimed, outcome).await;
    info!(
        chat = %resolution.session.chat,
        user = %resolution.session.user,
        nonce = %nonce,
        verb = %verb,
        actor = %actor,
        failed = resolution.failed_actions.len(),
        "session resolved"
    );
    Ok(resolution)
}

/// Applies the challenge timeout.
///
/// Claims only a session that belongs to `user` and was never answered. When
/// nothing is claimed the timeout is a no-op and `Ok(None)` is returned.
pub async fn expire(
    ctx: &AdmissionContext,
    chat: ChatId,
    nonce: &Nonce,
    user: UserId,
) -> Result<Option<Resolution>, GatehouseError> {
    let claimed = match sessions::claim(&ctx.db, Some(chat), nonce, ClaimGuard::Timeout { user }).await
    {
        Ok(claimed) => claimed,
        Err(e) if e.is_already_handled() => {
            metrics::record_resolution("expire", "not_found");
            debug!(chat = %chat, nonce = %nonce, user = %user, "timeout found nothing to expire");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    metrics::record_resolution("expire", "claimed");

    let until = ban_deadline(ctx.now(), claimed.config.ban_duration);
    let resolution = carry_out(ctx, claimed, Outcome::Expired { until }).await;
    info!(chat = %chat, user = %user, nonce = %nonce, until = %until, "challenge expired");
    Ok(Some(resolution))
}

fn ban_deadline(now: DateTime<Utc>, ban_duration: u64) -> DateTime<Utc> {
    let secs = i64::try_from(ban_duration).unwrap_or(i64::MAX);
    Duration::try_seconds(secs)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn claim_failure(e: &GatehouseError) -> &'static str {
    match e {
        GatehouseError::NotFound(_) => "not_found",
        GatehouseError::PermissionDenied(_) => "denied",
        _ => "error",
    }
}

/// Performs the Telegram side of a claimed resolution.
async fn carry_out(ctx: &AdmissionContext, claimed: ClaimedSession, outcome: Outcome) -> Resolution {
    let ClaimedSession {
        session,
        notifications,
        ..
    } = claimed;
    let mut failed = Vec::new();

    let member = match outcome {
        Outcome::Accepted => ctx
            .bot
            .restrict_chat_member(session.chat, session.user, MemberPermissions::Full)
            .await
            .map_err(|e| ("restrict_chat_member", e)),
        Outcome::Rejected { until } | Outcome::Expired { until } => ctx
            .bot
            .ban_chat_member(session.chat, session.user, Some(until))
            .await
            .map_err(|e| ("ban_chat_member", e)),
        Outcome::Banned => ctx
            .bot
            .ban_chat_member(session.chat, session.user, None)
            .await
            .map_err(|e| ("ban_chat_member", e)),
    };
    if let Err((operation, e)) = member {
        metrics::record_external_failure(operation);
        warn!(chat = %session.chat, user = %session.user, operation, error = %e, "member action failed after claim");
        failed.push(operation);
    }

    if let Some(welcome) = session.welcome_message
        && let Err(e) = ctx.bot.delete_message(session.chat, welcome).await
    {
        metrics::record_external_failure("delete_message");
        warn!(chat = %session.chat, message = %welcome, error = %e, "failed to delete welcome message");
        failed.push("delete_message");
    }

    for (target, message) in notifications {
        if let Err(e) = ctx
            .bot
            .edit_buttons(target, message, format::resolved_controls(session.user))
            .await
        {
            metrics::record_external_failure("edit_buttons");
            warn!(chat = %target, message = %message, error = %e, "failed to retire notification controls");
            failed.push("edit_buttons");
        }
    }

    Resolution {
        session,
        outcome,
        failed_actions: failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ban_deadline_adds_duration() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ban_deadline(now, 300), Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap());
    }

    #[test]
    fn ban_deadline_saturates() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ban_deadline(now, u64::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn claim_failures_map_to_metric_labels() {
        assert_eq!(claim_failure(&GatehouseError::NotFound("x".into())), "not_found");
        assert_eq!(claim_failure(&GatehouseError::PermissionDenied("x".into())), "denied");
        assert_eq!(claim_failure(&GatehouseError::Internal("x".into())), "error");
    }
}
