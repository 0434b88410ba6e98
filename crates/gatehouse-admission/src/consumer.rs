// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delayed queue consumer.
//!
//! Deliveries are at-least-once, so both handlers are idempotent: a message
//! whose session (or notification) is already gone completes as a no-op.
//! Only retryable infrastructure errors are returned, which tells the worker
//! to redeliver.

use gatehouse_core::{GatehouseError, QueuedAction};
use tracing::{debug, warn};

use crate::context::AdmissionContext;
use crate::{notify, resolver};

/// Handles one delivered queue message.
pub async fn handle(ctx: &AdmissionContext, action: &QueuedAction) -> Result<(), GatehouseError> {
    let result = match action {
        QueuedAction::WelcomeTimeout {
            chat_id,
            nonce,
            target_user,
            ..
        } => resolver::expire(ctx, *chat_id, nonce, *target_user)
            .await
            .map(|resolved| {
                if resolved.is_none() {
                    debug!(chat = %chat_id, nonce = %nonce, "welcome timeout was a no-op");
                }
            }),
        QueuedAction::NotificationExpired {
            chat_id,
            nonce,
            message_id,
            ..
        } => notify::forward_expired(ctx, *chat_id, nonce, *message_id)
            .await
            .map(|_| ()),
    };

    match result {
        Err(e) if e.is_retryable() => Err(e),
        Err(e) => {
            warn!(kind = action.kind(), chat = %action.chat_id(), nonce = %action.nonce(), error = %e, "queue message dropped");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
