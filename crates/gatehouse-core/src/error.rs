// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Gatehouse admission service.

use thiserror::Error;

/// The primary error type used across all Gatehouse crates.
///
/// The first five variants form the caller-facing taxonomy. The remaining
/// variants are infrastructure failures that callers treat as retryable.
#[derive(Debug, Error)]
pub enum GatehouseError {
    /// Actor is not an admin of the chat, or not the owner of the session.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Session, form, or chat is absent. Includes "already resolved by someone else".
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed config, form, or answer payload. Rejected before any write.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A bot-API call failed after the local state change was committed.
    #[error("external action failed: {message}")]
    ExternalActionFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Identity verification failed at the boundary.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Service configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatehouseError {
    /// Wraps a bot-API failure.
    pub fn external<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        GatehouseError::ExternalActionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when the error means another caller already resolved the target.
    ///
    /// User-facing layers render this as "already handled" rather than a failure.
    pub fn is_already_handled(&self) -> bool {
        matches!(self, GatehouseError::NotFound(_))
    }

    /// True for infrastructure failures a queue consumer should surface for redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatehouseError::Storage { .. } | GatehouseError::Internal(_)
        )
    }
}
