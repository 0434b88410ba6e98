// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Gatehouse admission service.
//!
//! Domain types (sessions, chat settings, forms, audit actions), the shared
//! error type, and the traits the engine uses to reach Telegram and the clock.

pub mod action;
pub mod chat_config;
pub mod error;
pub mod form;
pub mod merge;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use action::{AuditAction, AuditEntry, QueuedAction};
pub use chat_config::{ChatConfig, NotificationMode, WelcomePage};
pub use error::GatehouseError;
pub use form::{FormContent, FormField, FormPage, TextRange};
pub use types::{
    Answer, AnswerValue, ChatAdministrator, ChatId, MessageId, Nonce, Session, SessionState,
    UserId, UserProfile, Verb,
};

pub use traits::{
    BotApi, Button, Clock, InitDataVerifier, MemberPermissions, OutgoingMessage, SystemClock,
    VerifiedInitData,
};
