// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The surface exposed to the mini-app and the admin UI.
//!
//! Every call starts from raw init data: [`AdmissionApi::authenticate`]
//! verifies it and checks freshness, and the resulting [`Caller`] is the only
//! identity the operations trust.

use std::sync::Arc;

use chrono::Duration;
use gatehouse_core::{
    Answer, AuditAction, AuditEntry, ChatConfig, ChatId, GatehouseError, InitDataVerifier, Nonce,
    Session, UserProfile, Verb,
};
use gatehouse_storage::queries::{audit, chat_admin, chat_config, chat_info, forms, sessions};
use gatehouse_storage::{AdminRecord, AdministeredChat, FormRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::AdmissionContext;
use crate::lifecycle;
use crate::resolver::{self, Resolution};

/// Upper bound for audit history pages.
pub const MAX_AUDIT_PAGE: u32 = 200;

/// A verified, fresh identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: UserProfile,
    /// `start_param` from the launch link.
    pub start_param: Option<String>,
}

/// What the challenge page or the admin UI shows for one chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatView {
    pub chat: ChatId,
    pub info: Option<serde_json::Value>,
    pub config: ChatConfig,
    pub is_admin: bool,
    /// The caller's own pending session, if any.
    pub session: Option<Session>,
}

/// Facade over the engine for collaborator-facing calls.
#[derive(Clone)]
pub struct AdmissionApi {
    ctx: AdmissionContext,
    verifier: Arc<dyn InitDataVerifier>,
}

impl AdmissionApi {
    pub fn new(ctx: AdmissionContext, verifier: Arc<dyn InitDataVerifier>) -> Self {
        Self { ctx, verifier }
    }

    pub fn context(&self) -> &AdmissionContext {
        &self.ctx
    }

    /// Verifies signed init data and rejects payloads older than
    /// `max_init_data_age_secs`.
    pub fn authenticate(&self, init_data: &str) -> Result<Caller, GatehouseError> {
        let verified = self.verifier.verify(init_data)?;
        let max_age = i64::try_from(self.ctx.settings.max_init_data_age_secs).unwrap_or(i64::MAX);
        let age = self.ctx.now().signed_duration_since(verified.auth_date);
        if Duration::try_seconds(max_age).is_some_and(|limit| age > limit) {
            return Err(GatehouseError::Unauthenticated(format!(
                "init data is {}s old",
                age.num_seconds()
            )));
        }
        Ok(Caller {
            user: verified.user,
            start_param: verified.start_param,
        })
    }

    /// Chats the caller administers, with their pending sessions.
    pub async fn list_administered_chats(
        &self,
        caller: &Caller,
    ) -> Result<Vec<AdministeredChat>, GatehouseError> {
        chat_admin::administered_chats(&self.ctx.db, caller.user.id).await
    }

    /// Chat details for an admin, or for a user with a pending session there.
    pub async fn get_chat_info(&self, caller: &Caller, chat: ChatId) -> Result<ChatView, GatehouseError> {
        let is_admin = chat_admin::is_admin(&self.ctx.db, chat, caller.user.id).await?;
        let session = sessions::get(&self.ctx.db, chat, caller.user.id).await?;
        if !is_admin && session.is_none() {
            return Err(GatehouseError::PermissionDenied(format!(
                "user {} has no business in chat {chat}",
                caller.user.id
            )));
        }
        Ok(ChatView {
            chat,
            info: chat_info::get(&self.ctx.db, chat).await?,
            config: chat_config::effective(&self.ctx.db, chat, caller.user.language()).await?,
            is_admin,
            session,
        })
    }

    /// Effective configuration, for `language` or else the caller's own.
    pub async fn get_effective_config(
        &self,
        caller: &Caller,
        chat: ChatId,
        language: Option<&str>,
    ) -> Result<ChatConfig, GatehouseError> {
        let language = language.unwrap_or_else(|| caller.user.language());
        chat_config::effective(&self.ctx.db, chat, language).await
    }

    /// Form templates of a chat. Admins only.
    pub async fn list_forms(
        &self,
        caller: &Caller,
        chat: ChatId,
        language: Option<&str>,
    ) -> Result<Vec<FormRecord>, GatehouseError> {
        self.require_admin(caller, chat).await?;
        forms::list(&self.ctx.db, chat, language).await
    }

    /// Admins of a chat with their notification settings. Admins only.
    pub async fn list_chat_admins(
        &self,
        caller: &Caller,
        chat: ChatId,
    ) -> Result<Vec<AdminRecord>, GatehouseError> {
        self.require_admin(caller, chat).await?;
        chat_admin::list(&self.ctx.db, chat).await
    }

    /// Recent audit entries of a chat, newest first. Admins only.
    pub async fn audit_history(
        &self,
        caller: &Caller,
        chat: ChatId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, GatehouseError> {
        self.require_admin(caller, chat).await?;
        audit::list_for_chat(&self.ctx.db, chat, limit.clamp(1, MAX_AUDIT_PAGE)).await
    }

    pub async fn reload_form(&self, caller: &Caller, nonce: &Nonce) -> Result<Session, GatehouseError> {
        lifecycle::reload_form(&self.ctx, caller.user.id, nonce).await
    }

    pub async fn submit_answer(
        &self,
        caller: &Caller,
        nonce: &Nonce,
        answer: Answer,
    ) -> Result<Session, GatehouseError> {
        lifecycle::submit_answer(&self.ctx, caller.user.id, nonce, answer).await
    }

    pub async fn resolve(
        &self,
        caller: &Caller,
        chat: ChatId,
        nonce: &Nonce,
        verb: Verb,
    ) -> Result<Resolution, GatehouseError> {
        resolver::resolve(&self.ctx, Some(chat), nonce, verb, caller.user.id).await
    }

    /// Appends an admin action. The admin check happens inside the append.
    pub async fn append_audit(
        &self,
        caller: &Caller,
        chat: ChatId,
        action: AuditAction,
    ) -> Result<AuditEntry, GatehouseError> {
        let entry = audit::append(&self.ctx.db, chat, caller.user.id, action, &self.ctx.stamp()).await?;
        info!(chat = %chat, user = %caller.user.id, action = entry.action.kind(), seq = entry.seq, "admin action recorded");
        Ok(entry)
    }

    async fn require_admin(&self, caller: &Caller, chat: ChatId) -> Result<(), GatehouseError> {
        if chat_admin::is_admin(&self.ctx.db, chat, caller.user.id).await? {
            return Ok(());
        }
        debug!(chat = %chat, user = %caller.user.id, "non-admin refused");
        Err(GatehouseError::PermissionDenied(format!(
            "user {} is not an admin of chat {chat}",
            caller.user.id
        )))
    }
}
