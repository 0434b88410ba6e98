// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat settings, their defaults, and patch validation.
//!
//! Stored rows hold sparse JSON patches. The effective configuration is the
//! defaults with every applicable row merge-patched on top.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::GatehouseError;
use crate::merge::{merge_patch, select_language};

/// Who is told that a user answered, and how.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    /// Every admin with notifications enabled, in their private chat with the bot.
    Private,
    /// One copy to a configured external chat.
    External,
    /// A reply in the origin chat that expires into private notifications.
    Direct,
}

/// Text shown on the mini-app welcome page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomePage {
    pub title: String,
    pub content: String,
}

/// Fully-populated chat configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub enabled: bool,
    pub welcome_page: WelcomePage,
    /// Seconds a new member has before the timeout ban.
    pub challenge_timeout: u64,
    /// Seconds a rejected or timed-out member stays banned.
    pub ban_duration: u64,
    pub notification_mode: NotificationMode,
    pub notification_external_chat_id: i64,
    /// Seconds a direct-mode notification stays in the origin chat.
    pub notification_direct_timeout: u64,
    #[serde(default)]
    pub delete_new_chat_member_message: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            welcome_page: WelcomePage {
                title: "Welcome".to_string(),
                content: "Welcome to {chat_title}. Tap the button below to complete verification."
                    .to_string(),
            },
            challenge_timeout: 5 * 60,
            ban_duration: 5 * 60,
            notification_mode: NotificationMode::Private,
            notification_external_chat_id: 0,
            notification_direct_timeout: 5 * 60,
            delete_new_chat_member_message: false,
        }
    }
}

impl ChatConfig {
    /// Folds stored patches over the defaults, in order.
    pub fn effective<'a, I>(layers: I) -> Result<ChatConfig, GatehouseError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut value = serde_json::to_value(ChatConfig::default())
            .map_err(|e| GatehouseError::Internal(format!("default config: {e}")))?;
        for layer in layers {
            merge_patch(&mut value, layer);
        }
        serde_json::from_value(value)
            .map_err(|e| GatehouseError::Internal(format!("stored chat config is malformed: {e}")))
    }

    /// Effective configuration for a user speaking `language`.
    ///
    /// `layers` holds every stored `(language, patch)` row of one chat. The
    /// default-language row applies first, then the best-matching language row.
    pub fn for_language(
        layers: &[(String, Value)],
        language: &str,
    ) -> Result<ChatConfig, GatehouseError> {
        let chosen = select_language(layers.iter().map(|(lang, _)| lang.as_str()), language);
        let base = layers.iter().find(|(lang, _)| lang.is_empty()).map(|(_, v)| v);
        let specific = layers
            .iter()
            .find(|(lang, _)| !chosen.is_empty() && lang == chosen)
            .map(|(_, v)| v);
        ChatConfig::effective(base.into_iter().chain(specific))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct WelcomePagePatch {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct ChatConfigPatch {
    enabled: Option<bool>,
    welcome_page: Option<WelcomePagePatch>,
    challenge_timeout: Option<u64>,
    ban_duration: Option<u64>,
    notification_mode: Option<NotificationMode>,
    notification_external_chat_id: Option<i64>,
    notification_direct_timeout: Option<u64>,
    delete_new_chat_member_message: Option<bool>,
}

/// Upper bound for `challenge_timeout` and `notification_direct_timeout` (366 days).
pub const MAX_TIMEOUT_SECS: u64 = 366 * 24 * 60 * 60;

/// Checks that `value` is a well-formed partial [`ChatConfig`].
///
/// `null` members are allowed and clear the field back to its default.
pub fn validate_patch(value: &Value) -> Result<(), GatehouseError> {
    if !value.is_object() {
        return Err(GatehouseError::ValidationFailed(
            "config value must be a JSON object".into(),
        ));
    }
    let patch: ChatConfigPatch = serde_json::from_value(value.clone())
        .map_err(|e| GatehouseError::ValidationFailed(format!("config: {e}")))?;

    if let Some(page) = &patch.welcome_page {
        if page.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(GatehouseError::ValidationFailed(
                "welcome_page.title must not be empty".into(),
            ));
        }
        if page.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(GatehouseError::ValidationFailed(
                "welcome_page.content must not be empty".into(),
            ));
        }
    }
    check_timeout("challenge_timeout", patch.challenge_timeout)?;
    check_timeout("notification_direct_timeout", patch.notification_direct_timeout)?;
    Ok(())
}

fn check_timeout(field: &str, value: Option<u64>) -> Result<(), GatehouseError> {
    match value {
        Some(0) => Err(GatehouseError::ValidationFailed(format!(
            "{field} must be positive"
        ))),
        Some(secs) if secs > MAX_TIMEOUT_SECS => Err(GatehouseError::ValidationFailed(format!(
            "{field} must be at most {MAX_TIMEOUT_SECS} seconds"
        ))),
        _ => Ok(()),
    }
}
