// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Gatehouse engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::form::FormContent;

/// Telegram chat identifier (groups are negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Telegram user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Telegram message identifier, scoped to a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alphabet shared by nonces and form ids (URL-safe, 64 symbols).
const TOKEN_ALPHABET: &[u8] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Length of nonces and form ids.
pub const TOKEN_LEN: usize = 21;

/// Generates a fresh random token from the OS RNG.
pub fn generate_token() -> String {
    let mut rng = OsRng;
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Returns true if `s` has the shape of a generated token.
pub fn is_token(s: &str) -> bool {
    s.len() == TOKEN_LEN && s.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
}

/// Single-use token identifying one session across the mini-app, callbacks and the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub String);

impl Nonce {
    /// Generates a fresh nonce.
    pub fn generate() -> Self {
        Nonce(generate_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frozen snapshot of a joining user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl UserProfile {
    /// Language tag used for config and form selection (empty = default language).
    pub fn language(&self) -> &str {
        self.language_code.as_deref().unwrap_or("")
    }

    /// First and last name joined for display.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// A single answer value: free text or a confirmation checkbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Flag(bool),
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Text(s) => f.write_str(s),
            AnswerValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// Submitted answers keyed by field id.
pub type Answer = BTreeMap<String, AnswerValue>;

/// Observable state of a session row.
///
/// A resolved session has no row, so there is no `Resolved` variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Pending,
    Answered,
}

/// One in-flight challenge, keyed by (chat, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub chat: ChatId,
    pub user: UserId,
    pub user_info: UserProfile,
    pub user_chat_info: Option<serde_json::Value>,
    pub nonce: Nonce,
    pub welcome_message: Option<MessageId>,
    pub form: Option<FormContent>,
    pub answer: Option<Answer>,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    pub fn state(&self) -> SessionState {
        if self.answer.is_some() {
            SessionState::Answered
        } else {
            SessionState::Pending
        }
    }
}

/// A chat administrator as reported by the bot API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAdministrator {
    pub user: UserId,
    pub is_owner: bool,
    pub can_restrict_members: bool,
    pub is_bot: bool,
}

impl ChatAdministrator {
    /// Creator or an admin allowed to restrict members.
    pub fn qualifies(&self) -> bool {
        !self.is_bot && (self.is_owner || self.can_restrict_members)
    }
}

/// Admin resolution verbs carried by inline controls and the API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Accept,
    Reject,
    Ban,
}

impl Verb {
    /// Callback payload for an inline control: `verb:nonce`.
    pub fn callback_data(&self, nonce: &Nonce) -> String {
        format!("{self}:{nonce}")
    }

    /// Parses a `verb:nonce` callback payload.
    pub fn parse_callback(data: &str) -> Option<(Verb, Nonce)> {
        let (verb, nonce) = data.split_once(':')?;
        let verb = verb.parse().ok()?;
        if nonce.is_empty() {
            return None;
        }
        Some((verb, Nonce(nonce.to_string())))
    }
}

/// Formats a timestamp the way every table stores it.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = Nonce::generate();
        let b = Nonce::generate();
        assert!(is_token(a.as_str()));
        assert!(is_token(b.as_str()));
        assert_ne!(a, b);
    }

    #[test]
    fn is_token_rejects_wrong_length_and_alphabet() {
        assert!(!is_token("short"));
        assert!(!is_token("aaaaaaaaaaaaaaaaaaaa!"));
        assert!(is_token("aaaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn callback_payload_parses_back() {
        let nonce = Nonce("abc".into());
        let data = Verb::Reject.callback_data(&nonce);
        assert_eq!(data, "reject:abc");
        assert_eq!(Verb::parse_callback(&data), Some((Verb::Reject, nonce)));
    }

    #[test]
    fn callback_payload_rejects_unknown_verbs() {
        assert_eq!(Verb::parse_callback("kick:abc"), None);
        assert_eq!(Verb::parse_callback("accept:"), None);
        assert_eq!(Verb::parse_callback("accept"), None);
    }

    #[test]
    fn answer_values_deserialize_untagged() {
        let answer: Answer = serde_json::from_str(r#"{"a":"hello","b":true}"#).unwrap();
        assert_eq!(answer["a"], AnswerValue::Text("hello".into()));
        assert_eq!(answer["b"], AnswerValue::Flag(true));
    }

    #[test]
    fn session_state_follows_answer() {
        let mut session = Session {
            chat: ChatId(-100),
            user: UserId(7),
            user_info: UserProfile {
                id: UserId(7),
                first_name: "Ann".into(),
                last_name: None,
                username: None,
                language_code: None,
                is_bot: false,
            },
            user_chat_info: None,
            nonce: Nonce("n1".into()),
            welcome_message: None,
            form: None,
            answer: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(session.state(), SessionState::Pending);
        session.answer = Some(Answer::new());
        assert_eq!(session.state(), SessionState::Answered);
    }

    #[test]
    fn owner_and_restrictors_qualify_as_admins() {
        let mut admin = ChatAdministrator {
            user: UserId(1),
            is_owner: false,
            can_restrict_members: false,
            is_bot: false,
        };
        assert!(!admin.qualifies());
        admin.can_restrict_members = true;
        assert!(admin.qualifies());
        admin.is_bot = true;
        assert!(!admin.qualifies());
    }
}
