// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram HTML message bodies.

use gatehouse_core::{AnswerValue, Button, FormField, Nonce, Session, UserId, UserProfile, Verb};

/// Telegram's message length limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Mention link that opens the user's profile.
pub fn mention(user: &UserProfile) -> String {
    format!(
        r#"<a href="tg://user?id={}">{}</a>"#,
        user.id,
        escape_html(&user.display_name())
    )
}

pub fn user_link(user: UserId) -> String {
    format!("tg://user?id={user}")
}

/// Greeting posted in the group when a member joins.
pub fn welcome_text(user: &UserProfile) -> String {
    format!("Welcome {}! Please verify yourself to start chatting.", mention(user))
}

/// Accept / reject / ban controls for an answer notification.
pub fn resolution_controls(nonce: &Nonce) -> Vec<Vec<Button>> {
    vec![vec![
        Button::callback("Accept", Verb::Accept.callback_data(nonce)),
        Button::callback("Reject", Verb::Reject.callback_data(nonce)),
        Button::callback("Ban", Verb::Ban.callback_data(nonce)),
    ]]
}

/// The control row left behind once a session is resolved.
pub fn resolved_controls(user: UserId) -> Vec<Vec<Button>> {
    vec![vec![Button::url("View user", user_link(user))]]
}

/// Formats a submitted answer for admins.
///
/// One heading per text field in page order, the answer quoted below it, or
/// an italic marker for an empty answer. Cut to [`MAX_MESSAGE_CHARS`].
pub fn answer_notification(session: &Session, chat_title: &str) -> String {
    let mut lines = vec![format!(
        "User {} answered the questionnaire for <b>{}</b>",
        mention(&session.user_info),
        escape_html(chat_title)
    )];
    if let Some(form) = &session.form {
        for (page, field) in form.text_fields() {
            let FormField::Text { id, title, .. } = field else {
                continue;
            };
            lines.push(format!(
                "<b>{}:{}</b>",
                escape_html(&page.subtitle),
                escape_html(title)
            ));
            let answer = session
                .answer
                .as_ref()
                .and_then(|a| a.get(id))
                .map(AnswerValue::to_string)
                .unwrap_or_default();
            let answer = answer.trim();
            if answer.is_empty() {
                lines.push("<i>empty</i>".to_string());
            } else {
                lines.push(format!("<blockquote>{}</blockquote>", escape_html(answer)));
            }
        }
    }
    truncate_chars(lines.join("\n").trim(), MAX_MESSAGE_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
