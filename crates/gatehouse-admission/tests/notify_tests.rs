// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answer notifications in every delivery mode.

use gatehouse_admission::{lifecycle, resolver};
use gatehouse_core::{
    Answer, AuditAction, Button, ChatId, Nonce, Session, UserId, Verb,
};
use gatehouse_storage::queries::{notification_message, private_chat, queue};
use gatehouse_test_utils::{profile, TestHarness};
use serde_json::json;
use tracing_test::traced_test;

const CHAT: ChatId = ChatId(100);
const MEMBER: UserId = UserId(7);
const ADMIN: UserId = UserId(10);
const MUTED_ADMIN: UserId = UserId(11);
const ADMIN_DM: ChatId = ChatId(10_010);
const MUTED_ADMIN_DM: ChatId = ChatId(10_011);
const EXTERNAL: ChatId = ChatId(-500);

async fn setup(config: serde_json::Value) -> (TestHarness, Session) {
    let h = TestHarness::new().await.unwrap();
    h.seed_admins(CHAT, &[ADMIN, MUTED_ADMIN]).await.unwrap();
    let stamp = h.ctx.stamp();
    private_chat::record(&h.db, ADMIN, ADMIN_DM, &stamp).await.unwrap();
    private_chat::record(&h.db, MUTED_ADMIN, MUTED_ADMIN_DM, &stamp).await.unwrap();
    h.append(
        CHAT,
        MUTED_ADMIN,
        AuditAction::ChatAdminToggleNotification { value: false, user: None },
    )
    .await
    .unwrap();
    h.append(CHAT, ADMIN, AuditAction::ChatConfigUpdate { language: None, value: config })
        .await
        .unwrap();
    let session = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann"))
        .await
        .unwrap()
        .unwrap();
    h.bot.clear_calls().await;
    (h, session)
}

fn controls_of(buttons: &[Vec<Button>]) -> Vec<String> {
    buttons
        .iter()
        .flatten()
        .filter_map(|b| match b {
            Button::Callback { data, .. } => Some(data.clone()),
            Button::Url { .. } => None,
        })
        .collect()
}

async fn submit(h: &TestHarness, nonce: &Nonce) {
    lifecycle::submit_answer(&h.ctx, MEMBER, nonce, Answer::new()).await.unwrap();
}

#[tokio::test]
async fn private_mode_reaches_admins_with_notifications_enabled() {
    let (h, session) = setup(json!({"notification_mode": "private"})).await;
    submit(&h, &session.nonce).await;

    let sent = h.bot.sent_messages().await;
    assert_eq!(sent.len(), 1);
    let (target, message, _) = &sent[0];
    assert_eq!(*target, ADMIN_DM);
    assert!(message.parse_html);
    assert!(message.text.contains("Chat 100"));
    let nonce = session.nonce.as_str();
    assert_eq!(
        controls_of(&message.buttons),
        vec![format!("accept:{nonce}"), format!("reject:{nonce}"), format!("ban:{nonce}")]
    );
}

#[tokio::test]
async fn resubmission_replaces_the_live_notification() {
    let (h, session) = setup(json!({})).await;
    submit(&h, &session.nonce).await;
    let first = h.bot.sent_messages().await[0].2;

    submit(&h, &session.nonce).await;
    let second = h.bot.sent_messages().await[1].2;
    assert!(h.bot.deleted().await.contains(&(ADMIN_DM, first)));
    assert_eq!(
        notification_message::list(&h.db, &session.nonce).await.unwrap(),
        vec![(ADMIN_DM, second)]
    );

    resolver::resolve(&h.ctx, Some(CHAT), &session.nonce, Verb::Accept, ADMIN)
        .await
        .unwrap();
    let edits = h.bot.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!((edits[0].0, edits[0].1), (ADMIN_DM, second));
    assert_eq!(
        edits[0].2,
        vec![vec![Button::url("View user", "tg://user?id=7")]]
    );
    assert!(notification_message::list(&h.db, &session.nonce).await.unwrap().is_empty());
}

#[tokio::test]
async fn external_mode_sends_one_copy() {
    let (h, session) = setup(json!({
        "notification_mode": "external",
        "notification_external_chat_id": EXTERNAL.0
    }))
    .await;
    submit(&h, &session.nonce).await;
    let targets: Vec<ChatId> = h.bot.sent_messages().await.iter().map(|(c, _, _)| *c).collect();
    assert_eq!(targets, vec![EXTERNAL]);
}

#[tokio::test]
#[traced_test]
async fn failed_delivery_is_logged_and_submission_succeeds() {
    let (h, session) = setup(json!({
        "notification_mode": "external",
        "notification_external_chat_id": EXTERNAL.0
    }))
    .await;
    h.bot.fail_chat(EXTERNAL).await;

    let stored = lifecycle::submit_answer(&h.ctx, MEMBER, &session.nonce, Answer::new())
        .await
        .unwrap();
    assert!(stored.answer.is_some());
    assert!(logs_contain("answer notification failed"));
    assert!(notification_message::list(&h.db, &session.nonce).await.unwrap().is_empty());
}

#[tokio::test]
async fn direct_mode_expires_into_private_copies() {
    let (h, session) = setup(json!({
        "notification_mode": "direct",
        "notification_direct_timeout": 60
    }))
    .await;
    submit(&h, &session.nonce).await;
    let sent = h.bot.sent_messages().await;
    assert_eq!(sent.len(), 1);
    let (target, _, original) = sent[0];
    assert_eq!(target, CHAT);

    assert_eq!(h.advance_and_drain(60).await.unwrap(), 1);
    let copies = h.bot.copies().await;
    assert_eq!(copies.len(), 1);
    let (to, from, source, copy) = copies[0];
    assert_eq!((to, from, source), (ADMIN_DM, CHAT, original));
    assert!(h.bot.deleted().await.contains(&(CHAT, original)));
    assert_eq!(
        notification_message::list(&h.db, &session.nonce).await.unwrap(),
        vec![(ADMIN_DM, copy)]
    );

    // The resolver retires the forwarded copy's controls.
    resolver::resolve(&h.ctx, Some(CHAT), &session.nonce, Verb::Reject, ADMIN)
        .await
        .unwrap();
    assert_eq!(h.bot.edits().await[0].1, copy);
}

#[tokio::test]
async fn direct_notification_resolved_before_expiry_is_left_alone() {
    let (h, session) = setup(json!({
        "notification_mode": "direct",
        "notification_direct_timeout": 60
    }))
    .await;
    submit(&h, &session.nonce).await;
    resolver::resolve(&h.ctx, Some(CHAT), &session.nonce, Verb::Accept, ADMIN)
        .await
        .unwrap();
    let deleted = h.bot.deleted().await.len();

    assert_eq!(h.advance_and_drain(60).await.unwrap(), 1);
    assert!(h.bot.copies().await.is_empty());
    assert_eq!(h.bot.deleted().await.len(), deleted);
    assert_eq!(queue::stats(&h.db).await.unwrap().failed, 0);
}

#[tokio::test]
#[traced_test]
async fn expiry_forward_that_reached_nobody_is_redelivered() {
    let (h, session) = setup(json!({
        "notification_mode": "direct",
        "notification_direct_timeout": 60
    }))
    .await;
    submit(&h, &session.nonce).await;
    let (_, _, original) = h.bot.sent_messages().await[0];

    h.bot.fail_operation("copy_message").await;
    assert_eq!(h.advance_and_drain(60).await.unwrap(), 1);
    assert!(logs_contain("queue delivery failed, will retry"));
    assert!(!h.bot.deleted().await.contains(&(CHAT, original)));
    assert_eq!(
        notification_message::list(&h.db, &session.nonce).await.unwrap(),
        vec![(CHAT, original)]
    );

    h.bot.heal().await;
    assert_eq!(h.advance_and_drain(10).await.unwrap(), 1);
    let copies = h.bot.copies().await;
    assert_eq!(copies.len(), 2);
    let (to, from, source, copy) = copies[1];
    assert_eq!((to, from, source), (ADMIN_DM, CHAT, original));
    assert!(h.bot.deleted().await.contains(&(CHAT, original)));
    assert_eq!(
        notification_message::list(&h.db, &session.nonce).await.unwrap(),
        vec![(ADMIN_DM, copy)]
    );
    assert_eq!(queue::stats(&h.db).await.unwrap().failed, 0);
}
