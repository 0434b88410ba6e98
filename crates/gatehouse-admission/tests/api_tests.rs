// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The collaborator-facing API: authentication and authorization.

use chrono::Duration;
use gatehouse_admission::lifecycle;
use gatehouse_core::{
    AuditAction, ChatId, Clock, FormContent, GatehouseError, UserId, Verb,
};
use gatehouse_storage::queries::{chat_config, forms};
use gatehouse_test_utils::{profile, TestHarness};
use serde_json::json;

const CHAT: ChatId = ChatId(100);
const ADMIN: UserId = UserId(10);
const MEMBER: UserId = UserId(7);
const STRANGER: UserId = UserId(99);

async fn harness() -> TestHarness {
    let h = TestHarness::new().await.unwrap();
    h.seed_admins(CHAT, &[ADMIN]).await.unwrap();
    h
}

fn form() -> FormContent {
    serde_json::from_value(json!({
        "tag": "intro",
        "description": "",
        "pages": [{"id": "pageaaaaaaaaaaaaaaaaa", "subtitle": "About", "fields": [
            {"id": "whyaaaaaaaaaaaaaaaaaa", "type": "text", "title": "Why join?"}
        ]}]
    }))
    .unwrap()
}

#[tokio::test]
async fn authenticate_checks_signature_and_freshness() {
    let h = harness().await;
    let now = h.clock.now();
    h.verifier.insert("fresh", profile(MEMBER.0, "Ann"), now - Duration::seconds(60));
    h.verifier.insert("stale", profile(MEMBER.0, "Ann"), now - Duration::days(2));

    let caller = h.api.authenticate("fresh").unwrap();
    assert_eq!(caller.user.id, MEMBER);
    assert!(matches!(h.api.authenticate("stale"), Err(GatehouseError::Unauthenticated(_))));
    assert!(matches!(h.api.authenticate("forged"), Err(GatehouseError::Unauthenticated(_))));
}

#[tokio::test]
async fn non_admin_append_is_rejected_without_projection_rows() {
    let h = harness().await;
    let stranger = h.caller(profile(STRANGER.0, "Eve"));
    for action in [
        AuditAction::ChatConfigUpdate { language: None, value: json!({"ban_duration": 600}) },
        AuditAction::FormUpdate {
            id: "formAaaaaaaaaaaaaaaaa".into(),
            language: None,
            content: form(),
        },
    ] {
        let err = h.api.append_audit(&stranger, CHAT, action).await.unwrap_err();
        assert!(matches!(err, GatehouseError::PermissionDenied(_)));
    }
    assert!(chat_config::layers(&h.db, CHAT).await.unwrap().is_empty());
    assert!(forms::list(&h.db, CHAT, None).await.unwrap().is_empty());

    let admin = h.caller(profile(ADMIN.0, "Root"));
    let err = h.api.audit_history(&stranger, CHAT, 10).await.unwrap_err();
    assert!(matches!(err, GatehouseError::PermissionDenied(_)));
    assert!(h.api.audit_history(&admin, CHAT, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_edits_flow_into_config_and_forms() {
    let h = harness().await;
    let admin = h.caller(profile(ADMIN.0, "Root"));
    h.api
        .append_audit(&admin, CHAT, AuditAction::ChatConfigUpdate { language: None, value: json!({"ban_duration": 600}) })
        .await
        .unwrap();
    h.api
        .append_audit(
            &admin,
            CHAT,
            AuditAction::ChatConfigUpdate { language: Some("de".into()), value: json!({"challenge_timeout": 120}) },
        )
        .await
        .unwrap();
    h.api
        .append_audit(
            &admin,
            CHAT,
            AuditAction::FormUpdate { id: "formAaaaaaaaaaaaaaaaa".into(), language: None, content: form() },
        )
        .await
        .unwrap();

    let config = h.api.get_effective_config(&admin, CHAT, Some("de-AT")).await.unwrap();
    assert_eq!((config.ban_duration, config.challenge_timeout), (600, 120));
    let config = h.api.get_effective_config(&admin, CHAT, None).await.unwrap();
    assert_eq!(config.challenge_timeout, 300);

    let listed = h.api.list_forms(&admin, CHAT, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].enabled);
    assert_eq!(h.api.audit_history(&admin, CHAT, 2).await.unwrap()[0].action.kind(), "form_update");
    assert_eq!(h.api.list_chat_admins(&admin, CHAT).await.unwrap()[0].user, ADMIN);
}

#[tokio::test]
async fn member_flow_through_the_api() {
    let h = harness().await;
    let admin = h.caller(profile(ADMIN.0, "Root"));
    h.api
        .append_audit(
            &admin,
            CHAT,
            AuditAction::FormUpdate { id: "formAaaaaaaaaaaaaaaaa".into(), language: None, content: form() },
        )
        .await
        .unwrap();
    let session = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann")).await.unwrap().unwrap();
    assert!(session.form.is_some());

    let member = h.caller(profile(MEMBER.0, "Ann"));
    let view = h.api.get_chat_info(&member, CHAT).await.unwrap();
    assert!(!view.is_admin);
    assert_eq!(view.session.as_ref().map(|s| &s.nonce), Some(&session.nonce));
    let stranger = h.caller(profile(STRANGER.0, "Eve"));
    assert!(matches!(
        h.api.get_chat_info(&stranger, CHAT).await,
        Err(GatehouseError::PermissionDenied(_))
    ));

    let bad = serde_json::from_value(json!({})).unwrap();
    let err = h.api.submit_answer(&member, &session.nonce, bad).await.unwrap_err();
    assert!(matches!(err, GatehouseError::ValidationFailed(_)));
    let good = serde_json::from_value(json!({"whyaaaaaaaaaaaaaaaaaa": "I like Rust"})).unwrap();
    let err = h.api.submit_answer(&stranger, &session.nonce, good).await.unwrap_err();
    assert!(matches!(err, GatehouseError::PermissionDenied(_)));
    let good = serde_json::from_value(json!({"whyaaaaaaaaaaaaaaaaaa": "I like Rust"})).unwrap();
    h.api.submit_answer(&member, &session.nonce, good).await.unwrap();

    let chats = h.api.list_administered_chats(&admin).await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].sessions.len(), 1);
    assert!(chats[0].sessions[0].answer.is_some());

    let err = h.api.resolve(&member, CHAT, &session.nonce, Verb::Accept).await.unwrap_err();
    assert!(matches!(err, GatehouseError::PermissionDenied(_)));
    h.api.resolve(&admin, CHAT, &session.nonce, Verb::Accept).await.unwrap();
    let err = h.api.resolve(&admin, CHAT, &session.nonce, Verb::Accept).await.unwrap_err();
    assert!(err.is_already_handled());
}
