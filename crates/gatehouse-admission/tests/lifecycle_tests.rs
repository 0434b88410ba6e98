// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Joins, the deep-link start, leaves, and membership sync.

use gatehouse_admission::lifecycle::{self, StartOutcome};
use gatehouse_admission::membership::{self, MemberStatus, MemberTransition};
use gatehouse_core::{
    AuditAction, Button, ChatAdministrator, ChatId, GatehouseError, MemberPermissions, UserId,
};
use gatehouse_storage::queries::{chat_admin, chat_config, private_chat, queue, sessions};
use gatehouse_test_utils::{profile, TestHarness};
use serde_json::json;

const CHAT: ChatId = ChatId(100);
const MEMBER: UserId = UserId(7);
const ADMIN: UserId = UserId(10);
const MEMBER_DM: ChatId = ChatId(7_007);

async fn harness() -> TestHarness {
    let h = TestHarness::new().await.unwrap();
    h.seed_admins(CHAT, &[ADMIN]).await.unwrap();
    h
}

fn restricting(user: UserId) -> ChatAdministrator {
    ChatAdministrator { user, is_owner: false, can_restrict_members: true, is_bot: false }
}

async fn admin_list(h: &TestHarness) -> Vec<UserId> {
    chat_admin::list(&h.db, CHAT).await.unwrap().iter().map(|a| a.user).collect()
}

#[tokio::test]
async fn join_mutes_member_and_posts_verify_link() {
    let h = harness().await;
    let session = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann <3>"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.bot.restrictions().await, vec![(CHAT, MEMBER, MemberPermissions::Muted)]);
    let sent = h.bot.sent_messages().await;
    assert_eq!(sent.len(), 1);
    let (chat, welcome, id) = &sent[0];
    assert_eq!(*chat, CHAT);
    assert!(welcome.silent && welcome.protect_content && welcome.parse_html);
    assert!(welcome.text.contains(r#"<a href="tg://user?id=7">Ann &lt;3&gt;</a>"#));
    assert_eq!(
        welcome.buttons,
        vec![vec![Button::url("Verify", "https://t.me/gatehouse_bot?start=100")]]
    );
    assert_eq!(session.welcome_message, Some(*id));

    let stored = sessions::get(&h.db, CHAT, MEMBER).await.unwrap().unwrap();
    assert_eq!(stored.welcome_message, Some(*id));
    assert_eq!(queue::stats(&h.db).await.unwrap().pending, 1);
}

#[tokio::test]
async fn disabled_chat_creates_no_session() {
    let h = harness().await;
    h.append(
        CHAT,
        ADMIN,
        AuditAction::ChatConfigUpdate { language: None, value: json!({"enabled": false}) },
    )
    .await
    .unwrap();
    let created = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann")).await.unwrap();
    assert!(created.is_none());
    assert!(h.bot.calls().await.is_empty());
    assert_eq!(queue::stats(&h.db).await.unwrap().pending, 0);
}

#[tokio::test]
async fn rejoin_replaces_session_and_old_welcome() {
    let h = harness().await;
    let first = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann")).await.unwrap().unwrap();
    let second = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann")).await.unwrap().unwrap();
    assert_ne!(first.nonce, second.nonce);
    assert!(h.bot.deleted().await.contains(&(CHAT, first.welcome_message.unwrap())));
    assert!(sessions::get_by_nonce(&h.db, &first.nonce).await.unwrap().is_none());
}

#[tokio::test]
async fn start_with_chat_payload_sends_challenge_link() {
    let h = harness().await;
    let member = profile(MEMBER.0, "Ann");
    let session = lifecycle::admit_new_member(&h.ctx, CHAT, member.clone()).await.unwrap().unwrap();
    h.bot.set_chat(MEMBER_DM, json!({"id": MEMBER_DM.0, "bio": "hello"})).await;
    h.bot.clear_calls().await;

    let outcome = lifecycle::handle_start(&h.ctx, MEMBER_DM, &member, "100").await.unwrap();
    assert_eq!(outcome, StartOutcome::Challenge { chat: CHAT });
    assert_eq!(private_chat::get(&h.db, MEMBER).await.unwrap(), Some(MEMBER_DM));
    assert!(h.bot.deleted().await.contains(&(CHAT, session.welcome_message.unwrap())));

    let sent = h.bot.sent_messages().await;
    let (to, reply, _) = &sent[0];
    assert_eq!(*to, MEMBER_DM);
    assert_eq!(reply.text, "Joining <b>Chat 100</b>");
    assert_eq!(
        reply.buttons,
        vec![vec![Button::url("Verify", "https://gate.example/challenge?startapp=100")]]
    );

    let stored = sessions::get(&h.db, CHAT, MEMBER).await.unwrap().unwrap();
    assert_eq!(stored.user_chat_info, Some(json!({"id": MEMBER_DM.0, "bio": "hello"})));
    assert_eq!(stored.welcome_message, None);
}

#[tokio::test]
async fn start_from_admin_gets_hint_and_plain_start_registers() {
    let h = harness().await;
    let admin = profile(ADMIN.0, "Root");
    let outcome = lifecycle::handle_start(&h.ctx, ChatId(10_010), &admin, "100").await.unwrap();
    assert_eq!(outcome, StartOutcome::AdminHint { chat: CHAT });
    assert_eq!(h.bot.sent_messages().await.len(), 1);

    let stranger = profile(55, "Eve");
    let outcome = lifecycle::handle_start(&h.ctx, ChatId(55), &stranger, "").await.unwrap();
    assert_eq!(outcome, StartOutcome::Registered);
    assert_eq!(private_chat::get(&h.db, UserId(55)).await.unwrap(), Some(ChatId(55)));
}

#[tokio::test]
async fn member_transitions_drive_sessions_and_admins() {
    let h = harness().await;
    let member = profile(MEMBER.0, "Ann");
    let joined = membership::on_chat_member(&h.ctx, CHAT, member.clone(), MemberStatus::Left, MemberStatus::Member)
        .await
        .unwrap();
    assert!(matches!(joined, MemberTransition::SessionCreated(_)));

    let left = membership::on_chat_member(&h.ctx, CHAT, member.clone(), MemberStatus::Member, MemberStatus::Left)
        .await
        .unwrap();
    assert!(matches!(left, MemberTransition::SessionDiscarded(_)));
    assert!(sessions::get(&h.db, CHAT, MEMBER).await.unwrap().is_none());

    // The rebuild also picks up admins promoted while the bot was away.
    h.bot
        .set_admins(CHAT, vec![restricting(ADMIN), restricting(MEMBER), restricting(UserId(12))])
        .await;
    let promoted = membership::on_chat_member(
        &h.ctx,
        CHAT,
        member.clone(),
        MemberStatus::Member,
        MemberStatus::Administrator {
            can_restrict_members: true,
            can_delete_messages: false,
            can_manage_chat: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(promoted, MemberTransition::AdminAdded);
    assert_eq!(admin_list(&h).await, vec![MEMBER, ADMIN, UserId(12)]);

    h.bot.set_admins(CHAT, vec![restricting(ADMIN)]).await;

    let demoted = membership::on_chat_member(
        &h.ctx,
        CHAT,
        member,
        MemberStatus::Administrator {
            can_restrict_members: true,
            can_delete_messages: false,
            can_manage_chat: false,
        },
        MemberStatus::Member,
    )
    .await
    .unwrap();
    assert_eq!(demoted, MemberTransition::AdminRemoved);
    assert_eq!(admin_list(&h).await, vec![ADMIN]);

    // An admin without restrict rights is not kept.
    h.bot
        .set_admins(
            CHAT,
            vec![
                restricting(ADMIN),
                ChatAdministrator { user: MEMBER, is_owner: false, can_restrict_members: false, is_bot: false },
            ],
        )
        .await;
    let weak = membership::on_chat_member(
        &h.ctx,
        CHAT,
        profile(MEMBER.0, "Ann"),
        MemberStatus::Member,
        MemberStatus::Administrator {
            can_restrict_members: false,
            can_delete_messages: true,
            can_manage_chat: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(weak, MemberTransition::AdminRemoved);
    assert_eq!(admin_list(&h).await, vec![ADMIN]);

    let mut bot_user = profile(77, "Spam");
    bot_user.is_bot = true;
    let ignored = membership::on_chat_member(&h.ctx, CHAT, bot_user, MemberStatus::Left, MemberStatus::Member)
        .await
        .unwrap();
    assert_eq!(ignored, MemberTransition::Ignored);
}

#[tokio::test]
async fn reload_rebuilds_admins_wholesale() {
    let h = harness().await;
    h.bot
        .set_admins(
            CHAT,
            vec![
                ChatAdministrator { user: UserId(20), is_owner: true, can_restrict_members: false, is_bot: false },
                ChatAdministrator { user: UserId(21), is_owner: false, can_restrict_members: false, is_bot: false },
                ChatAdministrator { user: UserId(1), is_owner: false, can_restrict_members: true, is_bot: true },
            ],
        )
        .await;

    assert!(!membership::reload(&h.ctx, CHAT, ADMIN).await.unwrap());
    assert!(!chat_admin::is_admin(&h.db, CHAT, ADMIN).await.unwrap());
    assert!(membership::reload(&h.ctx, CHAT, UserId(20)).await.unwrap());
    let admins: Vec<UserId> = chat_admin::list(&h.db, CHAT).await.unwrap().iter().map(|a| a.user).collect();
    assert_eq!(admins, vec![UserId(20)]);
    let replies: Vec<String> = h.bot.sent_messages().await.into_iter().map(|(_, m, _)| m.text).collect();
    assert_eq!(replies, vec!["reloaded".to_string()]);
}

#[tokio::test]
async fn bot_departure_drops_chat_config_and_block_forgets_private_chat() {
    let h = harness().await;
    h.append(
        CHAT,
        ADMIN,
        AuditAction::ChatConfigUpdate { language: None, value: json!({"ban_duration": 900}) },
    )
    .await
    .unwrap();
    assert_eq!(chat_config::layers(&h.db, CHAT).await.unwrap().len(), 1);

    membership::on_bot_membership(&h.ctx, CHAT, false, MemberStatus::Left).await.unwrap();
    assert!(chat_config::layers(&h.db, CHAT).await.unwrap().is_empty());

    private_chat::record(&h.db, MEMBER, MEMBER_DM, &h.ctx.stamp()).await.unwrap();
    membership::on_bot_membership(&h.ctx, MEMBER_DM, true, MemberStatus::Kicked).await.unwrap();
    assert_eq!(private_chat::get(&h.db, MEMBER).await.unwrap(), None);
}

#[tokio::test]
async fn bot_promotion_without_rights_warns_then_rebuilds() {
    let h = harness().await;
    membership::on_bot_membership(
        &h.ctx,
        CHAT,
        false,
        MemberStatus::Administrator {
            can_restrict_members: true,
            can_delete_messages: false,
            can_manage_chat: true,
        },
    )
    .await
    .unwrap();
    let sent = h.bot.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.text.starts_with("Insufficient rights"));
    assert!(chat_admin::is_admin(&h.db, CHAT, ADMIN).await.unwrap());
}

#[tokio::test]
async fn join_service_message_is_deleted_only_when_configured() {
    let h = harness().await;
    let member = profile(MEMBER.0, "Ann");
    let service = gatehouse_core::MessageId(5);
    assert!(!membership::on_join_message(&h.ctx, CHAT, &member, service).await.unwrap());

    h.append(
        CHAT,
        ADMIN,
        AuditAction::ChatConfigUpdate {
            language: None,
            value: json!({"delete_new_chat_member_message": true}),
        },
    )
    .await
    .unwrap();
    assert!(membership::on_join_message(&h.ctx, CHAT, &member, service).await.unwrap());
    assert_eq!(h.bot.deleted().await, vec![(CHAT, service)]);
}

#[tokio::test]
async fn out_of_range_timeouts_are_refused_and_joins_keep_working() {
    let h = harness().await;
    for value in [
        json!({"challenge_timeout": u64::MAX}),
        json!({"challenge_timeout": 1_000_000_000_000_000u64}),
        json!({"notification_direct_timeout": u64::MAX}),
    ] {
        let err = h
            .append(CHAT, ADMIN, AuditAction::ChatConfigUpdate { language: None, value: value.clone() })
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::ValidationFailed(_)), "{value}: {err}");
    }
    assert!(chat_config::layers(&h.db, CHAT).await.unwrap().is_empty());

    let session = lifecycle::admit_new_member(&h.ctx, CHAT, profile(MEMBER.0, "Ann")).await.unwrap().unwrap();
    assert_eq!(h.drain_queue().await.unwrap(), 0);
    assert!(h.bot.bans().await.is_empty());
    assert!(sessions::get_by_nonce(&h.db, &session.nonce).await.unwrap().is_some());

    assert_eq!(h.advance_and_drain(300).await.unwrap(), 1);
    assert_eq!(h.bot.bans().await.len(), 1);
}
