// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replaying the audit log reproduces the projected tables exactly.

use gatehouse_core::{AuditAction, ChatId, FormContent, UserId};
use gatehouse_storage::queries::{audit, chat_admin, replay};
use gatehouse_storage::Database;
use proptest::prelude::*;
use serde_json::json;

const CHAT: ChatId = ChatId(100);
const ADMINS: [UserId; 2] = [UserId(1), UserId(2)];
const FORM_IDS: [&str; 3] = [
    "formAaaaaaaaaaaaaaaaa",
    "formBbbbbbbbbbbbbbbbb",
    "formCcccccccccccccccc",
];
const LANGUAGES: [Option<&str>; 3] = [None, Some("de"), Some("zh-hans")];

fn content(tag: &str) -> FormContent {
    serde_json::from_value(json!({
        "tag": tag,
        "description": "",
        "pages": [{"id": "pageaaaaaaaaaaaaaaaaa", "subtitle": "s",
                   "fields": [{"id": "labelaaaaaaaaaaaaaaaa", "type": "label", "content": tag}]}]
    }))
    .unwrap()
}

fn action() -> impl Strategy<Value = AuditAction> {
    let lang = (0..LANGUAGES.len()).prop_map(|i| LANGUAGES[i].map(str::to_string));
    let form = 0..FORM_IDS.len();
    prop_oneof![
        (lang.clone(), 1u64..1000).prop_map(|(language, ban)| AuditAction::ChatConfigUpdate {
            language,
            value: json!({"ban_duration": ban}),
        }),
        (lang.clone(), any::<bool>()).prop_map(|(language, enabled)| AuditAction::ChatConfigUpdate {
            language,
            value: json!({"enabled": enabled, "challenge_timeout": null}),
        }),
        lang.clone().prop_map(|language| AuditAction::ChatConfigReset { language }),
        Just(AuditAction::DropLanguage { language: "de".into() }),
        (form.clone(), lang.clone(), "[a-z]{1,6}").prop_map(|(i, language, tag)| {
            AuditAction::FormUpdate { id: FORM_IDS[i].into(), language, content: content(&tag) }
        }),
        (form.clone(), lang.clone())
            .prop_map(|(i, language)| AuditAction::FormEnable { id: FORM_IDS[i].into(), language }),
        (form.clone(), lang.clone())
            .prop_map(|(i, language)| AuditAction::FormDelete { id: FORM_IDS[i].into(), language }),
        (form.clone(), lang.clone())
            .prop_map(|(i, language)| AuditAction::FormRecover { id: FORM_IDS[i].into(), language }),
        (form, lang).prop_map(|(i, language)| AuditAction::FormDeleteForever {
            id: FORM_IDS[i].into(),
            language
        }),
        (any::<bool>(), any::<bool>()).prop_map(|(value, other)| {
            AuditAction::ChatAdminToggleNotification { value, user: other.then_some(ADMINS[1]) }
        }),
    ]
}

async fn run(actions: Vec<(usize, AuditAction)>) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("replay.db").to_str().unwrap())
        .await
        .unwrap();
    chat_admin::replace_all(&db, CHAT, &ADMINS, None, "2026-01-01T00:00:00.000Z")
        .await
        .unwrap();

    for (step, (actor, action)) in actions.into_iter().enumerate() {
        let at = format!("2026-01-01T00:{:02}:{:02}.000Z", step / 60, step % 60);
        // Rejected actions (preconditions) write nothing and are fine here.
        let _ = audit::append(&db, CHAT, ADMINS[actor], action, &at).await;
    }

    let before = replay::snapshot(&db).await.unwrap();
    let report = replay::rebuild_projections(&db).await.unwrap();
    let after = replay::snapshot(&db).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(report.chat_configs + report.forms + report.admin_notifications, after.len() as i64);

    // A second replay is a fixed point.
    replay::rebuild_projections(&db).await.unwrap();
    assert_eq!(replay::snapshot(&db).await.unwrap(), after);
    db.close().await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn replay_reproduces_projections(actions in prop::collection::vec((0..2usize, action()), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(run(actions));
    }
}

#[tokio::test]
async fn replay_restores_wiped_projections() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("wipe.db").to_str().unwrap()).await.unwrap();
    let now = "2026-01-01T00:00:00.000Z";
    chat_admin::replace_all(&db, CHAT, &ADMINS, None, now).await.unwrap();
    audit::append(
        &db,
        CHAT,
        ADMINS[0],
        AuditAction::ChatConfigUpdate { language: None, value: json!({"ban_duration": 600}) },
        now,
    )
    .await
    .unwrap();
    audit::append(
        &db,
        CHAT,
        ADMINS[0],
        AuditAction::FormUpdate { id: FORM_IDS[0].into(), language: None, content: content("t") },
        now,
    )
    .await
    .unwrap();
    let before = replay::snapshot(&db).await.unwrap();

    db.connection()
        .call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("DELETE FROM chat_config; DELETE FROM form;")
        })
        .await
        .unwrap();
    assert!(replay::snapshot(&db).await.unwrap().is_empty());

    let report = replay::rebuild_projections(&db).await.unwrap();
    assert_eq!(report.entries, 2);
    assert_eq!(replay::snapshot(&db).await.unwrap(), before);
    db.close().await.unwrap();
}
