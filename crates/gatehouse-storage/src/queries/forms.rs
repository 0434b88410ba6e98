// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read side of the form template projection.

use gatehouse_core::merge::select_language;
use gatehouse_core::{ChatId, FormContent, GatehouseError};
use rusqlite::{params, Connection};

use crate::database::{decode_json, Database};
use crate::models::FormRecord;

/// Forms of `chat`, live ones first, most recently edited first.
///
/// `language` narrows the listing to one language; `None` lists all.
pub async fn list(
    db: &Database,
    chat: ChatId,
    language: Option<&str>,
) -> Result<Vec<FormRecord>, GatehouseError> {
    let language = language.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, language, content, enabled, deleted_at IS NOT NULL, created_at, updated_at
                 FROM form
                 WHERE chat = ?1 AND (?2 IS NULL OR language = ?2)
                 ORDER BY deleted_at IS NOT NULL, updated_at DESC, id",
            )?;
            let rows = stmt.query_map(params![chat.0, language], |row| {
                let content: String = row.get(2)?;
                Ok(FormRecord {
                    id: row.get(0)?,
                    language: row.get(1)?,
                    content: decode_json(2, &content)?,
                    enabled: row.get(3)?,
                    deleted: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The form a user speaking `language` should answer, if any.
pub async fn enabled_form(
    db: &Database,
    chat: ChatId,
    language: &str,
) -> Result<Option<FormContent>, GatehouseError> {
    let language = language.to_string();
    db.connection()
        .call(move |conn| load_enabled(conn, chat, &language))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Picks the enabled form for `language` with fallback to the default language.
pub(crate) fn load_enabled(
    conn: &Connection,
    chat: ChatId,
    language: &str,
) -> rusqlite::Result<Option<FormContent>> {
    let enabled: Vec<(String, String)> = {
        let mut stmt = conn.prepare(
            "SELECT language, content FROM form
             WHERE chat = ?1 AND enabled AND deleted_at IS NULL
             ORDER BY language",
        )?;
        let rows = stmt.query_map(params![chat.0], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    let chosen = select_language(enabled.iter().map(|(lang, _)| lang.as_str()), language);
    enabled
        .iter()
        .find(|(lang, _)| lang == chosen)
        .map(|(_, content)| decode_json(1, content))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{audit, chat_admin};
    use gatehouse_core::{AuditAction, UserId};
    use serde_json::json;
    use tempfile::tempdir;

    const NOW: &str = "2026-01-01T00:00:00.000Z";
    const LATER: &str = "2026-01-01T00:05:00.000Z";
    const FORM_A: &str = "formAaaaaaaaaaaaaaaaa";
    const FORM_B: &str = "formBbbbbbbbbbbbbbbbb";
    const FORM_DE: &str = "formDeeeeeeeeeeeeeeee";

    fn content(tag: &str) -> FormContent {
        serde_json::from_value(json!({
            "tag": tag,
            "description": "",
            "pages": [{"id": "pageaaaaaaaaaaaaaaaaa", "subtitle": "s",
                       "fields": [{"id": "labelaaaaaaaaaaaaaaaa", "type": "label", "content": "hi"}]}]
        }))
        .unwrap()
    }

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("forms.db").to_str().unwrap()).await.unwrap();
        chat_admin::replace_all(&db, ChatId(100), &[UserId(1)], None, NOW).await.unwrap();
        (db, dir)
    }

    async fn update(db: &Database, id: &str, language: Option<&str>, at: &str) {
        audit::append(
            db,
            ChatId(100),
            UserId(1),
            AuditAction::FormUpdate {
                id: id.into(),
                language: language.map(str::to_string),
                content: content(id),
            },
            at,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn enabling_one_form_disables_its_siblings() {
        let (db, _dir) = setup_db().await;
        update(&db, FORM_A, None, NOW).await;
        update(&db, FORM_B, None, LATER).await;

        let listed = list(&db, ChatId(100), Some("")).await.unwrap();
        assert_eq!(listed.iter().filter(|f| f.enabled).count(), 1);
        assert!(listed.iter().find(|f| f.id == FORM_A).unwrap().enabled);

        audit::append(
            &db,
            ChatId(100),
            UserId(1),
            AuditAction::FormEnable { id: FORM_B.into(), language: None },
            LATER,
        )
        .await
        .unwrap();
        let listed = list(&db, ChatId(100), None).await.unwrap();
        let enabled: Vec<&str> = listed.iter().filter(|f| f.enabled).map(|f| f.id.as_str()).collect();
        assert_eq!(enabled, vec![FORM_B]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deleted_forms_sort_last_and_recover() {
        let (db, _dir) = setup_db().await;
        update(&db, FORM_A, None, NOW).await;
        update(&db, FORM_B, None, NOW).await;
        audit::append(&db, ChatId(100), UserId(1), AuditAction::FormDelete { id: FORM_A.into(), language: None }, LATER)
            .await
            .unwrap();

        let listed = list(&db, ChatId(100), None).await.unwrap();
        assert_eq!(listed[1].id, FORM_A);
        assert!(listed[1].deleted);
        assert!(!listed[1].enabled);

        audit::append(&db, ChatId(100), UserId(1), AuditAction::FormRecover { id: FORM_A.into(), language: None }, LATER)
            .await
            .unwrap();
        let listed = list(&db, ChatId(100), None).await.unwrap();
        assert!(listed.iter().all(|f| !f.deleted));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn enabled_form_prefers_user_language() {
        let (db, _dir) = setup_db().await;
        assert!(enabled_form(&db, ChatId(100), "de").await.unwrap().is_none());

        update(&db, FORM_A, None, NOW).await;
        update(&db, FORM_DE, Some("de"), NOW).await;

        let german = enabled_form(&db, ChatId(100), "de-CH").await.unwrap().unwrap();
        assert_eq!(german.tag, FORM_DE);
        let fallback = enabled_form(&db, ChatId(100), "fr").await.unwrap().unwrap();
        assert_eq!(fallback.tag, FORM_A);

        audit::append(&db, ChatId(100), UserId(1), AuditAction::DropLanguage { language: "de".into() }, LATER)
            .await
            .unwrap();
        let after_drop = enabled_form(&db, ChatId(100), "de").await.unwrap().unwrap();
        assert_eq!(after_drop.tag, FORM_A);
        db.close().await.unwrap();
    }
}
