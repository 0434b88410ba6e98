// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON merge-patch and language selection helpers.

use serde_json::{Map, Value};

/// Applies `patch` to `target` with JSON merge-patch semantics.
///
/// Object members merge recursively, `null` removes a member, and every other
/// value (arrays included) replaces the target wholesale. Matches SQLite's
/// `json_patch()` so stored rows and in-memory folds agree.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Picks the configured language that best serves `preferred`.
///
/// Non-empty tags related by prefix (`zh` vs `zh-hans`) match; the shortest
/// match wins, ties broken alphabetically. Falls back to the default language
/// (empty tag).
pub fn select_language<'a, I>(available: I, preferred: &str) -> &'a str
where
    I: IntoIterator<Item = &'a str>,
{
    let preferred = preferred.to_ascii_lowercase();
    if preferred.is_empty() {
        return "";
    }
    let mut candidates: Vec<&'a str> = available
        .into_iter()
        .filter(|lang| {
            let lang_lower = lang.to_ascii_lowercase();
            !lang.is_empty()
                && (lang_lower.starts_with(&preferred) || preferred.starts_with(&lang_lower))
        })
        .collect();
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates.first().copied().unwrap_or("")
}
