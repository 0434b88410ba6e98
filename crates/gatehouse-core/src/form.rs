// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Questionnaire templates: pages of labels, text blocks and text fields.

use serde::{Deserialize, Serialize};

use crate::error::GatehouseError;
use crate::types::{is_token, Answer, AnswerValue};

/// Upper bound for text field lengths.
pub const MAX_TEXT_LENGTH: u32 = 1000;

/// A complete questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormContent {
    pub tag: String,
    pub description: String,
    pub pages: Vec<FormPage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPage {
    pub id: String,
    pub subtitle: String,
    pub fields: Vec<FormField>,
}

/// Length bounds for a text field, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    #[serde(rename = "minLength", default = "default_min_length")]
    pub min_length: u32,
    #[serde(rename = "maxLength", default = "default_max_length")]
    pub max_length: u32,
}

impl Default for TextRange {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

fn default_min_length() -> u32 {
    1
}

fn default_max_length() -> u32 {
    MAX_TEXT_LENGTH
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormField {
    /// Static text.
    Label { id: String, content: String },
    /// Markdown block, optionally requiring an explicit confirmation.
    Textblock {
        id: String,
        content: String,
        #[serde(default)]
        confirm: bool,
        #[serde(rename = "confirmText", default)]
        confirm_text: String,
    },
    /// Free-text answer.
    Text {
        id: String,
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        placeholder: String,
        #[serde(default)]
        multiline: bool,
        #[serde(default = "default_true")]
        required: bool,
        #[serde(default)]
        range: TextRange,
    },
}

impl FormField {
    pub fn id(&self) -> &str {
        match self {
            FormField::Label { id, .. }
            | FormField::Textblock { id, .. }
            | FormField::Text { id, .. } => id,
        }
    }
}

fn invalid(path: String, message: &str) -> GatehouseError {
    GatehouseError::ValidationFailed(format!("{path}: {message}"))
}

impl FormContent {
    /// Structural validation run before a template is accepted into the audit log.
    pub fn validate(&self) -> Result<(), GatehouseError> {
        if self.pages.is_empty() {
            return Err(invalid("pages".into(), "a form needs at least one page"));
        }
        for (p, page) in self.pages.iter().enumerate() {
            if !is_token(&page.id) {
                return Err(invalid(format!("pages[{p}].id"), "malformed id"));
            }
            if page.fields.is_empty() {
                return Err(invalid(
                    format!("pages[{p}].fields"),
                    "a page needs at least one field",
                ));
            }
            for (f, field) in page.fields.iter().enumerate() {
                let path = format!("pages[{p}].fields[{f}]");
                if !is_token(field.id()) {
                    return Err(invalid(format!("{path}.id"), "malformed id"));
                }
                match field {
                    FormField::Label { content, .. } | FormField::Textblock { content, .. } => {
                        if content.trim().is_empty() {
                            return Err(invalid(format!("{path}.content"), "must not be empty"));
                        }
                    }
                    FormField::Text { title, range, .. } => {
                        if title.trim().is_empty() {
                            return Err(invalid(format!("{path}.title"), "must not be empty"));
                        }
                        if range.min_length < 1 || range.max_length > MAX_TEXT_LENGTH {
                            return Err(invalid(
                                format!("{path}.range"),
                                "lengths must be between 1 and 1000",
                            ));
                        }
                        if range.min_length > range.max_length {
                            return Err(invalid(
                                format!("{path}.range"),
                                "minLength must not exceed maxLength",
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Text fields in page order, paired with their page subtitle.
    pub fn text_fields(&self) -> impl Iterator<Item = (&FormPage, &FormField)> {
        self.pages.iter().flat_map(|page| {
            page.fields
                .iter()
                .filter(|f| matches!(f, FormField::Text { .. }))
                .map(move |f| (page, f))
        })
    }

    /// Checks a submission against this snapshot.
    pub fn check_answer(&self, answer: &Answer) -> Result<(), GatehouseError> {
        for page in &self.pages {
            for field in &page.fields {
                match field {
                    FormField::Text { id, title, required, range, .. } => {
                        let text = match answer.get(id) {
                            Some(AnswerValue::Text(s)) => s.trim(),
                            Some(AnswerValue::Flag(_)) => {
                                return Err(invalid(format!("answer.{id}"), "expected text"));
                            }
                            None => "",
                        };
                        if text.is_empty() {
                            if *required {
                                return Err(invalid(
                                    format!("answer.{id}"),
                                    &format!("`{title}` is required"),
                                ));
                            }
                            continue;
                        }
                        let len = text.chars().count() as u32;
                        if len < range.min_length || len > range.max_length {
                            return Err(invalid(
                                format!("answer.{id}"),
                                &format!(
                                    "length must be between {} and {}",
                                    range.min_length, range.max_length
                                ),
                            ));
                        }
                    }
                    FormField::Textblock { id, confirm: true, .. } => {
                        if answer.get(id) != Some(&AnswerValue::Flag(true)) {
                            return Err(invalid(format!("answer.{id}"), "must be confirmed"));
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> FormContent {
        serde_json::from_value(json!({
            "tag": "intro",
            "description": "tell us about you",
            "pages": [{
                "id": "pageaaaaaaaaaaaaaaaaa",
                "subtitle": "About",
                "fields": [
                    {"id": "labelaaaaaaaaaaaaaaaa", "type": "label", "content": "Hi"},
                    {"id": "rulesaaaaaaaaaaaaaaaa", "type": "textblock", "content": "Be nice",
                     "confirm": true, "confirmText": "I agree"},
                    {"id": "whyaaaaaaaaaaaaaaaaaa", "type": "text", "title": "Why join?",
                     "range": {"minLength": 3, "maxLength": 20}}
                ]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn sample_form_is_valid() {
        sample().validate().unwrap();
    }

    #[test]
    fn text_field_defaults_apply() {
        let form = sample();
        let FormField::Text { required, multiline, .. } = &form.pages[0].fields[2] else {
            panic!("expected text field");
        };
        assert!(*required);
        assert!(!*multiline);
    }

    #[test]
    fn empty_pages_and_inverted_ranges_are_rejected() {
        let mut form = sample();
        form.pages.clear();
        assert!(form.validate().is_err());

        let mut form = sample();
        if let FormField::Text { range, .. } = &mut form.pages[0].fields[2] {
            range.min_length = 50;
        }
        let err = form.validate().unwrap_err().to_string();
        assert!(err.contains("minLength"), "{err}");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let mut form = sample();
        form.pages[0].id = "p1".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn answers_are_checked_against_bounds_and_confirmations() {
        let form = sample();
        let mut answer = Answer::new();
        answer.insert("rulesaaaaaaaaaaaaaaaa".into(), AnswerValue::Flag(true));
        answer.insert("whyaaaaaaaaaaaaaaaaaa".into(), AnswerValue::Text("because".into()));
        form.check_answer(&answer).unwrap();

        answer.insert("whyaaaaaaaaaaaaaaaaaa".into(), AnswerValue::Text("no".into()));
        assert!(form.check_answer(&answer).is_err());

        answer.insert("whyaaaaaaaaaaaaaaaaaa".into(), AnswerValue::Text("because".into()));
        answer.insert("rulesaaaaaaaaaaaaaaaa".into(), AnswerValue::Flag(false));
        assert!(form.check_answer(&answer).is_err());
    }

    #[test]
    fn text_fields_iterates_in_page_order() {
        let form = sample();
        let ids: Vec<&str> = form.text_fields().map(|(_, f)| f.id()).collect();
        assert_eq!(ids, vec!["whyaaaaaaaaaaaaaaaaaa"]);
    }
}
