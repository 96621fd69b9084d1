//! Keyword rule tables for request classification.
//!
//! Rules are evaluated in table order and the first rule with any matching
//! keyword wins. Matching is a case-insensitive substring test, so `"calc"`
//! also matches `"calculator"` and `"recalculate"`.

use crate::core::templates::TemplateKind;

/// A keyword rule mapping any of `keywords` to `outcome`.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule<T: 'static> {
    pub keywords: &'static [&'static str],
    pub outcome: T,
}

/// Whether the request asks to change existing code or to create something new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Edit,
    Create,
}

/// Template routing, first match wins.
pub const TEMPLATE_RULES: &[KeywordRule<TemplateKind>] = &[
    KeywordRule {
        keywords: &["calculator", "calc"],
        outcome: TemplateKind::Calculator,
    },
    KeywordRule {
        keywords: &["todo", "task list"],
        outcome: TemplateKind::Todo,
    },
    KeywordRule {
        keywords: &["login", "sign in"],
        outcome: TemplateKind::Login,
    },
];

/// Edit-intent detection. Anything unmatched is [`Intent::Create`].
pub const INTENT_RULES: &[KeywordRule<Intent>] = &[KeywordRule {
    keywords: &["change", "update", "fix", "edit", "add"],
    outcome: Intent::Edit,
}];

/// Return the outcome of the first rule with a keyword contained in `text`.
pub fn first_match<T: Copy>(rules: &[KeywordRule<T>], text: &str) -> Option<T> {
    let lowered = text.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|rule| rule.outcome)
}

/// Classify the intent of `text` regardless of session state.
pub fn classify_intent(text: &str) -> Intent {
    first_match(INTENT_RULES, text).unwrap_or(Intent::Create)
}

/// A request is an edit only when an artifact is active and the text asks for a change.
pub fn is_edit_request(has_active_artifact: bool, text: &str) -> bool {
    has_active_artifact && classify_intent(text) == Intent::Edit
}
