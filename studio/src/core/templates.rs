//! Built-in component templates served without calling the generative service.

use crate::core::rules::{TEMPLATE_RULES, first_match};

const LOGIN_TEMPLATE: &str = include_str!("../../templates/Login.tsx");
const CALCULATOR_TEMPLATE: &str = include_str!("../../templates/Calculator.tsx");
const TODO_TEMPLATE: &str = include_str!("../../templates/TodoList.tsx");
const GENERIC_TEMPLATE: &str = include_str!("../../templates/Component.tsx");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Login,
    Calculator,
    Todo,
    /// Placeholder component seeded into a fresh file tree. Never keyword-matched.
    Generic,
}

/// A hard-coded, known-good artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub kind: TemplateKind,
    pub filename: &'static str,
    pub content: &'static str,
}

impl TemplateKind {
    /// Short key used in user-facing explanations.
    pub fn key(self) -> &'static str {
        match self {
            TemplateKind::Login => "login",
            TemplateKind::Calculator => "calculator",
            TemplateKind::Todo => "todo",
            TemplateKind::Generic => "generic",
        }
    }

    pub fn template(self) -> Template {
        let (filename, content) = match self {
            TemplateKind::Login => ("Login.tsx", LOGIN_TEMPLATE),
            TemplateKind::Calculator => ("Calculator.tsx", CALCULATOR_TEMPLATE),
            TemplateKind::Todo => ("TodoList.tsx", TODO_TEMPLATE),
            TemplateKind::Generic => ("Component.tsx", GENERIC_TEMPLATE),
        };
        Template {
            kind: self,
            filename,
            content,
        }
    }
}

impl Template {
    /// Explanation posted by the developer when a template short-circuits generation.
    pub fn explanation(&self) -> String {
        format!(
            "I've implemented the **{}** using our best-practice template. It includes styles and basic functionality.",
            self.kind.key()
        )
    }
}

/// Resolve a template for `text` using the template rule table.
pub fn match_template(text: &str) -> Option<Template> {
    first_match(TEMPLATE_RULES, text).map(TemplateKind::template)
}
