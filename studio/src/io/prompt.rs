//! Stage prompts and system instructions.

use minijinja::{Environment, context};

const ARCHITECT_TEMPLATE: &str = include_str!("prompts/architect.md");
const DEVELOPER_TEMPLATE: &str = include_str!("prompts/developer.md");
const QA_TEMPLATE: &str = include_str!("prompts/qa.md");

pub const ARCHITECT_INSTRUCTION: &str = "You are a pragmatic software architect. Analyze the request and propose a concise component structure and state management plan. Use Markdown formatting (bold key terms, bulleted lists).";

pub const DEVELOPER_EDIT_INSTRUCTION: &str = "You are a Senior React Developer. Modify the provided code based on the user request. Return JSON: { \"filename\": string, \"content\": string, \"explanation\": string }. The explanation should be brief and use Markdown.";

pub const DEVELOPER_CREATE_INSTRUCTION: &str = "You are a Senior React Developer. Create a new React component based on the request. Return JSON: { \"filename\": string, \"content\": string, \"explanation\": string }. File name should end in .tsx. The explanation should be brief and use Markdown.";

/// Response type requested from the developer stage.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("architect", ARCHITECT_TEMPLATE)
            .expect("architect template should be valid");
        env.add_template("developer", DEVELOPER_TEMPLATE)
            .expect("developer template should be valid");
        env.add_template("qa", QA_TEMPLATE)
            .expect("qa template should be valid");
        Self { env }
    }

    pub fn render_architect(&self, request: &str, has_image: bool) -> Result<String, minijinja::Error> {
        self.env.get_template("architect")?.render(context! {
            request => request,
            has_image => has_image,
        })
    }

    /// Prompt asking for `current_code` to be modified.
    pub fn render_developer_edit(
        &self,
        current_code: &str,
        request: &str,
    ) -> Result<String, minijinja::Error> {
        self.env.get_template("developer")?.render(context! {
            edit => true,
            current_code => current_code,
            request => request,
        })
    }

    /// Prompt asking for a new component that follows the architect plan.
    pub fn render_developer_create(&self, plan: &str, request: &str) -> Result<String, minijinja::Error> {
        self.env.get_template("developer")?.render(context! {
            edit => false,
            plan => plan,
            request => request,
        })
    }

    /// Review prompt over the first `max_chars` characters of `code`.
    pub fn render_qa(&self, code: &str, max_chars: usize) -> Result<String, minijinja::Error> {
        self.env.get_template("qa")?.render(context! {
            code => truncate_chars(code, max_chars),
        })
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
