//! Recovery of structured developer output from raw model text.
//!
//! Models wrap JSON in fenced blocks and surround it with commentary. The
//! parser narrows the text to the most plausible object span, decodes it, and
//! checks it against the embedded output schema.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseFailure;

const DEVELOPER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/developer_output.schema.json");

/// Explanation used when the model omits one.
pub const DEFAULT_EXPLANATION: &str = "Code generated successfully.";

static TAGGED_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json[ \t]*\r?\n([\s\S]*?)\r?\n[ \t]*```").expect("valid regex"));
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```([\s\S]*?)```").expect("valid regex"));
static OUTPUT_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(DEVELOPER_OUTPUT_SCHEMA).expect("developer output schema is JSON");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("developer output schema should compile")
});

/// File produced by the developer stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeveloperOutput {
    pub filename: String,
    pub content: String,
    pub explanation: String,
}

#[derive(Deserialize)]
struct RawDeveloperOutput {
    filename: String,
    content: String,
    #[serde(default)]
    explanation: Option<String>,
}

/// Narrow `raw` to the text most likely holding a JSON object.
///
/// Prefers the first ```` ```json ```` block, then any fenced block, then the
/// whole text; the result is trimmed and sliced from the first `{` to the last `}`.
pub fn extract_object_text(raw: &str) -> &str {
    let inner = TAGGED_FENCE
        .captures(raw)
        .or_else(|| ANY_FENCE.captures(raw))
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());
    let trimmed = inner.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse developer output, failing when decoding fails or required fields are absent.
pub fn parse_developer_output(raw: &str) -> Result<DeveloperOutput, ParseFailure> {
    let value: Value = serde_json::from_str(extract_object_text(raw))?;

    let violations: Vec<String> = OUTPUT_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(ParseFailure::Schema(violations));
    }

    let parsed: RawDeveloperOutput = serde_json::from_value(value)?;
    Ok(DeveloperOutput {
        filename: parsed.filename,
        content: parsed.content,
        explanation: parsed
            .explanation
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
    })
}
