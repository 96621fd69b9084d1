//! Shared types for conversation state and per-request options.
//!
//! These types define stable contracts between the router, the pipeline and
//! the presentation layer. Serialized names match what the UI consumes.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

/// Generate a short random identifier for messages and tasks.
pub fn new_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// One of the three pipeline specialists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Architect,
    Developer,
    Qa,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Architect => "architect",
            AgentRole::Developer => "developer",
            AgentRole::Qa => "qa",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stages a request is addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Run every stage in order.
    #[default]
    Team,
    Architect,
    Developer,
    Qa,
}

impl Target {
    /// Whether the stage for `role` is eligible under this target.
    pub fn includes(self, role: AgentRole) -> bool {
        matches!(
            (self, role),
            (Target::Team, _)
                | (Target::Architect, AgentRole::Architect)
                | (Target::Developer, AgentRole::Developer)
                | (Target::Qa, AgentRole::Qa)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Team => "team",
            Target::Architect => "architect",
            Target::Developer => "developer",
            Target::Qa => "qa",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "team" => Ok(Target::Team),
            "architect" => Ok(Target::Architect),
            "developer" => Ok(Target::Developer),
            "qa" => Ok(Target::Qa),
            other => Err(format!(
                "unknown target '{other}' (expected team, architect, developer or qa)"
            )),
        }
    }
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
    System,
}

/// An inline image sent alongside a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64-encoded image bytes (no `data:` prefix).
    pub data: String,
}

impl ImagePayload {
    /// Build a payload from raw image bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64_STANDARD.encode(bytes),
        }
    }

    /// Parse a `data:<mime>;base64,<data>` URL as produced by browser file readers.
    ///
    /// A bare payload without the `data:` header is accepted as PNG.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let Some(rest) = url.strip_prefix("data:") else {
            return (!url.is_empty()).then(|| Self {
                mime_type: "image/png".to_string(),
                data: url.to_string(),
            });
        };
        let (header, data) = rest.split_once(',')?;
        let mime_type = header
            .split(';')
            .next()
            .filter(|m| !m.is_empty())
            .unwrap_or("image/png");
        if data.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

/// A source the service consulted when search was enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

/// One immutable entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<AgentRole>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<ImagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding_urls: Option<Vec<Citation>>,
}

impl Message {
    fn new(sender: Sender, agent_role: Option<AgentRole>, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            sender,
            agent_role,
            text: text.into(),
            timestamp: Utc::now(),
            attachment: None,
            grounding_urls: None,
        }
    }

    pub fn user(text: impl Into<String>, attachment: Option<ImagePayload>) -> Self {
        Self {
            attachment,
            ..Self::new(Sender::User, None, text)
        }
    }

    pub fn agent(role: AgentRole, text: impl Into<String>) -> Self {
        Self::new(Sender::Agent, Some(role), text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, None, text)
    }

    /// Attach citations, leaving the field unset when there are none.
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.grounding_urls = (!citations.is_empty()).then_some(citations);
        self
    }
}

/// Per-request configuration consumed by capability selection.
///
/// Not persisted across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentOptions {
    pub use_search: bool,
    pub use_thinking: bool,
    pub image: Option<ImagePayload>,
}
