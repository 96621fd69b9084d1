//! Model and tool selection for each stage.
//!
//! Architect precedence, highest first and mutually exclusive:
//! `use_thinking` > `use_search` > image attached > default. Extended reasoning
//! always suppresses the search tool, even when search was also requested.

use serde::{Deserialize, Serialize};

use crate::core::generation::{ThinkingConfig, Tool};
use crate::core::types::AgentOptions;

/// The model names and reasoning budget available to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTiers {
    /// Fast model used unless a stage needs more.
    pub default_model: String,
    /// Higher-capability model for reasoning and image analysis.
    pub advanced_model: String,
    /// Token budget for extended reasoning.
    pub thinking_budget: u32,
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            default_model: "gemini-2.5-flash".to_string(),
            advanced_model: "gemini-3-pro-preview".to_string(),
            thinking_budget: 32_768,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Advanced model with a thinking budget, no tools.
    ExtendedReasoning,
    /// Default model with the web search tool.
    WebSearch,
    /// Advanced model without reasoning.
    Vision,
    Standard,
}

/// Concrete model configuration for one service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model: String,
    pub tools: Vec<Tool>,
    pub thinking: Option<ThinkingConfig>,
}

pub fn architect_capability(options: &AgentOptions) -> Capability {
    if options.use_thinking {
        Capability::ExtendedReasoning
    } else if options.use_search {
        Capability::WebSearch
    } else if options.image.is_some() {
        Capability::Vision
    } else {
        Capability::Standard
    }
}

/// The developer stage only distinguishes reasoning from the default tier.
pub fn developer_capability(options: &AgentOptions) -> Capability {
    if options.use_thinking {
        Capability::ExtendedReasoning
    } else {
        Capability::Standard
    }
}

impl ModelTiers {
    pub fn resolve(&self, capability: Capability) -> ModelChoice {
        match capability {
            Capability::ExtendedReasoning => ModelChoice {
                model: self.advanced_model.clone(),
                tools: Vec::new(),
                thinking: Some(ThinkingConfig {
                    thinking_budget: self.thinking_budget,
                }),
            },
            Capability::WebSearch => ModelChoice {
                model: self.default_model.clone(),
                tools: vec![Tool::WebSearch],
                thinking: None,
            },
            Capability::Vision => ModelChoice {
                model: self.advanced_model.clone(),
                tools: Vec::new(),
                thinking: None,
            },
            Capability::Standard => ModelChoice {
                model: self.default_model.clone(),
                tools: Vec::new(),
                thinking: None,
            },
        }
    }
}
