//! Error taxonomy for request handling and stage execution.
//!
//! - [`ValidationFailure`]: rejected before any task or message exists.
//! - [`NetworkFailure`] / [`ParseFailure`]: contained per stage as [`StageError`];
//!   the stage's task is failed and later stages still run.
//! - [`PipelineError`]: escaped every stage handler; reported once as a system message.

use thiserror::Error;

use crate::core::types::AgentRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("request text is empty and no image is attached")]
    EmptyRequest,
    #[error("another request is still being processed")]
    Busy,
}

/// The generative service call failed or returned an error status.
#[derive(Debug, Error)]
#[error("generative service call failed: {message}")]
pub struct NetworkFailure {
    /// HTTP status, when the service answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl NetworkFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Structured output could not be recovered from model text.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("response is not a JSON object: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response violates output schema: {}", .0.join("; "))]
    Schema(Vec<String>),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Network(#[from] NetworkFailure),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("active artifact changed while the developer stage was running")]
    Stale,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render {stage} prompt")]
    Prompt {
        stage: AgentRole,
        #[source]
        source: minijinja::Error,
    },
}
