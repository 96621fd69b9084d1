//! Request validation and hand-off to the pipeline.
//!
//! [`RequestRouter::accept`] validates a submission, claims the processing flag
//! and records the user message; [`RequestRouter::dispatch`] runs the pipeline
//! and converts anything that escaped the stages into a single system message.
//! Servers answer between the two; [`RequestRouter::submit`] does both.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::types::{AgentOptions, Message, Target};
use crate::error::{PipelineError, ValidationFailure};
use crate::pipeline::AgentPipeline;
use crate::session::{ProcessingGuard, SessionStore};

pub const SYSTEM_ERROR_TEXT: &str = "An error occurred while communicating with the AI agents.";

/// Something that runs the stages for one accepted request.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run(
        &self,
        text: &str,
        target: Target,
        options: &AgentOptions,
    ) -> Result<u64, PipelineError>;
}

#[async_trait]
impl PipelineRunner for AgentPipeline {
    async fn run(
        &self,
        text: &str,
        target: Target,
        options: &AgentOptions,
    ) -> Result<u64, PipelineError> {
        AgentPipeline::run(self, text, target, options).await
    }
}

/// One user submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub text: String,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub options: AgentOptions,
}

impl SubmitRequest {
    pub fn new(text: impl Into<String>, target: Target) -> Self {
        Self {
            text: text.into(),
            target,
            options: AgentOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }
}

/// A validated submission holding the processing flag until dispatched.
pub struct AcceptedRequest {
    request: SubmitRequest,
    guard: ProcessingGuard,
}

impl AcceptedRequest {
    pub fn request(&self) -> &SubmitRequest {
        &self.request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every addressed stage ran; individual stages may still have failed.
    Settled { run: u64 },
    /// An error escaped the stages and was reported as a system message.
    Aborted,
}

#[derive(Clone)]
pub struct RequestRouter {
    store: Arc<SessionStore>,
    pipeline: Arc<dyn PipelineRunner>,
}

impl RequestRouter {
    pub fn new(store: Arc<SessionStore>, pipeline: Arc<dyn PipelineRunner>) -> Self {
        Self { store, pipeline }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn accept(&self, request: SubmitRequest) -> Result<AcceptedRequest, ValidationFailure> {
        if request.text.trim().is_empty() && request.options.image.is_none() {
            return Err(ValidationFailure::EmptyRequest);
        }
        let guard = self.store.try_begin_processing()?;
        self.store.append_message(Message::user(
            request.text.clone(),
            request.options.image.clone(),
        ));
        self.store.clear_pending_input();
        info!(target = %request.target, "request accepted");
        Ok(AcceptedRequest { request, guard })
    }

    pub async fn dispatch(&self, accepted: AcceptedRequest) -> RunOutcome {
        let AcceptedRequest { request, guard } = accepted;
        let outcome = match self
            .pipeline
            .run(&request.text, request.target, &request.options)
            .await
        {
            Ok(run) => RunOutcome::Settled { run },
            Err(err) => {
                error!(error = %err, "pipeline aborted");
                self.store.append_message(Message::system(SYSTEM_ERROR_TEXT));
                RunOutcome::Aborted
            }
        };
        drop(guard);
        outcome
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<RunOutcome, ValidationFailure> {
        let accepted = self.accept(request)?;
        Ok(self.dispatch(accepted).await)
    }
}
