//! The architect → developer → qa pipeline.
//!
//! Stages run sequentially and each suspends at most once, on its service call.
//! A stage that fails records a failed task and the run moves on; only prompt
//! rendering errors escape as [`PipelineError`].

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::core::artifact::Artifact;
use crate::core::capability::{
    Capability, ModelChoice, ModelTiers, architect_capability, developer_capability,
};
use crate::core::generation::{Contents, GenerateConfig, GenerateRequest, GenerateResponse, Part};
use crate::core::response::{DeveloperOutput, parse_developer_output};
use crate::core::rules::is_edit_request;
use crate::core::templates::match_template;
use crate::core::types::{AgentOptions, AgentRole, Message, Target};
use crate::error::{PipelineError, StageError};
use crate::io::config::{StaleResultPolicy, StudioConfig};
use crate::io::generative::GenerativeService;
use crate::io::prompt::{
    ARCHITECT_INSTRUCTION, DEVELOPER_CREATE_INSTRUCTION, DEVELOPER_EDIT_INSTRUCTION,
    JSON_MIME_TYPE, PromptEngine,
};
use crate::session::SessionStore;

pub const TITLE_RESEARCH: &str = "Research & Planning";
pub const TITLE_ARCHITECTURE: &str = "Architecture Planning";
pub const TITLE_REFACTOR: &str = "Code Refactoring";
pub const TITLE_IMPLEMENT: &str = "Component Implementation";
pub const TITLE_QA: &str = "Quality Assurance";

/// The parts of [`StudioConfig`] the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub models: ModelTiers,
    pub qa_review_chars: usize,
    pub stale_results: StaleResultPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&StudioConfig::default())
    }
}

impl From<&StudioConfig> for PipelineSettings {
    fn from(cfg: &StudioConfig) -> Self {
        Self {
            models: cfg.models.clone(),
            qa_review_chars: cfg.qa_review_chars,
            stale_results: cfg.stale_results,
        }
    }
}

/// What the developer stage will do, decided before its task starts.
enum DeveloperPlan {
    Template(DeveloperOutput),
    Generate(GenerateRequest),
}

pub struct AgentPipeline {
    service: Arc<dyn GenerativeService>,
    store: Arc<SessionStore>,
    prompts: PromptEngine,
    settings: PipelineSettings,
}

impl AgentPipeline {
    pub fn new(
        service: Arc<dyn GenerativeService>,
        store: Arc<SessionStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            service,
            store,
            prompts: PromptEngine::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run every stage `target` addresses, in order. Returns the run number.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn run(
        &self,
        text: &str,
        target: Target,
        options: &AgentOptions,
    ) -> Result<u64, PipelineError> {
        let run = self.store.begin_run();
        // Edits and QA see the artifact as it was when the request arrived.
        let current = self.store.active_artifact();
        let generation = self.store.artifact_generation();
        info!(run, has_artifact = current.is_some(), "pipeline run started");

        let mut plan = String::new();
        if target.includes(AgentRole::Architect) {
            plan = self.architect(text, options).await?.unwrap_or_default();
        }

        let mut generated = None;
        if target.includes(AgentRole::Developer) {
            generated = self
                .developer(text, options, &plan, current.as_ref(), generation)
                .await?;
        }

        if target.includes(AgentRole::Qa) {
            let code = generated
                .as_deref()
                .filter(|code| !code.is_empty())
                .or_else(|| {
                    current
                        .as_ref()
                        .map(|artifact| artifact.content.as_str())
                        .filter(|code| !code.is_empty())
                });
            match code {
                Some(code) => self.qa(code).await?,
                None => debug!("nothing to review, qa skipped"),
            }
        }

        info!(run, "pipeline run settled");
        Ok(run)
    }

    /// Returns the plan, or `None` when the stage failed.
    async fn architect(
        &self,
        text: &str,
        options: &AgentOptions,
    ) -> Result<Option<String>, PipelineError> {
        let role = AgentRole::Architect;
        let prompt = self
            .prompts
            .render_architect(text, options.image.is_some())
            .map_err(|source| PipelineError::Prompt {
                stage: role,
                source,
            })?;
        let contents = match &options.image {
            Some(image) => Contents::Parts(vec![Part::Text(prompt), Part::InlineImage(image.clone())]),
            None => Contents::Text(prompt),
        };
        let capability = architect_capability(options);
        debug!(?capability, "architect capability selected");
        let request = build_request(
            self.settings.models.resolve(capability),
            contents,
            Some(ARCHITECT_INSTRUCTION),
            None,
        );
        let title = if options.use_search {
            TITLE_RESEARCH
        } else {
            TITLE_ARCHITECTURE
        };

        let task_id = self.store.start_task(title, role);
        match self.call(role, &request).await {
            Ok(response) => {
                let citations = response.citations();
                self.store
                    .append_message(Message::agent(role, response.text.clone()).with_citations(citations));
                self.store.complete_task(&task_id);
                Ok(Some(response.text))
            }
            Err(err) => {
                self.stage_failed(role, &task_id, &err);
                Ok(None)
            }
        }
    }

    /// Returns the generated content, or `None` when the stage failed.
    async fn developer(
        &self,
        text: &str,
        options: &AgentOptions,
        plan: &str,
        current: Option<&Artifact>,
        generation: u64,
    ) -> Result<Option<String>, PipelineError> {
        let role = AgentRole::Developer;
        let edit = is_edit_request(current.is_some(), text);
        let title = if edit { TITLE_REFACTOR } else { TITLE_IMPLEMENT };

        let template = match_template(text).filter(|_| !edit && !options.use_thinking);
        let work = match template {
            Some(template) => DeveloperPlan::Template(DeveloperOutput {
                filename: template.filename.to_string(),
                content: template.content.to_string(),
                explanation: template.explanation(),
            }),
            None => {
                let render = match current.filter(|_| edit) {
                    Some(artifact) => self.prompts.render_developer_edit(&artifact.content, text),
                    None => self.prompts.render_developer_create(plan, text),
                };
                let prompt = render.map_err(|source| PipelineError::Prompt {
                    stage: role,
                    source,
                })?;
                let instruction = if edit {
                    DEVELOPER_EDIT_INSTRUCTION
                } else {
                    DEVELOPER_CREATE_INSTRUCTION
                };
                DeveloperPlan::Generate(build_request(
                    self.settings.models.resolve(developer_capability(options)),
                    Contents::Text(prompt),
                    Some(instruction),
                    Some(JSON_MIME_TYPE),
                ))
            }
        };

        let task_id = self.store.start_task(title, role);
        let output = match work {
            DeveloperPlan::Template(output) => {
                debug!(filename = %output.filename, "serving built-in template");
                output
            }
            DeveloperPlan::Generate(request) => {
                let parsed = match self.call(role, &request).await {
                    Ok(response) => parse_developer_output(&response.text).map_err(StageError::from),
                    Err(err) => Err(err),
                };
                match parsed {
                    Ok(output) => output,
                    Err(err) => {
                        self.stage_failed(role, &task_id, &err);
                        return Ok(None);
                    }
                }
            }
        };

        let expected_generation =
            (self.settings.stale_results == StaleResultPolicy::Discard).then_some(generation);
        let edit_of = current.filter(|_| edit).map(|artifact| artifact.name.as_str());
        let artifact = Artifact::generated(output.filename, output.content.clone());
        if !self
            .store
            .merge_developer_output(artifact, edit_of, expected_generation)
        {
            self.stage_failed(role, &task_id, &StageError::Stale);
            return Ok(None);
        }
        self.store
            .append_message(Message::agent(role, output.explanation));
        self.store.complete_task(&task_id);
        Ok(Some(output.content))
    }

    async fn qa(&self, code: &str) -> Result<(), PipelineError> {
        let role = AgentRole::Qa;
        let prompt = self
            .prompts
            .render_qa(code, self.settings.qa_review_chars)
            .map_err(|source| PipelineError::Prompt {
                stage: role,
                source,
            })?;
        let request = build_request(
            self.settings.models.resolve(Capability::Standard),
            Contents::Text(prompt),
            None,
            None,
        );

        let task_id = self.store.start_task(TITLE_QA, role);
        match self.call(role, &request).await {
            Ok(response) => {
                self.store.append_message(Message::agent(role, response.text));
                self.store.complete_task(&task_id);
            }
            Err(err) => self.stage_failed(role, &task_id, &err),
        }
        Ok(())
    }

    #[instrument(skip_all, fields(stage = %role, model = %request.model))]
    async fn call(
        &self,
        role: AgentRole,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StageError> {
        let response = self.service.generate(request).await?;
        debug!(chars = response.text.len(), "stage response received");
        Ok(response)
    }

    fn stage_failed(&self, role: AgentRole, task_id: &str, err: &StageError) {
        warn!(stage = %role, task = %task_id, error = %err, "stage failed");
        self.store.fail_task(task_id);
    }
}

fn build_request(
    choice: ModelChoice,
    contents: Contents,
    system_instruction: Option<&str>,
    response_mime_type: Option<&str>,
) -> GenerateRequest {
    GenerateRequest {
        model: choice.model,
        contents,
        config: GenerateConfig {
            system_instruction: system_instruction.map(str::to_string),
            tools: choice.tools,
            thinking_config: choice.thinking,
            response_mime_type: response_mime_type.map(str::to_string),
        },
    }
}
