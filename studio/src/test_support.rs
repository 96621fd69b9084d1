//! Test-only helpers: a scripted generative service, an in-memory key/value
//! store, and session builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use crate::core::artifact::Artifact;
use crate::core::generation::{GenerateRequest, GenerateResponse};
use crate::core::types::AgentRole;
use crate::error::NetworkFailure;
use crate::io::config::{StudioConfig, config_path, write_config};
use crate::io::generative::GenerativeService;
use crate::io::persistence::KeyValueStore;
use crate::io::prompt::{
    ARCHITECT_INSTRUCTION, DEVELOPER_CREATE_INSTRUCTION, DEVELOPER_EDIT_INSTRUCTION,
};
use crate::session::SessionStore;

/// Which stage produced a request, judged by its system instruction.
pub fn stage_of(request: &GenerateRequest) -> AgentRole {
    match request.config.system_instruction.as_deref() {
        Some(ARCHITECT_INSTRUCTION) => AgentRole::Architect,
        Some(DEVELOPER_EDIT_INSTRUCTION | DEVELOPER_CREATE_INSTRUCTION) => AgentRole::Developer,
        _ => AgentRole::Qa,
    }
}

/// A canned reply for one stage.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(GenerateResponse),
    Fail(String),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Respond(GenerateResponse::from_text(text))
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

type Hook = Box<dyn Fn(AgentRole, &GenerateRequest) + Send + Sync>;

/// Replays one scripted reply per stage and records every request.
///
/// Stages without a script fail with a [`NetworkFailure`].
#[derive(Default)]
pub struct ScriptedService {
    replies: HashMap<AgentRole, Reply>,
    requests: Mutex<Vec<GenerateRequest>>,
    hook: Option<Hook>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, role: AgentRole, reply: Reply) -> Self {
        self.replies.insert(role, reply);
        self
    }

    /// Run `hook` inside every call, before the reply is produced.
    pub fn on_call(mut self, hook: impl Fn(AgentRole, &GenerateRequest) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_for(&self, role: AgentRole) -> Vec<GenerateRequest> {
        self.requests()
            .into_iter()
            .filter(|request| stage_of(request) == role)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, NetworkFailure> {
        let role = stage_of(request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(hook) = &self.hook {
            hook(role, request);
        }
        match self.replies.get(&role) {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail(message)) => Err(NetworkFailure::with_status(500, message.clone())),
            None => Err(NetworkFailure::new(format!("no scripted reply for {role}"))),
        }
    }
}

/// Developer reply in the shape the model is asked for.
pub fn developer_json(filename: &str, content: &str, explanation: &str) -> String {
    let payload = serde_json::json!({
        "filename": filename,
        "content": content,
        "explanation": explanation,
    });
    format!("```json\n{payload}\n```")
}

/// Key/value store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

/// A session whose active artifact is `name` with a single history entry.
pub fn store_with_active(name: &str, content: &str) -> Arc<SessionStore> {
    let store = Arc::new(SessionStore::default());
    store.merge_developer_output(Artifact::generated(name, content), None, None);
    store.mark_saved();
    store
}

/// Temporary project directory holding `.studio/config.toml`.
pub fn project_with_config(cfg: &StudioConfig) -> TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(&config_path(temp.path()), cfg).expect("write config");
    temp
}
