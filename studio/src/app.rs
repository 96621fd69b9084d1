//! Wiring of config, persistence, session, pipeline and router for one project.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::artifact::Artifact;
use crate::core::tasks::{Task, TaskStatus};
use crate::core::types::{ImagePayload, Message, Sender};
use crate::io::autosave::{save_now, spawn_autosave};
use crate::io::config::{StudioConfig, config_path, load_config, store_dir};
use crate::io::generative::{GeminiClient, GenerativeService};
use crate::io::persistence::{FileStore, Theme, load_files, load_theme, save_theme};
use crate::pipeline::{AgentPipeline, PipelineSettings};
use crate::router::RequestRouter;
use crate::session::{SaveStatus, SessionStore};

/// A loaded project: config plus a live session over its saved files.
pub struct Studio {
    config: StudioConfig,
    kv: Arc<FileStore>,
    store: Arc<SessionStore>,
    router: RequestRouter,
}

impl Studio {
    /// Open `root` with the Gemini client configured in `.studio/config.toml`.
    pub fn open(root: &Path) -> Result<Self> {
        let config = load_config(&config_path(root))?;
        let client = GeminiClient::from_config(&config.api).context("create gemini client")?;
        Self::with_service(root, config, Arc::new(client))
    }

    /// Open `root` with an explicit generative service.
    pub fn with_service(
        root: &Path,
        config: StudioConfig,
        service: Arc<dyn GenerativeService>,
    ) -> Result<Self> {
        config.validate()?;
        let kv = Arc::new(FileStore::new(store_dir(root)));
        let store = Arc::new(SessionStore::new(load_files(kv.as_ref())));
        let pipeline = AgentPipeline::new(
            service,
            Arc::clone(&store),
            PipelineSettings::from(&config),
        );
        let router = RequestRouter::new(Arc::clone(&store), Arc::new(pipeline));
        debug!(root = %root.display(), "studio opened");
        Ok(Self {
            config,
            kv,
            store,
            router,
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    /// Make a saved file the active artifact.
    pub fn open_file(&self, name: &str) -> Result<Artifact> {
        self.store
            .select_file(name)
            .ok_or_else(|| anyhow!("no file named {name} (see `studio files`)"))
    }

    /// Write the file tree if the session has unsaved changes.
    pub fn save_if_dirty(&self) -> Result<()> {
        if self.store.save_status() == SaveStatus::Saving {
            self.save()?;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        save_now(&self.store, self.kv.as_ref())
            .with_context(|| format!("save files under {}", self.kv.dir().display()))
    }

    pub fn theme(&self) -> Theme {
        load_theme(self.kv.as_ref())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        save_theme(self.kv.as_ref(), theme).context("save theme")
    }

    pub fn spawn_autosave(&self) -> JoinHandle<()> {
        spawn_autosave(
            Arc::clone(&self.store),
            self.kv.clone(),
            self.config.autosave_debounce(),
        )
    }
}

/// Read an image file to attach to a request.
pub fn load_image(path: &Path) -> Result<ImagePayload> {
    let mime_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => return Err(anyhow!("unsupported image type: {}", path.display())),
    };
    let bytes = std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    Ok(ImagePayload::from_bytes(mime_type, &bytes))
}

/// Plain-text rendering of a message for terminals.
pub fn render_message(message: &Message) -> String {
    let speaker = match (message.sender, message.agent_role) {
        (Sender::User, _) => "you".to_string(),
        (Sender::System, _) => "system".to_string(),
        (Sender::Agent, Some(role)) => role.to_string(),
        (Sender::Agent, None) => "agent".to_string(),
    };
    let mut out = format!("[{speaker}] {}", message.text);
    if message.attachment.is_some() {
        out.push_str("\n  (image attached)");
    }
    for citation in message.grounding_urls.iter().flatten() {
        out.push_str(&format!("\n  - {} <{}>", citation.title, citation.uri));
    }
    out
}

pub fn render_task(task: &Task) -> String {
    let mark = match task.status {
        TaskStatus::Pending => "pending",
        TaskStatus::Active => "active",
        TaskStatus::Completed => "done",
        TaskStatus::Failed => "FAILED",
    };
    format!("{mark:>7}  {} ({})", task.title, task.assigned_to)
}
