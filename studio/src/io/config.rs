//! Studio configuration stored under `.studio/config.toml`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::capability::ModelTiers;

/// Directory holding config and persisted session data, relative to the project root.
pub const STUDIO_DIR: &str = ".studio";

/// `.studio/config.toml` under `root`.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(STUDIO_DIR).join("config.toml")
}

/// `.studio/store` under `root`, where persisted keys live.
pub fn store_dir(root: &Path) -> PathBuf {
    root.join(STUDIO_DIR).join("store")
}

/// Studio configuration (TOML).
///
/// Missing fields take the defaults below, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StudioConfig {
    /// Characters of code the QA stage reviews.
    pub qa_review_chars: usize,

    /// What to do with developer output when the active artifact changed mid-run.
    pub stale_results: StaleResultPolicy,

    /// Quiet period before an unsaved file tree is written.
    pub autosave_debounce_ms: u64,

    pub models: ModelTiers,

    pub api: ApiConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            qa_review_chars: 2000,
            stale_results: StaleResultPolicy::Apply,
            autosave_debounce_ms: 1000,
            models: ModelTiers::default(),
            api: ApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; the model name and `:generateContent` are appended.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Handling of developer output that finishes after the active artifact was
/// replaced or closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleResultPolicy {
    /// Apply the result to whatever is active now.
    #[default]
    Apply,
    /// Fail the developer task and leave the artifact untouched.
    Discard,
}

impl fmt::Display for StaleResultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Apply => "apply",
            Self::Discard => "discard",
        })
    }
}

impl StudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.qa_review_chars == 0 {
            return Err(anyhow!("qa_review_chars must be > 0"));
        }
        if self.autosave_debounce_ms == 0 {
            return Err(anyhow!("autosave_debounce_ms must be > 0"));
        }
        if self.models.default_model.trim().is_empty() {
            return Err(anyhow!("models.default_model must be non-empty"));
        }
        if self.models.advanced_model.trim().is_empty() {
            return Err(anyhow!("models.advanced_model must be non-empty"));
        }
        if self.models.thinking_budget == 0 {
            return Err(anyhow!("models.thinking_budget must be > 0"));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(anyhow!("api.base_url must be non-empty"));
        }
        if self.api.api_key_env.trim().is_empty() {
            return Err(anyhow!("api.api_key_env must be non-empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(anyhow!("api.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StudioConfig::default()`.
pub fn load_config(path: &Path) -> Result<StudioConfig> {
    if !path.exists() {
        let cfg = StudioConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StudioConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StudioConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename over it.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, contents).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Options for `init_studio`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite an existing config file.
    pub force: bool,
}

/// Write the default config under `root`. Fails if one exists unless forced.
pub fn init_studio(root: &Path, options: &InitOptions) -> Result<PathBuf> {
    let path = config_path(root);
    if path.exists() && !options.force {
        return Err(anyhow!(
            "studio init: {} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    write_config(&path, &StudioConfig::default())?;
    fs::create_dir_all(store_dir(root))
        .with_context(|| format!("create directory {}", store_dir(root).display()))?;
    Ok(path)
}
