//! Key/value persistence of the file tree and UI theme.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::core::files::FileTree;
use crate::io::config::write_atomic;

pub const FILES_KEY: &str = "symbiotic_files";
pub const THEME_KEY: &str = "symbiotic_theme";

/// Storage of JSON values by key.
pub trait KeyValueStore: Send + Sync {
    fn save(&self, key: &str, value: &Value) -> Result<()>;
    /// `Ok(None)` when nothing was saved under `key`.
    fn load(&self, key: &str) -> Result<Option<Value>>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
        payload.push('\n');
        write_atomic(&self.path_for(key), &payload)
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let value =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(value))
    }
}

/// Load the saved file tree.
///
/// Anything unreadable is logged and replaced by the default tree.
pub fn load_files(store: &dyn KeyValueStore) -> FileTree {
    let value = match store.load(FILES_KEY) {
        Ok(Some(value)) => value,
        Ok(None) => return FileTree::default(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to load saved files, using defaults");
            return FileTree::default();
        }
    };
    match serde_json::from_value(value) {
        Ok(tree) => tree,
        Err(err) => {
            warn!(error = %err, "saved file tree is corrupt, using defaults");
            FileTree::default()
        }
    }
}

pub fn save_files(store: &dyn KeyValueStore, tree: &FileTree) -> Result<()> {
    let value = serde_json::to_value(tree).context("serialize file tree")?;
    store.save(FILES_KEY, &value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dark => "dark",
            Self::Light => "light",
        })
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    match store.load(THEME_KEY) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
        Ok(None) => Theme::default(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to load theme");
            Theme::default()
        }
    }
}

pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) -> Result<()> {
    store.save(THEME_KEY, &serde_json::to_value(theme).context("serialize theme")?)
}
