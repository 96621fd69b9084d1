//! The single active artifact and its edit history.

use serde::{Deserialize, Serialize};

use crate::core::history::HistoryLog;

/// Language tag given to generated components.
pub const DEFAULT_LANGUAGE: &str = "typescript";

/// A generated or edited code file under session management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    pub language: String,
    pub content: String,
    /// Set for artifacts produced by the developer stage.
    pub is_new: bool,
}

impl Artifact {
    pub fn generated(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            content: content.into(),
            is_new: true,
        }
    }
}

/// Owns the active artifact and its history log.
///
/// `generation` increases whenever the active artifact is replaced or
/// cleared, so callers can tell whether a result computed against an earlier
/// artifact is stale.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    active: Option<Artifact>,
    history: HistoryLog,
    generation: u64,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active artifact and reset history to its current content.
    pub fn set_active(&mut self, artifact: Artifact) {
        self.history = HistoryLog::seeded(artifact.content.clone());
        self.active = Some(artifact);
        self.generation += 1;
    }

    /// Deselect the active artifact.
    pub fn clear(&mut self) {
        self.active = None;
        self.history = HistoryLog::default();
        self.generation += 1;
    }

    /// Record `content` as a new snapshot of the active artifact.
    ///
    /// Returns the updated artifact, or `None` when nothing is active.
    pub fn update(&mut self, content: impl Into<String>) -> Option<&Artifact> {
        let active = self.active.as_mut()?;
        let content = content.into();
        self.history.record(content.clone());
        active.content = content;
        Some(active)
    }

    /// Restore the previous snapshot. `None` at the oldest entry or when inactive.
    pub fn undo(&mut self) -> Option<&Artifact> {
        let active = self.active.as_mut()?;
        let snapshot = self.history.undo()?;
        active.content = snapshot.to_string();
        Some(active)
    }

    /// Restore the next snapshot. `None` at the newest entry or when inactive.
    pub fn redo(&mut self) -> Option<&Artifact> {
        let active = self.active.as_mut()?;
        let snapshot = self.history.redo()?;
        active.content = snapshot.to_string();
        Some(active)
    }

    pub fn active(&self) -> Option<&Artifact> {
        self.active.as_ref()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
