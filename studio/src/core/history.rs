//! Linear undo/redo log of artifact content snapshots.
//!
//! There is no redo tree: recording a snapshot while the cursor is behind the
//! newest entry first discards everything after the cursor.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    fn now(content: String) -> Self {
        Self {
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered snapshots plus a cursor.
///
/// Invariant: when `entries` is non-empty, `index < entries.len()`.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl HistoryLog {
    /// A log holding exactly one snapshot.
    pub fn seeded(content: impl Into<String>) -> Self {
        Self {
            entries: vec![HistoryEntry::now(content.into())],
            index: 0,
        }
    }

    /// Append a snapshot after dropping any entries past the cursor.
    pub fn record(&mut self, content: impl Into<String>) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(HistoryEntry::now(content.into()));
        self.index = self.entries.len() - 1;
    }

    /// Step back one entry and return its snapshot, or `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(self.entries[self.index].content.as_str())
    }

    /// Step forward one entry and return its snapshot, or `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(self.entries[self.index].content.as_str())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
