//! The session store: every piece of shared state behind one short-lived lock.
//!
//! Messages, tasks, the artifact store, the file tree, and the save status live
//! in a single [`Session`] guarded by a `std::sync::Mutex`. The lock is only
//! taken inside the methods below and is never held across an `.await`.
//! Presentation layers read snapshots and subscribe to [`SessionEvent`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::artifact::{Artifact, ArtifactStore};
use crate::core::files::{FileNode, FileTree};
use crate::core::history::HistoryLog;
use crate::core::tasks::{Progress, Task, TaskTracker};
use crate::core::types::{AgentRole, Message};
use crate::error::ValidationFailure;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Saved,
    Saving,
}

/// Cursor over the active artifact's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPosition {
    pub index: usize,
    pub len: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl HistoryPosition {
    fn of(history: &HistoryLog) -> Self {
        Self {
            index: history.index(),
            len: history.len(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
        }
    }
}

/// Change notifications for presentation layers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Message {
        message: Message,
    },
    /// A task was started or reached a terminal status.
    Task {
        task: Task,
    },
    Artifact {
        artifact: Option<Artifact>,
        history: HistoryPosition,
    },
    Files,
    SaveStatus {
        status: SaveStatus,
    },
    Processing {
        active: bool,
    },
}

#[derive(Debug, Default)]
struct Session {
    messages: Vec<Message>,
    tasks: TaskTracker,
    artifacts: ArtifactStore,
    files: FileTree,
    save_status: SaveStatus,
    pending_input: String,
}

impl Session {
    fn artifact_event(&self) -> SessionEvent {
        SessionEvent::Artifact {
            artifact: self.artifacts.active().cloned(),
            history: HistoryPosition::of(self.artifacts.history()),
        }
    }

    /// Copy the active artifact's content into the tree node of the same name.
    fn mirror_active_into_files(&mut self) {
        if let Some(active) = self.artifacts.active() {
            let (name, content) = (active.name.clone(), active.content.clone());
            self.files.replace_content(&name, &content);
        }
    }
}

/// Read-only view of the whole session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub tasks: Vec<Task>,
    pub active_artifact: Option<Artifact>,
    pub history: HistoryPosition,
    pub save_status: SaveStatus,
    pub processing: bool,
    pub progress: Progress,
    pub progress_percent: u8,
    pub files: FileTree,
    pub pending_input: String,
}

pub struct SessionStore {
    inner: Mutex<Session>,
    processing: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(FileTree::default())
    }
}

impl SessionStore {
    pub fn new(files: FileTree) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Session {
                files,
                ..Session::default()
            }),
            processing: AtomicBool::new(false),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_all(&self, events: Vec<SessionEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionView {
        let session = self.lock();
        let progress = session.tasks.progress();
        SessionView {
            messages: session.messages.clone(),
            tasks: session.tasks.tasks().to_vec(),
            active_artifact: session.artifacts.active().cloned(),
            history: HistoryPosition::of(session.artifacts.history()),
            save_status: session.save_status,
            processing: self.is_processing(),
            progress,
            progress_percent: progress.percent(),
            files: session.files.clone(),
            pending_input: session.pending_input.clone(),
        }
    }

    // Processing flag

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Claim the processing flag for one run.
    ///
    /// The flag is released when the returned guard drops, including on panic.
    pub fn try_begin_processing(self: &Arc<Self>) -> Result<ProcessingGuard, ValidationFailure> {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ValidationFailure::Busy)?;
        self.emit(SessionEvent::Processing { active: true });
        Ok(ProcessingGuard {
            store: Arc::clone(self),
        })
    }

    // Conversation

    pub fn append_message(&self, message: Message) {
        debug!(id = %message.id, sender = ?message.sender, "message appended");
        self.lock().messages.push(message.clone());
        self.emit(SessionEvent::Message { message });
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn set_pending_input(&self, text: impl Into<String>) {
        self.lock().pending_input = text.into();
    }

    pub fn pending_input(&self) -> String {
        self.lock().pending_input.clone()
    }

    pub fn clear_pending_input(&self) {
        self.lock().pending_input.clear();
    }

    // Tasks

    /// Open a new run; progress is reported over this run's tasks.
    pub fn begin_run(&self) -> u64 {
        self.lock().tasks.begin_run()
    }

    pub fn start_task(&self, title: &str, role: AgentRole) -> String {
        let (id, task) = {
            let mut session = self.lock();
            let id = session.tasks.start(title, role);
            let task = session.tasks.get(&id).cloned();
            (id, task)
        };
        if let Some(task) = task {
            self.emit(SessionEvent::Task { task });
        }
        id
    }

    pub fn complete_task(&self, task_id: &str) {
        self.finish_task(task_id, TaskTracker::complete);
    }

    pub fn fail_task(&self, task_id: &str) {
        self.finish_task(task_id, TaskTracker::fail);
    }

    fn finish_task(&self, task_id: &str, transition: fn(&mut TaskTracker, &str) -> bool) {
        let task = {
            let mut session = self.lock();
            if !transition(&mut session.tasks, task_id) {
                return;
            }
            session.tasks.get(task_id).cloned()
        };
        if let Some(task) = task {
            self.emit(SessionEvent::Task { task });
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.tasks().to_vec()
    }

    pub fn progress(&self) -> Progress {
        self.lock().tasks.progress()
    }

    // Artifact

    pub fn active_artifact(&self) -> Option<Artifact> {
        self.lock().artifacts.active().cloned()
    }

    /// Counter bumped whenever the active artifact is replaced or cleared.
    pub fn artifact_generation(&self) -> u64 {
        self.lock().artifacts.generation()
    }

    pub fn history_position(&self) -> HistoryPosition {
        HistoryPosition::of(self.lock().artifacts.history())
    }

    /// Merge developer output into the session.
    ///
    /// `edit_of` names the file an edit was made against. While that file is
    /// still active the edit is recorded in its history. Once another file is
    /// active the edit is written to the named file's tree node only; with
    /// nothing active it becomes the active artifact under that name. Output
    /// that is not an edit becomes the new active artifact and is upserted into
    /// the file tree. With `expected_generation` set, nothing is applied and
    /// `false` is returned if the active artifact changed meanwhile.
    pub fn merge_developer_output(
        &self,
        artifact: Artifact,
        edit_of: Option<&str>,
        expected_generation: Option<u64>,
    ) -> bool {
        let events = {
            let mut session = self.lock();
            if expected_generation.is_some_and(|g| g != session.artifacts.generation()) {
                return false;
            }
            let mut events = Vec::new();
            match edit_of {
                Some(name) if session.artifacts.active().is_some_and(|a| a.name == name) => {
                    session.artifacts.update(artifact.content);
                    session.mirror_active_into_files();
                    events.push(session.artifact_event());
                }
                Some(name) => {
                    let edited = Artifact {
                        name: name.to_string(),
                        ..artifact
                    };
                    if !session.files.replace_content(name, &edited.content) {
                        session.files.upsert(&edited);
                    }
                    if session.artifacts.active().is_none() {
                        session.artifacts.set_active(edited);
                        events.push(session.artifact_event());
                    }
                    debug!(file = %name, "edit merged into inactive file");
                }
                None => {
                    session.files.upsert(&artifact);
                    session.artifacts.set_active(artifact);
                    events.push(session.artifact_event());
                }
            }
            session.save_status = SaveStatus::Saving;
            events.push(SessionEvent::Files);
            events.push(SessionEvent::SaveStatus {
                status: SaveStatus::Saving,
            });
            events
        };
        self.emit_all(events);
        true
    }

    /// Manual edit of the active artifact. Returns `false` when nothing is active.
    pub fn edit_artifact(&self, content: &str) -> bool {
        let events = {
            let mut session = self.lock();
            if session.artifacts.update(content).is_none() {
                return false;
            }
            session.mirror_active_into_files();
            session.save_status = SaveStatus::Saving;
            vec![
                session.artifact_event(),
                SessionEvent::Files,
                SessionEvent::SaveStatus {
                    status: SaveStatus::Saving,
                },
            ]
        };
        self.emit_all(events);
        true
    }

    pub fn undo(&self) -> Option<Artifact> {
        self.step_history(ArtifactStore::undo)
    }

    pub fn redo(&self) -> Option<Artifact> {
        self.step_history(ArtifactStore::redo)
    }

    fn step_history(
        &self,
        step: fn(&mut ArtifactStore) -> Option<&Artifact>,
    ) -> Option<Artifact> {
        let (artifact, events) = {
            let mut session = self.lock();
            let artifact = step(&mut session.artifacts).cloned()?;
            session.mirror_active_into_files();
            session.save_status = SaveStatus::Saving;
            let events = vec![
                session.artifact_event(),
                SessionEvent::Files,
                SessionEvent::SaveStatus {
                    status: SaveStatus::Saving,
                },
            ];
            (artifact, events)
        };
        self.emit_all(events);
        Some(artifact)
    }

    /// Make the file named `name` active with a fresh single-entry history.
    pub fn select_file(&self, name: &str) -> Option<Artifact> {
        let (artifact, event) = {
            let mut session = self.lock();
            let artifact = session.files.find_file(name).and_then(FileNode::to_artifact)?;
            session.artifacts.set_active(artifact.clone());
            (artifact, session.artifact_event())
        };
        self.emit(event);
        Some(artifact)
    }

    pub fn close_artifact(&self) {
        let event = {
            let mut session = self.lock();
            session.artifacts.clear();
            session.artifact_event()
        };
        self.emit(event);
    }

    // Files and saving

    pub fn files(&self) -> FileTree {
        self.lock().files.clone()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.lock().save_status
    }

    /// Mark the session unsaved so the autosaver writes it.
    pub fn request_save(&self) {
        self.lock().save_status = SaveStatus::Saving;
        self.emit(SessionEvent::SaveStatus {
            status: SaveStatus::Saving,
        });
    }

    pub fn mark_saved(&self) {
        self.lock().save_status = SaveStatus::Saved;
        self.emit(SessionEvent::SaveStatus {
            status: SaveStatus::Saved,
        });
    }
}

/// Holds the processing flag for the duration of one run.
pub struct ProcessingGuard {
    store: Arc<SessionStore>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.store.processing.store(false, Ordering::SeqCst);
        self.store.emit(SessionEvent::Processing { active: false });
    }
}
