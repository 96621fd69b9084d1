//! Append-only task log with a small status state machine.
//!
//! A task is created `active` when its stage begins and moves exactly once to
//! `completed` or `failed`. Terminal states never revert and tasks are never
//! removed, so the list doubles as the session's history of stage outcomes.

use serde::{Deserialize, Serialize};

use crate::core::types::{AgentRole, new_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub assigned_to: AgentRole,
    /// Pipeline run that created this task (1-indexed).
    pub run: u64,
}

/// Completion ratio over one run's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Rounded percentage, `0` for an empty run.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskTracker {
    tasks: Vec<Task>,
    current_run: u64,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new run; later `start` calls are attributed to it.
    pub fn begin_run(&mut self) -> u64 {
        self.current_run += 1;
        self.current_run
    }

    /// Append an `active` task and return its id.
    pub fn start(&mut self, title: impl Into<String>, role: AgentRole) -> String {
        let id = new_id();
        self.tasks.push(Task {
            id: id.clone(),
            title: title.into(),
            status: TaskStatus::Active,
            assigned_to: role,
            run: self.current_run,
        });
        id
    }

    /// Mark `task_id` completed. Returns `false` if unknown or already terminal.
    pub fn complete(&mut self, task_id: &str) -> bool {
        self.finish(task_id, TaskStatus::Completed)
    }

    /// Mark `task_id` failed. Returns `false` if unknown or already terminal.
    pub fn fail(&mut self, task_id: &str) -> bool {
        self.finish(task_id, TaskStatus::Failed)
    }

    fn finish(&mut self, task_id: &str, status: TaskStatus) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) if !task.status.is_terminal() => {
                task.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// All tasks of the session in creation order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn run_tasks(&self, run: u64) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.run == run)
    }

    /// Progress of the most recent run.
    pub fn progress(&self) -> Progress {
        let (completed, total) = self
            .run_tasks(self.current_run)
            .fold((0, 0), |(done, total), task| {
                let done = done + usize::from(task.status == TaskStatus::Completed);
                (done, total + 1)
            });
        Progress { completed, total }
    }
}
