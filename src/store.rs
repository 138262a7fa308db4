//! In-memory task registry
//!
//! [`TaskStore`] is the single source of truth for task status. Every read and
//! write goes through one `tokio::sync::Mutex` around the task map, so two
//! concurrent updates to the same task are applied one after the other and a
//! reader never observes a half-applied update.
//!
//! Task state is deliberately ephemeral: nothing here survives a restart.

use crate::error::{Error, Result};
use crate::types::{ConversionMode, Status, Task, TaskId, TaskUpdate};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;

/// Fallback retention when the configured window does not fit a chrono duration
const MAX_RETENTION_DAYS: i64 = 365 * 100;

/// Concurrency-safe registry of task records
pub struct TaskStore {
    tasks: Mutex<HashMap<TaskId, Task>>,
    retention: chrono::Duration,
}

impl TaskStore {
    /// Create an empty store whose tasks expire `retention` after creation
    pub fn new(retention: Duration) -> Self {
        let retention = chrono::Duration::from_std(retention)
            .unwrap_or_else(|_| chrono::Duration::days(MAX_RETENTION_DAYS));

        Self {
            tasks: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Allocate a new Pending task for an already-stored upload
    pub async fn create(
        &self,
        mode: ConversionMode,
        original_filename: impl Into<String>,
        input_path: PathBuf,
    ) -> Task {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut tasks = self.tasks.lock().await;

        let mut id = TaskId::new();
        while tasks.contains_key(&id) {
            id = TaskId::new();
        }

        let task = Task {
            id,
            mode,
            status: Status::Pending,
            progress: 0,
            original_filename: original_filename.into(),
            input_path,
            output_path: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            expires_at,
        };

        tasks.insert(id, task.clone());
        tracing::debug!(task_id = %id, mode = %task.mode, "task created");
        task
    }

    /// Apply a partial update and return the updated record
    ///
    /// - A status change must follow Pending → Processing → {Completed, Failed};
    ///   anything else (including any change to a terminal task) is rejected
    ///   with [`Error::InvalidTransition`] and leaves the record untouched
    /// - An error message without an explicit status implies Failed
    /// - Progress is clamped to 0..=100 and never decreases; it stays 0 while
    ///   Pending, is capped at 99 while Processing and becomes 100 on Completed
    pub async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<Task> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&id).ok_or(Error::NotFound(id))?;

        let next = match (update.status, &update.error) {
            (Some(status), _) => status,
            (None, Some(_)) => Status::Failed,
            (None, None) => task.status,
        };

        if task.status.is_terminal() || !task.status.can_transition_to(next) {
            tracing::error!(
                task_id = %id,
                from = %task.status,
                to = %next,
                "rejected non-monotonic status change"
            );
            return Err(Error::InvalidTransition {
                id,
                from: task.status,
                to: next,
            });
        }

        let requested = update.progress.unwrap_or(task.progress).min(100);
        task.progress = match next {
            Status::Pending => 0,
            Status::Processing => task.progress.max(requested.min(99)),
            Status::Completed => 100,
            Status::Failed => task.progress,
        };

        if let Some(output_path) = update.output_path {
            task.output_path = Some(output_path);
        }
        if next == Status::Failed {
            task.error = Some(
                update
                    .error
                    .unwrap_or_else(|| "conversion failed".to_string()),
            );
        }

        let now = Utc::now();
        task.status = next;
        task.updated_at = now;
        if next.is_terminal() {
            task.completed_at = Some(now);
        }

        Ok(task.clone())
    }

    /// Snapshot of one task
    pub async fn get(&self, id: TaskId) -> Result<Task> {
        self.tasks
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// All tasks whose retention window has elapsed at `now`
    ///
    /// Does not remove anything; the sweep deletes files first and records last.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|task| task.is_expired(now))
            .cloned()
            .collect()
    }

    /// Remove a task, returning it if it was present
    pub async fn delete(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().await.remove(&id)
    }

    /// Snapshot of every task, oldest first
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.lock().await.values().cloned().collect();
        tasks.sort_by_key(|task| task.created_at);
        tasks
    }

    /// Number of task records held
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether no tasks are held
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Every input and output path still owned by a task
    pub async fn referenced_paths(&self) -> HashSet<PathBuf> {
        let tasks = self.tasks.lock().await;
        let mut paths = HashSet::with_capacity(tasks.len() * 2);
        for task in tasks.values() {
            paths.insert(task.input_path.clone());
            if let Some(output) = &task.output_path {
                paths.insert(output.clone());
            }
        }
        paths
    }
}
