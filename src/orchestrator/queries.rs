//! Read-side operations: status, content, downloads and health.

use crate::error::{Error, Result};
use crate::packager::PackedArchive;
use crate::types::{
    ContentView, DownloadFile, HealthStatus, Status, Task, TaskId, TaskStatusView,
};
use crate::utils::{attachment_disposition, dotted_extension, file_stem, media_type_for, sanitize_filename};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use super::Orchestrator;

impl Orchestrator {
    /// Fetch a task, treating one past its retention window as gone
    ///
    /// An expired task that the sweeper has not reached yet is removed on the
    /// spot, together with its files.
    pub async fn task(&self, id: TaskId) -> Result<Task> {
        let task = self.store.get(id).await?;
        if task.is_expired(Utc::now()) {
            self.expire_task(&task).await;
            return Err(Error::NotFound(id));
        }
        Ok(task)
    }

    /// Current status, progress and download link of a task
    pub async fn status(&self, id: TaskId) -> Result<TaskStatusView> {
        self.task(id).await.map(|task| TaskStatusView::from(&task))
    }

    /// Converted Markdown of a completed pdf-to-md task
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unknown or expired tasks
    /// - [`Error::NotReady`] unless the task is Completed with its output present
    /// - [`Error::NotSupported`] when the output is not Markdown
    pub async fn content(&self, id: TaskId) -> Result<ContentView> {
        let task = self.task(id).await?;
        let output = ready_output(&task)?;

        if dotted_extension(&output).as_deref() != Some(".md") {
            return Err(Error::NotSupported(
                "inline content is only available for Markdown output; use download".into(),
            ));
        }

        let bytes = self.read_artifact(&task, &output).await?;
        let content = String::from_utf8(bytes)
            .map_err(|_| Error::Conversion("converted Markdown is not valid UTF-8".into()))?;

        let size_bytes = content.len() as u64;
        Ok(ContentView {
            task_id: task.id,
            format: "gfm".to_string(),
            original_filename: task.original_filename.clone(),
            size_bytes,
            size_kb: (size_bytes as f64 / 1024.0 * 100.0).round() / 100.0,
            content,
        })
    }

    /// Converted file of a completed task, ready to send as an attachment
    pub async fn download(&self, id: TaskId) -> Result<DownloadFile> {
        let task = self.task(id).await?;
        let output = ready_output(&task)?;

        let extension = dotted_extension(&output).unwrap_or_default();
        let filename = format!(
            "{}{}",
            sanitize_filename(file_stem(&task.original_filename)),
            extension
        );
        let bytes = self.read_artifact(&task, &output).await?;

        tracing::debug!(task_id = %id, filename = %filename, size = bytes.len(), "serving download");

        Ok(DownloadFile {
            content_disposition: attachment_disposition(&filename),
            media_type: media_type_for(&extension),
            filename,
            bytes,
        })
    }

    /// ZIP of the outputs of several tasks
    ///
    /// Unknown, unfinished and expired tasks are skipped and listed in the
    /// archive's `skipped`; see [`BatchPackager::pack`](crate::packager::BatchPackager::pack).
    pub async fn download_batch(&self, ids: &[TaskId]) -> Result<PackedArchive> {
        let now = Utc::now();
        for &id in ids {
            if let Ok(task) = self.store.get(id).await {
                if task.is_expired(now) {
                    self.expire_task(&task).await;
                }
            }
        }
        self.packager.pack(ids).await
    }

    /// Liveness report
    pub async fn health(&self) -> HealthStatus {
        let status = if self.pool.accepting_new.load(Ordering::SeqCst) {
            "healthy"
        } else {
            "draining"
        };

        HealthStatus {
            status: status.to_string(),
            tasks: self.store.len().await,
            active_conversions: self.pool.active.load(Ordering::SeqCst),
            queued: self.pool.queued(),
            modes: self.registry.modes(),
        }
    }

    /// Snapshot of every task held, oldest first
    pub async fn list_tasks(&self) -> Vec<Task> {
        self.store.list().await
    }

    async fn read_artifact(&self, task: &Task, output: &Path) -> Result<Vec<u8>> {
        match self.files.read_output(output).await {
            Ok(bytes) => Ok(bytes),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotReady {
                id: task.id,
                status: task.status,
                reason: "output file is missing".to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Output path of a Completed task, or why there is none
fn ready_output(task: &Task) -> Result<PathBuf> {
    let reason = match task.status {
        Status::Completed => match &task.output_path {
            Some(path) => return Ok(path.clone()),
            None => "output file is missing".to_string(),
        },
        Status::Pending => "conversion has not started yet".to_string(),
        Status::Processing => format!("conversion in progress ({}%)", task.progress),
        Status::Failed => format!(
            "conversion failed: {}",
            task.error.as_deref().unwrap_or("unknown error")
        ),
    };

    Err(Error::NotReady {
        id: task.id,
        status: task.status,
        reason,
    })
}
