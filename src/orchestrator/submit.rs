//! Accepting new conversions.

use crate::error::{Error, Result};
use crate::types::{ConversionMode, Event, Task, UploadFile};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::error::TrySendError;

use super::{Job, Orchestrator};

impl Orchestrator {
    /// Submit one file for conversion
    ///
    /// Validates the upload, stores it, creates a Pending task and queues it,
    /// returning without waiting for the conversion. Poll [`status`](Self::status)
    /// or [`subscribe`](Self::subscribe) to follow it.
    ///
    /// # Errors
    ///
    /// Nothing is written and no task is created when this fails:
    /// - [`Error::UnsupportedMode`] if no converter is registered for `mode`
    /// - [`Error::Validation`] for a bad extension, signature, empty file or unsafe name
    /// - [`Error::QuotaExceeded`] if the file is over the per-file limit
    /// - [`Error::QueueFull`] if the queue is at capacity
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown) has begun
    pub async fn submit(&self, mode: ConversionMode, filename: &str, bytes: &[u8]) -> Result<Task> {
        self.ensure_accepting()?;

        let converter = self.registry.resolve(&mode)?;
        let descriptor = converter.descriptor();
        self.files.validate(filename, bytes, descriptor)?;

        let permit = self
            .pool
            .job_tx
            .try_reserve()
            .map_err(|e| self.queue_error(e))?;

        let stored = self.files.store(filename, bytes, descriptor).await?;
        let task = self.store.create(mode, filename, stored.path).await;

        self.announce(&task);
        permit.send(Job { id: task.id });

        Ok(task)
    }

    /// Submit several files for the same mode, all or nothing
    ///
    /// File count, aggregate size, and every file are checked, and queue
    /// space for the whole batch is reserved, before anything is written.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit), plus [`Error::QuotaExceeded`] for too
    /// many files or too many bytes in total.
    pub async fn submit_batch(&self, mode: ConversionMode, files: &[UploadFile]) -> Result<Vec<Task>> {
        self.ensure_accepting()?;

        let converter = self.registry.resolve(&mode)?;
        let descriptor = converter.descriptor();
        self.files.check_batch_quota(files)?;
        for file in files {
            self.files.validate(&file.filename, &file.bytes, descriptor)?;
        }

        if files.is_empty() {
            return Ok(Vec::new());
        }

        let permits = self
            .pool
            .job_tx
            .try_reserve_many(files.len())
            .map_err(|e| self.queue_error(e))?;

        let stored = self.files.store_batch(files, descriptor).await?;

        let mut tasks = Vec::with_capacity(files.len());
        for (file, stored) in files.iter().zip(stored) {
            tasks.push(self.store.create(mode.clone(), &file.filename, stored.path).await);
        }

        for (permit, task) in permits.zip(&tasks) {
            self.announce(task);
            permit.send(Job { id: task.id });
        }

        tracing::info!(mode = %mode, count = tasks.len(), "batch queued");
        Ok(tasks)
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.pool.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    fn queue_error(&self, error: TrySendError<()>) -> Error {
        match error {
            TrySendError::Full(()) => {
                let capacity = self.config.workers.queue_capacity;
                tracing::warn!(capacity, "conversion queue full, rejecting submission");
                Error::QueueFull { capacity }
            }
            TrySendError::Closed(()) => Error::ShuttingDown,
        }
    }

    fn announce(&self, task: &Task) {
        tracing::info!(
            task_id = %task.id,
            mode = %task.mode,
            filename = %task.original_filename,
            "conversion queued"
        );
        self.emit(Event::Queued {
            id: task.id,
            mode: task.mode.clone(),
            filename: task.original_filename.clone(),
        });
    }
}
