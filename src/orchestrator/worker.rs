//! Job dispatch and the per-task conversion state machine.

use crate::converter::ProgressReporter;
use crate::error::{Error, Result};
use crate::types::{Event, Task, TaskId, TaskUpdate};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{Job, Orchestrator};

/// Message recorded on a task when internal details must stay hidden
const INTERNAL_FAILURE_MESSAGE: &str = "internal error during conversion";

/// Decrements the active-conversion counter when dropped
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Orchestrator {
    /// Start the dispatcher task
    ///
    /// This method spawns a background task that continuously:
    /// 1. Waits for the next job in the submission queue
    /// 2. Acquires a permit from the concurrency limiter (respects max_concurrent_conversions)
    /// 3. Spawns a conversion task for that job
    /// 4. Repeats until shutdown
    ///
    /// Jobs are started in submission order. Only one dispatcher can run; a
    /// second call returns a task that exits immediately.
    pub fn start_dispatcher(&self) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        let token = self.pool.shutdown_token.clone();

        tokio::spawn(async move {
            let Some(mut job_rx) = orchestrator.pool.job_rx.lock().await.take() else {
                tracing::warn!("dispatcher already running");
                return;
            };
            tracing::debug!("dispatcher started");

            loop {
                let job = tokio::select! {
                    _ = token.cancelled() => break,
                    job = job_rx.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                };
                // Counted from dequeue so a drain never misses a job waiting for a permit
                let guard = ActiveGuard::new(orchestrator.pool.active.clone());

                let permit = tokio::select! {
                    _ = token.cancelled() => break,
                    permit = orchestrator.pool.concurrent_limit.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let worker = orchestrator.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let _guard = guard;
                    worker.run_conversion(job).await;
                });
            }

            tracing::debug!("dispatcher stopped");
        })
    }

    /// Drive one task from Pending to a terminal state
    ///
    /// Every outcome ends in Completed or Failed. Errors are recorded on the
    /// task, never propagated; a task swept away mid-conversion has its
    /// output removed.
    pub(crate) async fn run_conversion(&self, job: Job) {
        let task = match self.store.update(job.id, TaskUpdate::processing()).await {
            Ok(task) => task,
            Err(Error::NotFound(_)) => {
                tracing::warn!(task_id = %job.id, "task expired before conversion started");
                return;
            }
            Err(e) => {
                tracing::error!(task_id = %job.id, error = %e, "cannot start conversion");
                return;
            }
        };

        tracing::info!(task_id = %task.id, mode = %task.mode, "conversion started");
        self.emit(Event::Processing { id: task.id });

        match self.execute(&task).await {
            Ok(output) => self.finish_completed(task.id, output).await,
            Err(e) => self.finish_failed(&task, e).await,
        }
    }

    /// Resolve, validate, transform and verify; the status path is untouched here
    async fn execute(&self, task: &Task) -> Result<PathBuf> {
        let converter = self.registry.resolve(&task.mode)?;
        let descriptor = converter.descriptor();
        descriptor.validate_input(&task.input_path)?;

        let input = self
            .files
            .ensure_within(&task.input_path, self.files.upload_root())
            .await?;
        let output = self
            .files
            .resolve_output_path(&input, descriptor.output_extension)?;

        let (reporter, progress_rx) = ProgressReporter::channel();
        let done = CancellationToken::new();
        let forwarder = tokio::spawn(self.clone().forward_progress(task.id, progress_rx, done.clone()));

        let transform_output = output.clone();
        let result = tokio::spawn(async move {
            converter.transform(&input, &transform_output, &reporter).await
        })
        .await;

        done.cancel();
        if let Err(e) = forwarder.await {
            tracing::warn!(task_id = %task.id, error = %e, "progress forwarder failed");
        }

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                return Err(Error::Other(format!("converter task failed: {}", e)));
            }
        }

        if !self.files.output_exists(&output).await {
            return Err(Error::Conversion(
                "converter finished without producing an output file".to_string(),
            ));
        }

        Ok(output)
    }

    /// Copy reporter updates into the store and the event stream until `done`
    async fn forward_progress(
        self,
        id: TaskId,
        mut progress_rx: watch::Receiver<u8>,
        done: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => break,
                changed = progress_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let percent = *progress_rx.borrow_and_update();
                    match self.store.update(id, TaskUpdate::progress(percent)).await {
                        Ok(task) => self.emit(Event::Progress { id, percent: task.progress }),
                        Err(e) => {
                            tracing::debug!(task_id = %id, error = %e, "dropping progress update");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn finish_completed(&self, id: TaskId, output: PathBuf) {
        match self.store.update(id, TaskUpdate::completed(output.clone())).await {
            Ok(task) => {
                tracing::info!(
                    task_id = %id,
                    mode = %task.mode,
                    path = %output.display(),
                    "conversion completed"
                );
                self.emit(Event::Completed {
                    id,
                    output_path: output,
                });
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "task gone before completion was recorded, removing output");
                self.files.delete(&output).await;
            }
        }
    }

    async fn finish_failed(&self, task: &Task, error: Error) {
        tracing::error!(task_id = %task.id, mode = %task.mode, error = %error, "conversion failed");

        // Partial output from a failed transform is never served
        let partial = self
            .registry
            .descriptor(&task.mode)
            .and_then(|d| self.files.resolve_output_path(&task.input_path, d.output_extension));
        if let Ok(output) = partial {
            self.files.delete(&output).await;
        }

        let message = self.failure_message(&error);
        match self.store.update(task.id, TaskUpdate::failed(message.clone())).await {
            Ok(_) => self.emit(Event::Failed {
                id: task.id,
                error: message,
            }),
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "task gone before failure was recorded");
            }
        }
    }

    /// Message stored on a Failed task
    ///
    /// Conversion errors are always shown. Internal errors are replaced with a
    /// generic message in production.
    pub(crate) fn failure_message(&self, error: &Error) -> String {
        let internal = !matches!(
            error,
            Error::Conversion(_)
                | Error::ExternalTool(_)
                | Error::NotSupported(_)
                | Error::Validation(_)
                | Error::UnsupportedMode(_)
        );

        if internal && !self.config.exposes_internal_errors() {
            return INTERNAL_FAILURE_MESSAGE.to_string();
        }

        let message = error.to_string();
        if message.trim().is_empty() {
            INTERNAL_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}
