//! Retention sweep.

use crate::types::{Event, Task};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::time::Duration;

use super::Orchestrator;

/// Expired tasks whose files are deleted at the same time
const SWEEP_CONCURRENCY: usize = 8;

impl Orchestrator {
    /// Remove every task whose retention window has elapsed, with its files
    ///
    /// Files are deleted before the record, so a task is never visible
    /// without the files it points at being either present or already gone.
    /// Deletion is best-effort: a file that is already missing does not stop
    /// the record from being removed. When orphan sweeping is enabled,
    /// unreferenced files older than the retention window are removed too.
    ///
    /// Returns the number of tasks removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired = self.store.list_expired(Utc::now()).await;

        let removed = stream::iter(expired)
            .map(|task| {
                let orchestrator = self.clone();
                async move { orchestrator.expire_task(&task).await }
            })
            .buffer_unordered(SWEEP_CONCURRENCY)
            .filter(|removed| futures::future::ready(*removed))
            .count()
            .await;

        if removed > 0 {
            tracing::info!(count = removed, "swept expired tasks");
        }

        if self.config.retention.sweep_orphans {
            let referenced = self.store.referenced_paths().await;
            self.files
                .sweep_orphans(self.config.retention.retention, &referenced)
                .await;
        }

        removed
    }

    /// Delete one task's files then its record; false if another sweep got there first
    ///
    /// `task` may be a stale snapshot: a conversion can finish between the
    /// snapshot and the delete, so the removed record's paths are deleted too.
    pub(crate) async fn expire_task(&self, task: &Task) -> bool {
        self.files.delete(&task.input_path).await;
        if let Some(output) = &task.output_path {
            self.files.delete(output).await;
        }

        match self.store.delete(task.id).await {
            Some(removed) => {
                if removed.input_path != task.input_path {
                    self.files.delete(&removed.input_path).await;
                }
                if let Some(output) = &removed.output_path
                    && task.output_path.as_ref() != Some(output)
                {
                    self.files.delete(output).await;
                }

                tracing::debug!(task_id = %task.id, status = %removed.status, "task expired");
                self.emit(Event::Expired { id: task.id });
                true
            }
            None => false,
        }
    }

    /// Start the periodic retention sweeper
    ///
    /// Runs [`sweep_expired`](Self::sweep_expired) every `sweep_interval`
    /// until shutdown. The first sweep happens one interval after start.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        let token = self.pool.shutdown_token.clone();
        let period = self.config.retention.sweep_interval.max(Duration::from_millis(10));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::debug!(interval_secs = period.as_secs(), "sweeper started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        orchestrator.sweep_expired().await;
                    }
                }
            }

            tracing::debug!("sweeper stopped");
        })
    }
}
