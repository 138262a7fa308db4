//! Startup and shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Orchestrator;

/// How often shutdown re-checks the queue and running conversions
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl Orchestrator {
    /// Spawn the dispatcher and the retention sweeper
    ///
    /// Submissions made before `start` wait in the queue and are picked up
    /// once the dispatcher runs.
    pub async fn start(&self) {
        let dispatcher = self.start_dispatcher();
        let sweeper = self.start_sweeper();

        let mut handles = self.pool.handles.lock().await;
        handles.push(dispatcher);
        handles.push(sweeper);

        tracing::info!("orchestrator started");
    }

    /// Gracefully shut down the orchestrator
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions (`ShuttingDown`)
    /// 2. Waits for queued and running conversions, up to `shutdown_timeout`
    /// 3. Stops the dispatcher and the sweeper
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Conversions still running when the timeout expires are not cancelled;
    /// queued ones stay Pending. Task state is in-memory only, so nothing
    /// needs persisting.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new conversions
        self.pool.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new conversions");

        // 2. Drain the queue and in-flight conversions with timeout
        let timeout = self.config.workers.shutdown_timeout;
        match tokio::time::timeout(timeout, self.wait_for_drain()).await {
            Ok(()) => tracing::info!("All conversions finished"),
            Err(_) => tracing::warn!(
                queued = self.pool.queued(),
                active = self.pool.active.load(Ordering::SeqCst),
                "Timeout waiting for conversions to finish, proceeding with shutdown"
            ),
        }

        // 3. Stop background tasks
        self.pool.shutdown_token.cancel();
        let handles: Vec<_> = self.pool.handles.lock().await.drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }

        // 4. Emit shutdown event
        self.emit(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until the queue is empty and no conversion is running
    ///
    /// Without a running dispatcher queued jobs never drain, so only
    /// running conversions are waited for.
    async fn wait_for_drain(&self) {
        let dispatcher_running = self.pool.job_rx.lock().await.is_none();

        loop {
            let queued = if dispatcher_running { self.pool.queued() } else { 0 };
            let active = self.pool.active.load(Ordering::SeqCst);

            if queued == 0 && active == 0 {
                return;
            }

            tracing::debug!(queued, active, "Waiting for conversions to finish");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Whether new submissions are still accepted
    pub fn is_accepting(&self) -> bool {
        self.pool.accepting_new.load(Ordering::SeqCst)
    }
}
