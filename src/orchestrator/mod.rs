//! Conversion orchestration split into focused submodules.
//!
//! The `Orchestrator` struct and its methods are organized by domain:
//! - [`submit`] - Validating, storing and queueing new conversions
//! - [`worker`] - Job dispatch and the per-task conversion state machine
//! - [`sweep`] - Retention sweep of expired tasks and orphaned files
//! - [`queries`] - Status, content, downloads and health
//! - [`lifecycle`] - Startup and shutdown coordination

mod lifecycle;
mod queries;
mod submit;
mod sweep;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::converter::ConverterRegistry;
use crate::error::Result;
use crate::packager::BatchPackager;
use crate::storage::FileManager;
use crate::store::TaskStore;
use crate::types::{Event, TaskId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// A queued conversion
#[derive(Debug, Clone, Copy)]
pub(crate) struct Job {
    pub(crate) id: TaskId,
}

/// Worker pool and queue state
#[derive(Clone)]
pub(crate) struct WorkerPool {
    /// Bounded submission queue (depth = queue_capacity)
    pub(crate) job_tx: mpsc::Sender<Job>,
    /// Receiving end, taken by the dispatcher when it starts
    pub(crate) job_rx: Arc<Mutex<Option<mpsc::Receiver<Job>>>>,
    /// Limits conversions running at once (max_concurrent_conversions)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Conversions currently running
    pub(crate) active: Arc<AtomicUsize>,
    /// Set to false during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops the dispatcher and sweeper
    pub(crate) shutdown_token: CancellationToken,
    /// Background tasks spawned by `start()`
    pub(crate) handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WorkerPool {
    fn new(max_concurrent: usize, queue_capacity: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel(queue_capacity);
        Self {
            job_tx,
            job_rx: Arc::new(Mutex::new(Some(job_rx))),
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent)),
            active: Arc::new(AtomicUsize::new(0)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Jobs waiting in the queue
    pub(crate) fn queued(&self) -> usize {
        self.job_tx.max_capacity() - self.job_tx.capacity()
    }
}

/// Main orchestrator handle (cloneable - all fields are Arc-wrapped)
///
/// Construct with [`Orchestrator::new`], call [`Orchestrator::start`] to spawn
/// the dispatcher and the retention sweeper, and [`Orchestrator::shutdown`]
/// to drain.
#[derive(Clone)]
pub struct Orchestrator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Task registry
    pub(crate) store: Arc<TaskStore>,
    /// Upload and output storage
    pub(crate) files: Arc<FileManager>,
    /// Mode → converter lookup
    pub(crate) registry: Arc<ConverterRegistry>,
    /// Batch ZIP builder
    pub(crate) packager: Arc<BatchPackager>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Queue and worker state
    pub(crate) pool: WorkerPool,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in converters
    ///
    /// This validates the configuration, creates both storage roots, and
    /// registers the pdf-to-md and md-to-pdf converters (see
    /// [`ConverterRegistry::with_defaults`]). Nothing runs until
    /// [`start`](Self::start) is called.
    pub async fn new(config: Config) -> Result<Self> {
        let registry = ConverterRegistry::with_defaults(&config.converters);
        Self::with_registry(config, registry).await
    }

    /// Create an orchestrator with a caller-supplied converter registry
    pub async fn with_registry(config: Config, registry: ConverterRegistry) -> Result<Self> {
        config.validate()?;

        let files = Arc::new(FileManager::new(&config.storage, &config.limits).await?);
        let store = Arc::new(TaskStore::new(config.retention.retention));
        let packager = Arc::new(BatchPackager::new(store.clone(), files.clone()));
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let pool = WorkerPool::new(
            config.workers.max_concurrent_conversions,
            config.workers.queue_capacity,
        );

        tracing::info!(
            upload_root = %files.upload_root().display(),
            output_root = %files.output_root().display(),
            workers = config.workers.max_concurrent_conversions,
            queue_capacity = config.workers.queue_capacity,
            modes = ?registry.modes(),
            "orchestrator created"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            files,
            registry: Arc::new(registry),
            packager,
            event_tx,
            pool,
        })
    }

    /// Subscribe to task lifecycle events
    ///
    /// Each subscriber receives every event sent after it subscribed. A
    /// subscriber that falls more than 1000 events behind gets
    /// `RecvError::Lagged` and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The converter registry in use
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// The file manager in use
    pub fn files(&self) -> &FileManager {
        &self.files
    }

    /// Emit an event; having no subscribers is fine
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
