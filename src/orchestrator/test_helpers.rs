//! Shared test helpers for creating Orchestrator instances in tests.

use crate::config::{Config, Environment};
use crate::converter::{
    Converter, ConverterCapabilities, ConverterDescriptor, ConverterRegistry, ProgressReporter,
};
use crate::error::{Error, Result};
use crate::orchestrator::Orchestrator;
use crate::types::{Event, Status, Task, TaskId};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{Semaphore, broadcast};

/// Minimal PDF accepted by the signature check
pub(crate) const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n%%EOF\n";

/// Markdown accepted by the text check
pub(crate) const SAMPLE_MD: &[u8] = b"# Notes\n\nSome *converted* text.\n";

/// What a succeeding fake writes for pdf-to-md
pub(crate) const RENDERED_MD: &[u8] = b"# Converted\n\nBody text.\n";

/// What a succeeding fake writes for md-to-pdf
pub(crate) const RENDERED_PDF: &[u8] = b"%PDF-1.4 rendered\n";

/// What a [`FakeConverter`] does when asked to transform
#[derive(Clone)]
pub(crate) enum Behavior {
    /// Write a plausible output for the mode, reporting progress on the way
    Succeed,
    /// Fail with a conversion error carrying this message
    Fail(&'static str),
    /// Fail with an internal (non-conversion) error
    InternalError(&'static str),
    /// Write a partial output, then fail
    FailAfterPartialOutput,
    /// Return Ok without writing anything
    NoOutput,
    /// Panic inside the transform
    Panic,
    /// Wait for a permit on the gate before succeeding
    Gated(Arc<Semaphore>),
}

/// Scripted converter that never touches an external tool
pub(crate) struct FakeConverter {
    descriptor: ConverterDescriptor,
    behavior: Behavior,
}

impl FakeConverter {
    pub(crate) fn new(descriptor: ConverterDescriptor, behavior: Behavior) -> Self {
        Self {
            descriptor,
            behavior,
        }
    }
}

#[async_trait]
impl Converter for FakeConverter {
    fn descriptor(&self) -> &ConverterDescriptor {
        &self.descriptor
    }

    async fn transform(
        &self,
        _input: &Path,
        output: &Path,
        progress: &ProgressReporter,
    ) -> Result<()> {
        match &self.behavior {
            Behavior::Succeed => {
                progress.report(40);
                progress.report(80);
                let contents: &[u8] = if self.descriptor.output_extension == ".pdf" {
                    RENDERED_PDF
                } else {
                    RENDERED_MD
                };
                tokio::fs::write(output, contents).await?;
                Ok(())
            }
            Behavior::Fail(message) => Err(Error::Conversion(message.to_string())),
            Behavior::InternalError(message) => Err(Error::Other(message.to_string())),
            Behavior::FailAfterPartialOutput => {
                tokio::fs::write(output, b"half a docu").await?;
                Err(Error::Conversion("tool crashed halfway".into()))
            }
            Behavior::NoOutput => Ok(()),
            Behavior::Panic => panic!("converter exploded"),
            Behavior::Gated(gate) => {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|_| Error::Other("gate closed".into()))?;
                tokio::fs::write(output, b"# gated\n").await?;
                Ok(())
            }
        }
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            available: true,
            reports_progress: matches!(self.behavior, Behavior::Succeed),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Registry with pdf-to-md and md-to-pdf both backed by `behavior`
pub(crate) fn fake_registry(behavior: Behavior) -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();
    registry.register(Arc::new(FakeConverter::new(
        ConverterDescriptor::pdf_to_markdown(),
        behavior.clone(),
    )));
    registry.register(Arc::new(FakeConverter::new(
        ConverterDescriptor::markdown_to_pdf(),
        behavior,
    )));
    registry
}

/// Config with both roots inside `root` and short timeouts
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = root.join("uploads");
    config.storage.output_dir = root.join("outputs");
    config.server.environment = Environment::Testing;
    config.workers.shutdown_timeout = Duration::from_secs(5);
    config.converters.search_path = false;
    config
}

/// Helper to create a test Orchestrator with fake converters.
/// Returns the orchestrator and the tempdir (which must be kept alive).
pub(crate) async fn create_test_orchestrator(
    behavior: Behavior,
) -> (Orchestrator, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let orchestrator = Orchestrator::with_registry(config, fake_registry(behavior))
        .await
        .unwrap();
    (orchestrator, temp_dir)
}

/// Like [`create_test_orchestrator`] but lets the test adjust the config first
pub(crate) async fn create_test_orchestrator_with(
    behavior: Behavior,
    adjust: impl FnOnce(&mut Config),
) -> (Orchestrator, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    adjust(&mut config);
    let orchestrator = Orchestrator::with_registry(config, fake_registry(behavior))
        .await
        .unwrap();
    (orchestrator, temp_dir)
}

/// Poll until the task reaches a terminal status (5 second cap)
pub(crate) async fn wait_for_terminal(orchestrator: &Orchestrator, id: TaskId) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = orchestrator.store.get(id).await.unwrap();
        if task.status.is_terminal() {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} stuck in {}",
            task.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the task has the given status (5 second cap)
pub(crate) async fn wait_for_status(orchestrator: &Orchestrator, id: TaskId, status: Status) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while orchestrator.store.get(id).await.unwrap().status != status {
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} never reached {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Drain every event currently buffered on `rx`
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Number of regular entries directly inside `dir`
pub(crate) fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}
