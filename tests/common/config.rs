//! Test configuration helpers for creating orchestrators in a temp directory

use super::fixtures::EchoConverter;
use docshift::config::Environment;
use docshift::{Config, ConverterRegistry, Orchestrator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config whose storage roots live inside `temp_dir`
pub fn temp_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = temp_dir.path().join("uploads");
    config.storage.output_dir = temp_dir.path().join("outputs");
    config.server.environment = Environment::Testing;
    config.workers.shutdown_timeout = Duration::from_secs(5);
    config.converters.search_path = false;
    config
}

/// Registry with [`EchoConverter`] behind both built-in modes
pub fn echo_registry() -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();
    registry.register(Arc::new(EchoConverter::pdf_to_markdown()));
    registry.register(Arc::new(EchoConverter::markdown_to_pdf()));
    registry
}

/// Started orchestrator backed by [`echo_registry`]
pub async fn start_echo_orchestrator(
    adjust: impl FnOnce(&mut Config),
) -> (Orchestrator, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = temp_config(&temp_dir);
    adjust(&mut config);

    let orchestrator = Orchestrator::with_registry(config, echo_registry())
        .await
        .expect("Failed to create orchestrator");
    orchestrator.start().await;

    (orchestrator, temp_dir)
}
