//! Conversions with the real external tools
//!
//! Requires `pandoc` (with a LaTeX engine) and `marker_single` on PATH.
//! All tests are marked #[ignore] to prevent running in normal CI.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test external_tools -- --ignored --nocapture
//! ```

mod common;

use common::{MINIMAL_PDF, SAMPLE_MARKDOWN, WaitResult, temp_config, wait_for_terminal};
use docshift::{ConversionMode, Orchestrator};
use std::time::Duration;

async fn orchestrator_with_tools() -> (Orchestrator, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = temp_config(&temp_dir);
    config.converters.search_path = true;

    let orchestrator = Orchestrator::new(config)
        .await
        .expect("Failed to create orchestrator");
    orchestrator.start().await;
    (orchestrator, temp_dir)
}

#[tokio::test]
#[ignore]
async fn test_registry_reports_tool_availability() {
    let (orchestrator, _temp_dir) = orchestrator_with_tools().await;

    for capability in orchestrator.registry().capabilities() {
        println!(
            "{}: {} (available: {})",
            capability.mode, capability.converter, capability.available
        );
    }

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_pandoc_renders_markdown_to_pdf() {
    let (orchestrator, _temp_dir) = orchestrator_with_tools().await;

    let task = orchestrator
        .submit(
            ConversionMode::MD_TO_PDF,
            "notes.md",
            SAMPLE_MARKDOWN.as_bytes(),
        )
        .await
        .unwrap();

    match wait_for_terminal(&orchestrator, task.id, Duration::from_secs(120)).await {
        WaitResult::Completed => {
            let file = orchestrator.download(task.id).await.unwrap();
            assert!(file.bytes.starts_with(b"%PDF"));
        }
        other => panic!("pandoc conversion did not complete: {other:?}"),
    }

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_marker_settles_degenerate_pdf() {
    let (orchestrator, _temp_dir) = orchestrator_with_tools().await;

    // Passes the signature check but has no pages; the task must still settle
    let task = orchestrator
        .submit(ConversionMode::PDF_TO_MD, "empty.pdf", MINIMAL_PDF)
        .await
        .unwrap();

    match wait_for_terminal(&orchestrator, task.id, Duration::from_secs(300)).await {
        WaitResult::Failed(message) => assert!(!message.is_empty()),
        WaitResult::Completed => {}
        WaitResult::Timeout => panic!("marker never finished"),
    }

    orchestrator.shutdown().await.unwrap();
}
