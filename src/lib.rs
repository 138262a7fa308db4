//! # docshift
//!
//! Asynchronous document conversion service core: PDF → Markdown and
//! Markdown → PDF, delegated to external tools.
//!
//! ## Design Philosophy
//!
//! docshift is designed to be:
//! - **Library-first** - No HTTP server; a host maps its routes onto [`Orchestrator`] methods
//! - **Fire and poll** - Submissions return a Pending task immediately, conversions run in the background
//! - **Ephemeral** - Tasks and files live for a retention window, then a sweep removes both
//! - **Event-driven** - Hosts can subscribe to lifecycle events instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use docshift::{Config, ConversionMode, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::from_env()?).await?;
//!     orchestrator.start().await;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let pdf = std::fs::read("report.pdf")?;
//!     let task = orchestrator
//!         .submit(ConversionMode::PDF_TO_MD, "report.pdf", &pdf)
//!         .await?;
//!     println!("queued {}", task.id);
//!
//!     docshift::run_with_shutdown(orchestrator).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Converter trait, built-in converters and the mode registry
pub mod converter;
/// Error types
pub mod error;
/// Conversion orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// Batch ZIP packaging
pub mod packager;
/// Upload validation and file lifecycle
pub mod storage;
/// In-memory task registry
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use converter::{Converter, ConverterDescriptor, ConverterRegistry, ProgressReporter};
pub use error::{ApiError, Error, ErrorDetail, QuotaError, Result, ToHttpStatus, ValidationError};
pub use orchestrator::Orchestrator;
pub use packager::{PackedArchive, SkippedTask};
pub use types::{
    ContentView, ConversionMode, DownloadFile, Event, HealthStatus, Status, Task, TaskId,
    TaskStatusView, UploadFile,
};

/// Run until a termination signal arrives, then shut the orchestrator down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if they cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use docshift::{Config, Orchestrator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::new(Config::default()).await?;
///     orchestrator.start().await;
///
///     run_with_shutdown(orchestrator).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: Orchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
