//! Traits and types for document converters

use crate::error::{Result, ValidationError};
use crate::storage::InputSignature;
use crate::types::ConversionMode;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Static description of what a converter accepts and produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterDescriptor {
    /// Mode this converter serves
    pub mode: ConversionMode,
    /// Accepted input extension, lowercase with leading dot (e.g. ".pdf")
    pub input_extension: &'static str,
    /// Produced output extension, lowercase with leading dot (e.g. ".md")
    pub output_extension: &'static str,
    /// Content check applied to uploads before they are stored
    pub signature: InputSignature,
}

impl ConverterDescriptor {
    /// Descriptor for the built-in PDF → Markdown mode
    pub fn pdf_to_markdown() -> Self {
        Self {
            mode: ConversionMode::PDF_TO_MD,
            input_extension: ".pdf",
            output_extension: ".md",
            signature: InputSignature::PDF,
        }
    }

    /// Descriptor for the built-in Markdown → PDF mode
    pub fn markdown_to_pdf() -> Self {
        Self {
            mode: ConversionMode::MD_TO_PDF,
            input_extension: ".md",
            output_extension: ".pdf",
            signature: InputSignature::Text,
        }
    }

    /// Whether `filename` carries this converter's input extension (case-insensitive)
    pub fn accepts_extension(&self, filename: &str) -> bool {
        filename
            .to_ascii_lowercase()
            .ends_with(self.input_extension)
    }

    /// Check a candidate input's extension before the transform runs
    pub fn validate_input(&self, path: &Path) -> std::result::Result<(), ValidationError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.accepts_extension(&filename) {
            Ok(())
        } else {
            Err(ValidationError::BadExtension {
                filename,
                expected: self.input_extension.to_string(),
                mode: self.mode.clone(),
            })
        }
    }
}

/// Capabilities of a converter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterCapabilities {
    /// Backed by a working tool; `false` means every transform fails
    pub available: bool,
    /// Reports interim progress while running
    pub reports_progress: bool,
}

/// Handle a converter uses to report interim progress
///
/// Values are clamped to 0..=99 and only ever increase; the orchestrator sets
/// 100 itself when the task completes. Reporting never blocks.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<u8>>,
}

impl ProgressReporter {
    /// Create a reporter plus the receiver the orchestrator listens on
    pub fn channel() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// A reporter whose updates go nowhere
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Report progress as a percentage
    pub fn report(&self, percent: u8) {
        let percent = percent.min(99);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    /// Last reported value
    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }
}

/// Trait for document converters
///
/// A converter is an opaque collaborator: given an input file it writes the
/// converted artifact to `output` or fails. Implementations may shell out to
/// external tools, use native libraries, or be test fakes.
///
/// # Examples
///
/// ```no_run
/// use docshift::converter::{Converter, PandocConverter, ProgressReporter};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = PandocConverter::from_path()
///     .expect("pandoc not found in PATH");
///
/// converter
///     .transform(
///         Path::new("notes.md"),
///         Path::new("notes.pdf"),
///         &ProgressReporter::detached(),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Converter: Send + Sync {
    /// What this converter accepts and produces
    fn descriptor(&self) -> &ConverterDescriptor;

    /// Convert `input` into `output`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The external tool cannot be executed
    /// - The tool exits unsuccessfully or produces no output
    /// - The converter is unavailable (stub implementations)
    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        progress: &ProgressReporter,
    ) -> Result<()>;

    /// Query capabilities of this converter
    fn capabilities(&self) -> ConverterCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
