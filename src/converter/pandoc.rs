//! Markdown → PDF via the external `pandoc` binary

use super::command::run_tool;
use super::traits::{Converter, ConverterCapabilities, ConverterDescriptor, ProgressReporter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Markdown → PDF converter backed by `pandoc` and a LaTeX engine
///
/// # Examples
///
/// ```no_run
/// use docshift::converter::{Converter, PandocConverter, ProgressReporter};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = PandocConverter::new(PathBuf::from("/usr/bin/pandoc"))
///     .with_pdf_engine("xelatex")
///     .with_main_font(Some("NanumGothic".into()));
///
/// converter
///     .transform(Path::new("notes.md"), Path::new("notes.pdf"), &ProgressReporter::detached())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct PandocConverter {
    binary_path: PathBuf,
    pdf_engine: String,
    main_font: Option<String>,
    descriptor: ConverterDescriptor,
}

impl PandocConverter {
    /// Create a converter with an explicit pandoc path and the xelatex engine
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            pdf_engine: "xelatex".to_string(),
            main_font: None,
            descriptor: ConverterDescriptor::markdown_to_pdf(),
        }
    }

    /// Attempt to find pandoc in PATH
    pub fn from_path() -> Option<Self> {
        which::which("pandoc").ok().map(Self::new)
    }

    /// LaTeX engine passed as `--pdf-engine`
    pub fn with_pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.pdf_engine = engine.into();
        self
    }

    /// Font used for body, sans and mono text (needed for non-Latin scripts)
    pub fn with_main_font(mut self, font: Option<String>) -> Self {
        self.main_font = font;
        self
    }

    /// Path of the pandoc binary in use
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            input.to_string_lossy().into_owned(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            format!("--pdf-engine={}", self.pdf_engine),
            "--standalone".to_string(),
        ];

        if let Some(font) = &self.main_font {
            for variable in ["mainfont", "sansfont", "monofont"] {
                args.push("-V".to_string());
                args.push(format!("{}={}", variable, font));
            }
        }

        for variable in ["geometry:margin=2.5cm", "fontsize=11pt", "linestretch=1.5"] {
            args.push("-V".to_string());
            args.push(variable.to_string());
        }

        args
    }

    /// Turn pandoc's raw failure into something a user can act on
    fn explain_failure(&self, error: Error) -> Error {
        let Error::Conversion(message) = &error else {
            return error;
        };
        let lower = message.to_ascii_lowercase();

        if lower.contains(&self.pdf_engine.to_ascii_lowercase()) && lower.contains("not found") {
            return Error::Conversion(format!(
                "PDF engine '{}' is not installed: {}",
                self.pdf_engine, message
            ));
        }
        if lower.contains("font") && (lower.contains("not found") || lower.contains("cannot")) {
            return Error::Conversion(format!(
                "font not found; install it or set DOCSHIFT_PDF_FONT: {}",
                message
            ));
        }
        error
    }
}

#[async_trait]
impl Converter for PandocConverter {
    fn descriptor(&self) -> &ConverterDescriptor {
        &self.descriptor
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        progress: &ProgressReporter,
    ) -> Result<()> {
        progress.report(10);

        let mut command = Command::new(&self.binary_path);
        command.args(self.build_args(input, output));

        run_tool(&mut command, "pandoc")
            .await
            .map_err(|e| self.explain_failure(e))?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(Error::Conversion(
                "pandoc finished without producing a PDF".to_string(),
            ));
        }

        progress.report(95);
        Ok(())
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            available: true,
            reports_progress: false,
        }
    }

    fn name(&self) -> &'static str {
        "pandoc"
    }
}
