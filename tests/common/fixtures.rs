//! Document fixtures and a scripted converter

use async_trait::async_trait;
use docshift::converter::ConverterCapabilities;
use docshift::{Converter, ConverterDescriptor, Error, ProgressReporter, Result};
use std::path::Path;

/// Smallest file the PDF signature check accepts
pub const MINIMAL_PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

/// Markdown with headings, a list and non-ASCII text
pub const SAMPLE_MARKDOWN: &str = "# Release Notes\n\n- Faster sweeps\n- Grüße aus Köln\n\n## Details\n\nNothing else.\n";

/// Bytes that carry a `.pdf` name but are not a PDF
pub const NOT_A_PDF: &[u8] = b"<html><body>definitely not a pdf</body></html>";

/// Converter that copies its input into the output, prefixed with a header
///
/// Inputs whose name contains `fail` are rejected with a conversion error,
/// so one batch can mix outcomes.
pub struct EchoConverter {
    descriptor: ConverterDescriptor,
}

impl EchoConverter {
    pub fn pdf_to_markdown() -> Self {
        Self {
            descriptor: ConverterDescriptor::pdf_to_markdown(),
        }
    }

    pub fn markdown_to_pdf() -> Self {
        Self {
            descriptor: ConverterDescriptor::markdown_to_pdf(),
        }
    }
}

#[async_trait]
impl Converter for EchoConverter {
    fn descriptor(&self) -> &ConverterDescriptor {
        &self.descriptor
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        progress: &ProgressReporter,
    ) -> Result<()> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains("fail") {
            return Err(Error::Conversion(format!("refusing {}", name)));
        }

        let body = tokio::fs::read(input).await?;
        progress.report(50);

        let mut converted = format!("<!-- {} -->\n", self.descriptor.mode).into_bytes();
        converted.extend_from_slice(&body);
        tokio::fs::write(output, converted).await?;
        Ok(())
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            available: true,
            reports_progress: true,
        }
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
