//! Stand-in converter for modes whose tool is not installed

use super::traits::{Converter, ConverterCapabilities, ConverterDescriptor, ProgressReporter};
use async_trait::async_trait;
use std::path::Path;

/// Converter used when the external tool for a mode cannot be found
///
/// The mode stays registered, so uploads are still validated and tasks are
/// still created, but every transform fails with `Error::NotSupported`
/// explaining what to install. The task ends up Failed with that message.
///
/// # Examples
///
/// ```
/// use docshift::converter::{Converter, ConverterDescriptor, ProgressReporter, UnavailableConverter};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let converter = UnavailableConverter::new(ConverterDescriptor::markdown_to_pdf(), "pandoc");
///
/// let result = converter
///     .transform(Path::new("a.md"), Path::new("a.pdf"), &ProgressReporter::detached())
///     .await;
/// assert!(result.is_err());
/// assert!(!converter.capabilities().available);
/// # }
/// ```
pub struct UnavailableConverter {
    descriptor: ConverterDescriptor,
    tool: &'static str,
}

impl UnavailableConverter {
    /// Stand in for `descriptor`'s mode, naming the missing `tool`
    pub fn new(descriptor: ConverterDescriptor, tool: &'static str) -> Self {
        Self { descriptor, tool }
    }
}

#[async_trait]
impl Converter for UnavailableConverter {
    fn descriptor(&self) -> &ConverterDescriptor {
        &self.descriptor
    }

    async fn transform(
        &self,
        _input: &Path,
        _output: &Path,
        _progress: &ProgressReporter,
    ) -> crate::Result<()> {
        Err(crate::Error::NotSupported(format!(
            "{} conversion requires the external {} binary. \
             Configure its path or ensure {} is in PATH.",
            self.descriptor.mode, self.tool, self.tool
        )))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            available: false,
            reports_progress: false,
        }
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
