//! Shared plumbing for converters that shell out to an external tool

use crate::error::{Error, Result};
use std::process::Output;
use tokio::process::Command;

/// How much of a tool's stderr ends up in an error message
const STDERR_TAIL_CHARS: usize = 500;

/// Run `command` to completion, mapping spawn failures and non-zero exits
///
/// A tool that cannot be started is an [`Error::ExternalTool`]; a tool that
/// runs and fails is an [`Error::Conversion`] carrying the tail of its stderr.
pub(crate) async fn run_tool(command: &mut Command, tool: &str) -> Result<Output> {
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::ExternalTool(format!("failed to execute {}: {}", tool, e)))?;

    if output.status.success() {
        return Ok(output);
    }

    let stderr = stderr_tail(&output.stderr);
    tracing::debug!(tool, status = %output.status, stderr = %stderr, "tool exited unsuccessfully");

    Err(Error::Conversion(if stderr.is_empty() {
        format!("{} exited with {}", tool, output.status)
    } else {
        format!("{} exited with {}: {}", tool, output.status, stderr)
    }))
}

/// Last [`STDERR_TAIL_CHARS`] characters of a tool's stderr, trimmed
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    text.chars().skip(skip).collect()
}
