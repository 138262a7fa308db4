//! Error types for docshift
//!
//! This module provides the error taxonomy for the library:
//! - Synchronous rejections (validation, quota, unsupported mode) surfaced before a task exists
//! - Lookup and readiness errors for task reads
//! - Internal invariant violations recorded on the task instead of crashing a worker
//! - HTTP status code mapping for host route layers

use crate::types::{ConversionMode, Status, TaskId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docshift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docshift
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "upload_dir")
        key: Option<String>,
    },

    /// Input rejected before a task was created
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A size or count limit was exceeded
    #[error("quota exceeded: {0}")]
    QuotaExceeded(#[from] QuotaError),

    /// No converter registered for the requested mode
    #[error("unsupported conversion mode: {0}")]
    UnsupportedMode(ConversionMode),

    /// Unknown or expired task
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Task exists but has no artifact to serve yet (or failed)
    #[error("task {id} is {status}: {reason}")]
    NotReady {
        /// The task that was asked for
        id: TaskId,
        /// Its current status
        status: Status,
        /// Why the artifact cannot be served
        reason: String,
    },

    /// A status update would move a task backwards (orchestrator bug)
    #[error("invalid status transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        /// The task being updated
        id: TaskId,
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },

    /// External transform failed
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Batch download had no completed task to include
    #[error("nothing to package: {0}")]
    NothingToPackage(String),

    /// Worker queue is at capacity; submission rejected
    #[error("conversion queue is full ({capacity} pending)")]
    QueueFull {
        /// Configured queue depth
        capacity: usize,
    },

    /// Shutdown in progress - not accepting new conversions
    #[error("shutdown in progress: not accepting new conversions")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive writing failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (pandoc, marker, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Reasons an uploaded file is rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Extension does not match the converter's declared input extension
    #[error("expected a {expected} file for mode {mode}, got {filename}")]
    BadExtension {
        /// Filename as supplied
        filename: String,
        /// Extension the mode accepts (e.g. ".pdf")
        expected: String,
        /// Requested mode
        mode: ConversionMode,
    },

    /// Magic bytes / text check failed
    #[error("{filename} is not a valid {expected} file")]
    BadSignature {
        /// Filename as supplied
        filename: String,
        /// Expected content kind (e.g. "PDF")
        expected: String,
    },

    /// Resolved destination escapes the storage root
    #[error("path {path} escapes storage root {root}")]
    PathTraversal {
        /// Offending path
        path: PathBuf,
        /// Root it must stay inside
        root: PathBuf,
    },

    /// Upload was empty
    #[error("{filename} is empty")]
    EmptyFile {
        /// Filename as supplied
        filename: String,
    },
}

/// Limits enforced on uploads
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Single file larger than the per-file limit
    #[error("{filename} is {size} bytes, limit is {limit} bytes")]
    FileTooLarge {
        /// Filename as supplied
        filename: String,
        /// Actual size
        size: u64,
        /// Configured per-file limit
        limit: u64,
    },

    /// Too many files in one batch
    #[error("{count} files submitted, limit is {limit}")]
    TooManyFiles {
        /// Files in the batch
        count: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Batch larger than the aggregate limit
    #[error("batch is {total} bytes, limit is {limit} bytes")]
    TotalTooLarge {
        /// Sum of all file sizes
        total: u64,
        /// Configured aggregate limit
        limit: u64,
    },
}

/// API error response format
///
/// Returned by host route layers when an operation fails.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task not found: 67e55044-10b1-426f-9247-bb680e5fe0c8",
///     "details": {
///       "task_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "file_too_large")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::UnsupportedMode(_) => 400,
            Error::NotReady { .. } => 400,
            Error::NothingToPackage(_) => 400,

            Error::NotFound(_) => 404,

            // 413 Payload Too Large
            Error::QuotaExceeded(_) => 413,

            Error::InvalidTransition { .. } => 500,
            Error::Conversion(_) => 500,
            Error::Io(_) => 500,
            Error::Archive(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            Error::NotSupported(_) => 501,

            // 503 Service Unavailable - back off and retry
            Error::QueueFull { .. } => 503,
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(e) => match e {
                ValidationError::BadExtension { .. } => "invalid_file_type",
                ValidationError::BadSignature { .. } => "invalid_file_signature",
                ValidationError::PathTraversal { .. } => "invalid_path",
                ValidationError::EmptyFile { .. } => "empty_file",
            },
            Error::QuotaExceeded(e) => match e {
                QuotaError::FileTooLarge { .. } => "file_too_large",
                QuotaError::TooManyFiles { .. } => "too_many_files",
                QuotaError::TotalTooLarge { .. } => "total_too_large",
            },
            Error::UnsupportedMode(_) => "unsupported_mode",
            Error::NotFound(_) => "task_not_found",
            Error::NotReady { .. } => "task_not_ready",
            Error::InvalidTransition { .. } => "internal_error",
            Error::Conversion(_) => "conversion_failed",
            Error::NothingToPackage(_) => "nothing_to_package",
            Error::QueueFull { .. } => "queue_full",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Archive(_) => "archive_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::NotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::NotReady { id, status, .. } => Some(serde_json::json!({
                "task_id": id,
                "status": status,
            })),
            Error::UnsupportedMode(mode) => Some(serde_json::json!({ "mode": mode })),
            Error::QuotaExceeded(QuotaError::FileTooLarge { size, limit, .. }) => {
                Some(serde_json::json!({
                    "size_bytes": size,
                    "limit_bytes": limit,
                }))
            }
            Error::QuotaExceeded(QuotaError::TooManyFiles { count, limit }) => {
                Some(serde_json::json!({
                    "count": count,
                    "limit": limit,
                }))
            }
            Error::QuotaExceeded(QuotaError::TotalTooLarge { total, limit }) => {
                Some(serde_json::json!({
                    "total_bytes": total,
                    "limit_bytes": limit,
                }))
            }
            Error::QueueFull { capacity } => Some(serde_json::json!({ "capacity": capacity })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id() -> TaskId {
        "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap()
    }

    /// (Error, expected_status_code, expected_error_code) for the arms that
    /// host route layers depend on most.
    fn error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Validation(ValidationError::BadExtension {
                    filename: "notes.txt".into(),
                    expected: ".pdf".into(),
                    mode: ConversionMode::PDF_TO_MD,
                }),
                400,
                "invalid_file_type",
            ),
            (
                Error::Validation(ValidationError::BadSignature {
                    filename: "fake.pdf".into(),
                    expected: "PDF".into(),
                }),
                400,
                "invalid_file_signature",
            ),
            (
                Error::Validation(ValidationError::PathTraversal {
                    path: PathBuf::from("../etc/passwd"),
                    root: PathBuf::from("uploads"),
                }),
                400,
                "invalid_path",
            ),
            (
                Error::QuotaExceeded(QuotaError::FileTooLarge {
                    filename: "big.pdf".into(),
                    size: 30,
                    limit: 20,
                }),
                413,
                "file_too_large",
            ),
            (
                Error::QuotaExceeded(QuotaError::TooManyFiles {
                    count: 21,
                    limit: 20,
                }),
                413,
                "too_many_files",
            ),
            (
                Error::UnsupportedMode(ConversionMode::new("docx-to-md")),
                400,
                "unsupported_mode",
            ),
            (Error::NotFound(sample_id()), 404, "task_not_found"),
            (
                Error::NotReady {
                    id: sample_id(),
                    status: Status::Processing,
                    reason: "still converting".into(),
                },
                400,
                "task_not_ready",
            ),
            (
                Error::InvalidTransition {
                    id: sample_id(),
                    from: Status::Completed,
                    to: Status::Processing,
                },
                500,
                "internal_error",
            ),
            (
                Error::NothingToPackage("no completed tasks".into()),
                400,
                "nothing_to_package",
            ),
            (Error::QueueFull { capacity: 8 }, 503, "queue_full"),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::NotSupported("pandoc missing".into()),
                501,
                "not_supported",
            ),
        ]
    }

    #[test]
    fn test_status_and_error_codes() {
        for (error, status, code) in error_variants() {
            assert_eq!(error.status_code(), status, "status for {error}");
            assert_eq!(error.error_code(), code, "code for {error}");
        }
    }

    #[test]
    fn test_api_error_includes_task_id_details() {
        let api: ApiError = Error::NotFound(sample_id()).into();
        assert_eq!(api.error.code, "task_not_found");
        let details = api.error.details.unwrap();
        assert_eq!(details["task_id"], "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn test_api_error_quota_details() {
        let api: ApiError = Error::QuotaExceeded(QuotaError::TotalTooLarge {
            total: 200,
            limit: 100,
        })
        .into();
        let details = api.error.details.unwrap();
        assert_eq!(details["total_bytes"], 200);
        assert_eq!(details["limit_bytes"], 100);
    }

    #[test]
    fn test_api_error_new() {
        let api = ApiError::new("rate_limited", "slow down");
        assert_eq!(api.error.code, "rate_limited");
        assert_eq!(api.error.message, "slow down");
        assert!(api.error.details.is_none());
    }

    #[test]
    fn test_api_error_skips_empty_details_when_serialized() {
        let api: ApiError = Error::ShuttingDown.into();
        let json = serde_json::to_string(&api).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("shutting_down"));
    }
}
