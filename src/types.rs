//! Core types for docshift

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a conversion task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Allocate a fresh random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn get(&self) -> Uuid {
        self.0
    }

    /// First eight characters, used in batch skip reasons and log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Conversion mode identifier (e.g. `pdf-to-md`)
///
/// The built-in modes are exposed as associated constants. Any other value
/// parses fine but is only usable once a converter has been registered for it;
/// otherwise the registry answers with `UnsupportedMode`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionMode(Cow<'static, str>);

impl ConversionMode {
    /// PDF → Markdown
    pub const PDF_TO_MD: ConversionMode = ConversionMode(Cow::Borrowed("pdf-to-md"));

    /// Markdown → PDF
    pub const MD_TO_PDF: ConversionMode = ConversionMode(Cow::Borrowed("md-to-pdf"));

    /// Create a mode from an arbitrary identifier
    pub fn new(mode: impl Into<String>) -> Self {
        Self(Cow::Owned(mode.into()))
    }

    /// Mode identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ConversionMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.trim().to_ascii_lowercase()))
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created and waiting for a worker
    Pending,
    /// A worker is running the conversion
    Processing,
    /// Output produced
    Completed,
    /// Conversion failed; see the task error
    Failed,
}

impl Status {
    /// Completed and Failed never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    /// Whether moving from `self` to `next` respects
    /// Pending → Processing → {Completed, Failed}.
    ///
    /// Staying in the same non-terminal state is allowed so progress-only
    /// updates pass through.
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (Status::Pending, Status::Pending | Status::Processing) => true,
            (Status::Processing, Status::Processing | Status::Completed | Status::Failed) => true,
            _ => false,
        }
    }

    /// Lowercase name as used in API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked conversion request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,

    /// Requested conversion
    pub mode: ConversionMode,

    /// Current status
    pub status: Status,

    /// Progress percentage (0 to 100)
    pub progress: u8,

    /// Filename as supplied by the caller
    pub original_filename: String,

    /// Stored upload (inside the upload root)
    pub input_path: PathBuf,

    /// Converted artifact, set once the task is Completed
    pub output_path: Option<PathBuf>,

    /// Failure reason, set only when Failed
    pub error: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// Last time any field changed
    pub updated_at: DateTime<Utc>,

    /// When the task reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// When the sweep may remove the task and its files
    pub expires_at: DateTime<Utc>,
}

impl Task {
    /// Relative download link, only available for completed tasks with an output
    pub fn download_url(&self) -> Option<String> {
        match (self.status, &self.output_path) {
            (Status::Completed, Some(_)) => Some(format!("/api/download/{}", self.id)),
            _ => None,
        }
    }

    /// Whether the retention window has elapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Partial update applied through `TaskStore::update`
#[derive(Clone, Debug, Default)]
pub struct TaskUpdate {
    /// New status
    pub status: Option<Status>,
    /// New progress (clamped, never decreases)
    pub progress: Option<u8>,
    /// Output artifact path
    pub output_path: Option<PathBuf>,
    /// Failure message
    pub error: Option<String>,
}

impl TaskUpdate {
    /// Pending → Processing
    pub fn processing() -> Self {
        Self {
            status: Some(Status::Processing),
            ..Default::default()
        }
    }

    /// Progress-only update
    pub fn progress(percent: u8) -> Self {
        Self {
            progress: Some(percent),
            ..Default::default()
        }
    }

    /// Processing → Completed with the produced artifact
    pub fn completed(output_path: PathBuf) -> Self {
        Self {
            status: Some(Status::Completed),
            progress: Some(100),
            output_path: Some(output_path),
            error: None,
        }
    }

    /// Processing → Failed with a human-readable reason
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(Status::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Event emitted during a task's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task created and queued for a worker
    Queued {
        /// Task ID
        id: TaskId,
        /// Requested conversion
        mode: ConversionMode,
        /// Original filename
        filename: String,
    },

    /// A worker picked the task up
    Processing {
        /// Task ID
        id: TaskId,
    },

    /// Interim progress reported by a converter
    Progress {
        /// Task ID
        id: TaskId,
        /// Percentage (0 to 100)
        percent: u8,
    },

    /// Conversion succeeded
    Completed {
        /// Task ID
        id: TaskId,
        /// Produced artifact
        output_path: PathBuf,
    },

    /// Conversion failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Retention window elapsed; task and files removed
    Expired {
        /// Task ID
        id: TaskId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

/// A file handed to `Orchestrator::submit_batch`
#[derive(Clone, Debug)]
pub struct UploadFile {
    /// Filename as supplied by the caller
    pub filename: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Create a new upload
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Poll-status response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskStatusView {
    /// Task ID
    pub task_id: TaskId,
    /// Requested conversion
    pub mode: ConversionMode,
    /// Current status
    pub status: Status,
    /// Progress percentage
    pub progress: u8,
    /// Download link once Completed
    pub download_url: Option<String>,
    /// Failure reason once Failed
    pub error: Option<String>,
    /// Original filename
    pub filename: String,
}

impl From<&Task> for TaskStatusView {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            mode: task.mode.clone(),
            status: task.status,
            progress: task.progress,
            download_url: task.download_url(),
            error: task.error.clone(),
            filename: task.original_filename.clone(),
        }
    }
}

/// Converted Markdown returned inline by `Orchestrator::content`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentView {
    /// Task ID
    pub task_id: TaskId,
    /// Markdown text
    pub content: String,
    /// Markdown flavour of `content`
    pub format: String,
    /// Original filename
    pub original_filename: String,
    /// Size of `content` in bytes
    pub size_bytes: u64,
    /// Size of `content` in KiB, two decimals
    pub size_kb: f64,
}

/// A single converted file ready to hand to a client
#[derive(Clone, Debug)]
pub struct DownloadFile {
    /// Suggested filename (original stem + output extension)
    pub filename: String,
    /// MIME type of the artifact
    pub media_type: &'static str,
    /// `Content-Disposition` header value
    pub content_disposition: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// Liveness report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always "healthy" while the orchestrator accepts work, "draining" after shutdown
    pub status: String,
    /// Number of task records currently held
    pub tasks: usize,
    /// Conversions currently running
    pub active_conversions: usize,
    /// Submissions waiting for a worker
    pub queued: usize,
    /// Registered conversion modes
    pub modes: Vec<ConversionMode>,
}
