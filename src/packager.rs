//! Batch download packaging
//!
//! [`BatchPackager`] bundles the outputs of several completed tasks into one
//! ZIP archive. Tasks that are unknown, not yet completed, or whose output has
//! disappeared are skipped and reported, not treated as errors; only a batch
//! with nothing to include fails.

use crate::error::{Error, Result};
use crate::storage::FileManager;
use crate::store::TaskStore;
use crate::types::{Status, TaskId};
use crate::utils::{attachment_disposition, dotted_extension, file_stem, sanitize_filename, unique_entry_name};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A task left out of an archive and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTask {
    /// Requested task
    pub id: TaskId,
    /// Human-readable reason
    pub reason: String,
}

/// A finished ZIP archive
#[derive(Debug, Clone)]
pub struct PackedArchive {
    /// Suggested archive name
    pub filename: String,
    /// Archive contents
    pub bytes: Vec<u8>,
    /// Entry names, in request order
    pub entries: Vec<String>,
    /// Requested tasks that were not included
    pub skipped: Vec<SkippedTask>,
}

impl PackedArchive {
    /// MIME type of the archive
    pub fn media_type(&self) -> &'static str {
        "application/zip"
    }

    /// `Content-Disposition` header value for the archive
    pub fn content_disposition(&self) -> String {
        attachment_disposition(&self.filename)
    }
}

/// A file selected for the archive
struct PendingEntry {
    id: TaskId,
    name: String,
    path: PathBuf,
}

/// Assembles completed outputs into ZIP archives
pub struct BatchPackager {
    store: Arc<TaskStore>,
    files: Arc<FileManager>,
}

impl BatchPackager {
    /// Create a packager reading from `store` and `files`
    pub fn new(store: Arc<TaskStore>, files: Arc<FileManager>) -> Self {
        Self { store, files }
    }

    /// Package the outputs of `ids`
    ///
    /// Entry names are the original filename stem plus the output extension;
    /// repeated names become `name (1).ext`, `name (2).ext`, ... in request
    /// order. Repeated ids are packaged once.
    ///
    /// # Errors
    ///
    /// [`Error::NothingToPackage`] when no requested task has an output to include.
    pub async fn pack(&self, ids: &[TaskId]) -> Result<PackedArchive> {
        let mut skipped = Vec::new();
        let mut pending = Vec::new();
        let mut taken = HashSet::new();
        let mut seen = HashSet::new();

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }

            let task = match self.store.get(id).await {
                Ok(task) => task,
                Err(_) => {
                    skipped.push(skip(id, "task not found"));
                    continue;
                }
            };

            if task.status != Status::Completed {
                skipped.push(skip(id, &format!("not completed ({})", task.status)));
                continue;
            }

            let Some(output) = task.output_path.as_deref() else {
                skipped.push(skip(id, "no output file"));
                continue;
            };

            let path = match self.files.ensure_within(output, self.files.output_root()).await {
                Ok(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => path,
                _ => {
                    skipped.push(skip(id, "output file missing"));
                    continue;
                }
            };

            let extension = dotted_extension(&path).unwrap_or_default();
            let stem = sanitize_filename(file_stem(&task.original_filename));
            let name = unique_entry_name(&format!("{}{}", stem, extension), &mut taken);

            pending.push(PendingEntry { id, name, path });
        }

        if pending.is_empty() {
            return Err(Error::NothingToPackage(nothing_reason(&skipped)));
        }

        let (bytes, entries, missing) = tokio::task::spawn_blocking(move || build_archive(pending))
            .await
            .map_err(|e| Error::Other(format!("archive task failed: {}", e)))??;

        skipped.extend(missing);
        if entries.is_empty() {
            return Err(Error::NothingToPackage(nothing_reason(&skipped)));
        }

        let filename = match entries.as_slice() {
            [only] => format!("{}.zip", file_stem(only)),
            _ => format!("docshift_download_{}files.zip", entries.len()),
        };

        tracing::info!(
            archive = %filename,
            entries = entries.len(),
            skipped = skipped.len(),
            size = bytes.len(),
            "packaged batch download"
        );

        Ok(PackedArchive {
            filename,
            bytes,
            entries,
            skipped,
        })
    }
}

fn skip(id: TaskId, reason: &str) -> SkippedTask {
    tracing::debug!(task_id = %id, reason, "skipping task in batch download");
    SkippedTask {
        id,
        reason: reason.to_string(),
    }
}

fn nothing_reason(skipped: &[SkippedTask]) -> String {
    if skipped.is_empty() {
        return "no files to download".to_string();
    }
    skipped
        .iter()
        .map(|s| format!("{}: {}", s.id.short(), s.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write the archive; files that vanished since selection are reported back
fn build_archive(
    pending: Vec<PendingEntry>,
) -> Result<(Vec<u8>, Vec<String>, Vec<SkippedTask>)> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = Vec::with_capacity(pending.len());
    let mut missing = Vec::new();

    for entry in pending {
        let mut file = match std::fs::File::open(&entry.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                missing.push(skip(entry.id, "output file missing"));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        writer.start_file(entry.name.as_str(), options)?;
        std::io::copy(&mut file, &mut writer)?;
        entries.push(entry.name);
    }

    let bytes = writer.finish()?.into_inner();
    Ok((bytes, entries, missing))
}
