//! File lifecycle management
//!
//! [`FileManager`] owns the two storage roots. It validates uploads before they
//! touch the disk, stores them under collision-free names, derives output
//! paths, and removes files once their task expires.
//!
//! Every path handed out or accepted is checked to resolve (symlinks included)
//! inside its root.

mod signature;

pub use signature::InputSignature;

use crate::config::{LimitsConfig, StorageConfig};
use crate::converter::ConverterDescriptor;
use crate::error::{Error, QuotaError, Result, ValidationError};
use crate::types::UploadFile;
use crate::utils::{file_stem, sanitize_filename};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;

/// An upload persisted inside the upload root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Absolute path of the stored file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Directory holding images extracted alongside a converted output
///
/// `outputs/abc_report.md` → `outputs/abc_report_images/`
pub fn images_dir_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{}_images", stem))
}

/// Validates, stores and expires files in the upload and output roots
#[derive(Debug, Clone)]
pub struct FileManager {
    upload_root: PathBuf,
    output_root: PathBuf,
    limits: LimitsConfig,
}

impl FileManager {
    /// Create both roots if needed and resolve them to absolute paths
    pub async fn new(storage: &StorageConfig, limits: &LimitsConfig) -> Result<Self> {
        let upload_root = prepare_root(&storage.upload_dir).await?;
        let output_root = prepare_root(&storage.output_dir).await?;

        if upload_root == output_root {
            return Err(Error::Config {
                message: format!(
                    "upload and output directories both resolve to {}",
                    upload_root.display()
                ),
                key: Some("output_dir".into()),
            });
        }

        Ok(Self {
            upload_root,
            output_root,
            limits: limits.clone(),
        })
    }

    /// Canonical upload root
    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// Canonical output root
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Check an upload without writing anything
    ///
    /// Order: path safety, extension, emptiness, per-file size, content signature.
    pub fn validate(
        &self,
        filename: &str,
        bytes: &[u8],
        descriptor: &ConverterDescriptor,
    ) -> Result<()> {
        reject_traversal(filename, &self.upload_root)?;

        if !descriptor.accepts_extension(filename) {
            return Err(ValidationError::BadExtension {
                filename: filename.to_string(),
                expected: descriptor.input_extension.to_string(),
                mode: descriptor.mode.clone(),
            }
            .into());
        }

        if bytes.is_empty() {
            return Err(ValidationError::EmptyFile {
                filename: filename.to_string(),
            }
            .into());
        }

        let size = bytes.len() as u64;
        if size > self.limits.max_file_size_bytes {
            return Err(QuotaError::FileTooLarge {
                filename: filename.to_string(),
                size,
                limit: self.limits.max_file_size_bytes,
            }
            .into());
        }

        if !descriptor.signature.matches(bytes) {
            return Err(ValidationError::BadSignature {
                filename: filename.to_string(),
                expected: descriptor.signature.label().to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Check count and aggregate size of a batch
    pub fn check_batch_quota(&self, files: &[UploadFile]) -> Result<()> {
        if files.len() > self.limits.max_files {
            return Err(QuotaError::TooManyFiles {
                count: files.len(),
                limit: self.limits.max_files,
            }
            .into());
        }

        let total: u64 = files.iter().map(|f| f.bytes.len() as u64).sum();
        if total > self.limits.max_total_size_bytes {
            return Err(QuotaError::TotalTooLarge {
                total,
                limit: self.limits.max_total_size_bytes,
            }
            .into());
        }

        Ok(())
    }

    /// Validate and persist one upload
    ///
    /// The file is written as `{uuid}_{sanitized name}` inside the upload root,
    /// so concurrent uploads of the same name never collide. Nothing is
    /// written if validation fails.
    pub async fn store(
        &self,
        filename: &str,
        bytes: &[u8],
        descriptor: &ConverterDescriptor,
    ) -> Result<StoredFile> {
        self.validate(filename, bytes, descriptor)?;

        let safe_name = sanitize_filename(filename);
        let destination = self.upload_root.join(format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            safe_name
        ));
        self.ensure_within(&destination, &self.upload_root).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await?;
        if let Err(e) = write_contents(&mut file, bytes).await {
            drop(file);
            self.delete(&destination).await;
            return Err(e);
        }

        tracing::debug!(
            path = %destination.display(),
            size = bytes.len(),
            "stored upload"
        );

        Ok(StoredFile {
            path: destination,
            size: bytes.len() as u64,
        })
    }

    /// Validate and persist a whole batch, all or nothing
    ///
    /// Quotas and every file are checked before the first write; if a write
    /// fails, files already written for this batch are removed again.
    pub async fn store_batch(
        &self,
        files: &[UploadFile],
        descriptor: &ConverterDescriptor,
    ) -> Result<Vec<StoredFile>> {
        self.check_batch_quota(files)?;
        for file in files {
            self.validate(&file.filename, &file.bytes, descriptor)?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.store(&file.filename, &file.bytes, descriptor).await {
                Ok(s) => stored.push(s),
                Err(e) => {
                    for s in &stored {
                        self.delete(&s.path).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Output path for `input_path`: same stem, `output_extension`, inside the output root
    pub fn resolve_output_path(&self, input_path: &Path, output_extension: &str) -> Result<PathBuf> {
        let name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::from(ValidationError::PathTraversal {
                    path: input_path.to_path_buf(),
                    root: self.upload_root.clone(),
                })
            })?;

        let stem = sanitize_filename(file_stem(&name));
        Ok(self
            .output_root
            .join(format!("{}{}", stem, output_extension)))
    }

    /// Resolve `path` (following symlinks) and check it stays inside `root`
    ///
    /// `path` need not exist yet; its parent must.
    pub async fn ensure_within(&self, path: &Path, root: &Path) -> Result<PathBuf> {
        let resolved = match tokio::fs::canonicalize(path).await {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
                    return Err(traversal(path, root));
                };
                let parent = tokio::fs::canonicalize(parent)
                    .await
                    .map_err(|_| traversal(path, root))?;
                parent.join(name)
            }
            Err(e) => return Err(e.into()),
        };

        if resolved.starts_with(root) && resolved != root {
            Ok(resolved)
        } else {
            tracing::warn!(path = %path.display(), root = %root.display(), "path escapes storage root");
            Err(traversal(path, root))
        }
    }

    /// Read a produced artifact, refusing anything outside the output root
    pub async fn read_output(&self, path: &Path) -> Result<Vec<u8>> {
        let resolved = self.ensure_within(path, &self.output_root).await?;
        Ok(tokio::fs::read(resolved).await?)
    }

    /// Whether `path` is an existing regular file inside the output root
    pub async fn output_exists(&self, path: &Path) -> bool {
        match self.ensure_within(path, &self.output_root).await {
            Ok(resolved) => tokio::fs::metadata(resolved)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Best-effort removal of a file (and, for outputs, its extracted images)
    ///
    /// A missing file is not an error; other failures are logged. Returns
    /// whether the file was removed by this call.
    pub async fn delete(&self, path: &Path) -> bool {
        let in_upload = path.starts_with(&self.upload_root);
        let in_output = path.starts_with(&self.output_root);
        if !in_upload && !in_output {
            tracing::warn!(path = %path.display(), "refusing to delete outside storage roots");
            return false;
        }

        let removed = match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "deleted file");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete file");
                false
            }
        };

        if in_output {
            let images = images_dir_for(path);
            match tokio::fs::remove_dir_all(&images).await {
                Ok(()) => tracing::debug!(path = %images.display(), "deleted image directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %images.display(), error = %e, "failed to delete image directory")
                }
            }
        }

        removed
    }

    /// Remove entries in either root older than `max_age` that no task references
    ///
    /// Catches files left behind by a previous process. Returns the number of
    /// entries removed.
    pub async fn sweep_orphans(&self, max_age: Duration, referenced: &HashSet<PathBuf>) -> usize {
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return 0;
        };

        let referenced_images: HashSet<PathBuf> = referenced
            .iter()
            .filter(|p| p.starts_with(&self.output_root))
            .map(|p| images_dir_for(p))
            .collect();

        let mut removed = 0;
        for root in [&self.upload_root, &self.output_root] {
            let mut entries = match tokio::fs::read_dir(root).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %root.display(), error = %e, "failed to scan storage root");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(path = %root.display(), error = %e, "failed to read directory entry");
                        break;
                    }
                };

                let path = entry.path();
                if referenced.contains(&path) || referenced_images.contains(&path) {
                    continue;
                }

                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                let is_old = metadata.modified().map(|m| m <= cutoff).unwrap_or(false);
                if !is_old {
                    continue;
                }

                let result = if metadata.is_dir() {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };
                match result {
                    Ok(()) => {
                        tracing::debug!(path = %path.display(), "removed orphaned entry");
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove orphaned entry")
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(count = removed, "swept orphaned files");
        }
        removed
    }
}

async fn prepare_root(dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create storage directory '{}': {}", dir.display(), e),
        ))
    })?;
    Ok(tokio::fs::canonicalize(dir).await?)
}

async fn write_contents(file: &mut tokio::fs::File, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

/// Reject caller-supplied names that try to leave the upload root
fn reject_traversal(filename: &str, root: &Path) -> Result<()> {
    let absolute = filename.starts_with('/') || filename.starts_with('\\');
    let has_drive = filename.as_bytes().get(1) == Some(&b':');
    let climbs = filename.split(['/', '\\']).any(|segment| segment == "..");

    if absolute || has_drive || climbs {
        tracing::warn!(filename, "rejected upload name with path traversal");
        return Err(traversal(Path::new(filename), root));
    }
    Ok(())
}

fn traversal(path: &Path, root: &Path) -> Error {
    ValidationError::PathTraversal {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    }
    .into()
}
