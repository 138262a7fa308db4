//! PDF → Markdown via the external `marker_single` binary

use super::command::run_tool;
use super::traits::{Converter, ConverterCapabilities, ConverterDescriptor, ProgressReporter};
use crate::error::{Error, Result};
use crate::storage::images_dir_for;
use crate::utils::dotted_extension;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Extensions of the page images marker extracts
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// PDF → Markdown converter backed by marker (`marker_single`)
///
/// marker writes `<stem>/<stem>.md` plus extracted page images into a staging
/// directory. The Markdown becomes the task output; images are moved into a
/// sibling `<output stem>_images/` directory and the links rewritten to match.
pub struct MarkerConverter {
    binary_path: PathBuf,
    use_gpu: bool,
    descriptor: ConverterDescriptor,
}

impl MarkerConverter {
    /// Create a converter with an explicit `marker_single` path (CPU mode)
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            use_gpu: false,
            descriptor: ConverterDescriptor::pdf_to_markdown(),
        }
    }

    /// Attempt to find `marker_single` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("marker_single").ok().map(Self::new)
    }

    /// Run marker's models on the GPU
    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// Path of the marker binary in use
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn run_marker(
        &self,
        input: &Path,
        output: &Path,
        staging: &Path,
        progress: &ProgressReporter,
    ) -> Result<()> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg(input)
            .arg("--output_dir")
            .arg(staging)
            .arg("--output_format")
            .arg("markdown")
            .env("TORCH_DEVICE", if self.use_gpu { "cuda" } else { "cpu" });

        run_tool(&mut command, "marker_single").await?;
        progress.report(80);

        let markdown_path = find_markdown(staging).await?.ok_or_else(|| {
            Error::Conversion("marker finished without producing Markdown".to_string())
        })?;
        let mut text = tokio::fs::read_to_string(&markdown_path).await?;

        if let Some(source_dir) = markdown_path.parent() {
            text = relocate_images(source_dir, &markdown_path, output, text).await?;
        }

        tokio::fs::write(output, text).await?;
        Ok(())
    }
}

#[async_trait]
impl Converter for MarkerConverter {
    fn descriptor(&self) -> &ConverterDescriptor {
        &self.descriptor
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        progress: &ProgressReporter,
    ) -> Result<()> {
        let parent = output
            .parent()
            .ok_or_else(|| Error::Conversion(format!("{} has no parent", output.display())))?;
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let staging = parent.join(format!(".{}_marker", stem));

        tokio::fs::create_dir_all(&staging).await?;
        progress.report(5);

        let result = self.run_marker(input, output, &staging, progress).await;

        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove marker staging directory");
        }

        result
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            available: true,
            reports_progress: false,
        }
    }

    fn name(&self) -> &'static str {
        "marker"
    }
}

/// First `.md` file in `dir` or one level below it
async fn find_markdown(dir: &Path) -> Result<Option<PathBuf>> {
    let mut subdirs = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;
        if file_type.is_file() && dotted_extension(&path).as_deref() == Some(".md") {
            return Ok(Some(path));
        }
        if file_type.is_dir() {
            subdirs.push(path);
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        let mut entries = tokio::fs::read_dir(&subdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file()
                && dotted_extension(&path).as_deref() == Some(".md")
            {
                return Ok(Some(path));
            }
        }
    }

    Ok(None)
}

/// Move extracted images next to the output and point the Markdown at them
async fn relocate_images(
    source_dir: &Path,
    markdown_path: &Path,
    output: &Path,
    mut text: String,
) -> Result<String> {
    let images_dir = images_dir_for(output);
    let images_dir_name = images_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut moved = 0usize;

    let mut entries = tokio::fs::read_dir(source_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == markdown_path || !entry.file_type().await?.is_file() {
            continue;
        }
        let is_image = dotted_extension(&path)
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if !is_image {
            continue;
        }

        if moved == 0 {
            tokio::fs::create_dir_all(&images_dir).await?;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        tokio::fs::rename(&path, images_dir.join(&name)).await?;
        text = text.replace(
            &format!("]({})", name),
            &format!("]({}/{})", images_dir_name, name),
        );
        moved += 1;
    }

    if moved > 0 {
        tracing::debug!(count = moved, path = %images_dir.display(), "relocated extracted images");
    }
    Ok(text)
}
