//! Cover image files on the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bookshelf_kernel::settings::StorageSettings;
use uuid::Uuid;

/// Content type used when the extension is not recognized.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Stores cover images as flat files under one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(settings: &StorageSettings) -> Self {
        Self::in_dir(settings.images_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the image directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create image directory {}", self.dir.display()))
    }

    /// Write `bytes` as `file_name`, replacing any existing file. Empty input is ignored.
    pub async fn save(&self, bytes: &[u8], file_name: &str) -> anyhow::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let path = self.path_for(file_name)?;
        self.ensure_dir().await?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write image {}", path.display()))?;

        tracing::debug!(file = %file_name, size = bytes.len(), "stored cover image");
        Ok(())
    }

    /// Remove `file_name`; a file that is already gone is not an error.
    pub async fn delete(&self, file_name: &str) -> anyhow::Result<()> {
        let path = self.path_for(file_name)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(file = %file_name, "deleted cover image");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete image {}", path.display())),
        }
    }

    /// Read `file_name`, or `None` when no such file exists.
    pub async fn read(&self, file_name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_for(file_name)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read image {}", path.display())),
        }
    }

    fn path_for(&self, file_name: &str) -> anyhow::Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name == "."
            || file_name == ".."
        {
            bail!("invalid image file name {file_name:?}");
        }
        Ok(self.dir.join(file_name))
    }
}

/// Content type for a file extension such as `.png`.
///
/// Matching is exact, so `.PNG` falls back to `application/octet-stream`.
pub fn mime_type(extension: &str) -> &'static str {
    match extension {
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".bmp" => "image/bmp",
        ".tiff" => "image/tiff",
        ".wmf" => "image/wmf",
        ".jp2" => "image/jp2",
        ".svg" => "image/svg+xml",
        _ => FALLBACK_MIME_TYPE,
    }
}

/// Extension of `file_name` including the leading dot, or `""`.
pub fn extension_of(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[idx..],
        _ => "",
    }
}

/// Fresh stored name for an upload: a random token plus the original extension.
pub fn generate_file_name(original: &str) -> String {
    format!("{}{}", Uuid::new_v4(), extension_of(original))
}
