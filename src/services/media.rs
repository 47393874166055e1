//! Media storage for post images
//!
//! Images are written under `<media root>/posts/` with a random name and
//! referenced from posts by their path relative to the root.

use crate::config::MediaConfig;
use anyhow::{Context, Result};
use image::ImageFormat;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Subdirectory of the media root holding post images
pub const POSTS_DIR: &str = "posts";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported file type: {0}")]
    InvalidType(String),

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    Empty,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    config: MediaConfig,
}

impl MediaStore {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Check size and content without touching the disk
    ///
    /// The format is sniffed from the bytes and the image must decode; any
    /// `Content-Type` the client declared is not trusted. Returns the MIME
    /// type of the detected format.
    pub fn validate(&self, data: &[u8]) -> Result<&'static str, MediaError> {
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        let size = data.len() as u64;
        if size > self.config.max_file_size {
            return Err(MediaError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }

        let format = image::guess_format(data)
            .map_err(|e| MediaError::InvalidType(format!("unrecognised image data: {}", e)))?;
        let mime = format_mime(format)
            .filter(|mime| self.config.is_type_allowed(mime))
            .ok_or_else(|| MediaError::InvalidType(format!("{:?}", format)))?;

        image::load_from_memory_with_format(data, format)
            .map_err(|e| MediaError::InvalidType(format!("corrupted {}: {}", mime, e)))?;

        Ok(mime)
    }

    /// Store an uploaded image, returning its relative path (`posts/<uuid>.<ext>`)
    ///
    /// The extension follows the detected format.
    pub async fn save_image(&self, data: &[u8]) -> Result<String, MediaError> {
        let mime = self.validate(data)?;

        let dir = self.config.path.join(POSTS_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(mime));
        let file_path = dir.join(&filename);
        fs::write(&file_path, data)
            .await
            .with_context(|| format!("Failed to save {}", file_path.display()))?;

        tracing::debug!(path = %file_path.display(), size = data.len(), mime, "Image stored");
        Ok(format!("{}/{}", POSTS_DIR, filename))
    }

    /// Remove a stored file; missing files and paths outside the root are ignored
    pub async fn remove(&self, relative: &str) -> Result<()> {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!(path = relative, "Refusing to remove media outside the root");
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    /// Absolute path for a stored relative path, if it stays inside the root
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (plain && !relative.is_empty()).then(|| self.config.path.join(rel))
    }
}

/// MIME type for the image formats posts may carry
fn format_mime(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}
