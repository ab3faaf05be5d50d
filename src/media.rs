//! Local storage for uploaded images and avatars.
//!
//! Files are validated as PNG or JPEG and stored under the media directory,
//! named by the SHA-256 of their content. Stored paths are relative to the
//! media root and served from `/media/`.

use std::collections::HashMap;
use std::future::Future;
use std::io::Cursor;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::ImageFormat;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

/// URL prefix under which stored files are served.
pub const MEDIA_URL_PREFIX: &str = "/media/";

/// Largest accepted image, in pixels. Checked before decoding.
pub const MAX_IMAGE_PIXELS: u64 = 89_478_485;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("The submitted file is empty.")]
    Empty,
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    InvalidImage,
    #[error("Unsupported image format; upload a PNG or JPEG file.")]
    UnsupportedFormat,
    #[error("Image is too large ({width}x{height} pixels).")]
    TooManyPixels { width: u32, height: u32 },
    #[error("failed to store media file: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an uploaded file belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    PostImage,
    Avatar,
}

impl MediaKind {
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::PostImage => "images",
            Self::Avatar => "avatars",
        }
    }
}

/// Check that bytes decode as a PNG or JPEG image.
pub fn validate_image(data: &[u8]) -> Result<ImageFormat, MediaError> {
    validate_image_within(data, MAX_IMAGE_PIXELS)
}

fn validate_image_within(data: &[u8], max_pixels: u64) -> Result<ImageFormat, MediaError> {
    if data.is_empty() {
        return Err(MediaError::Empty);
    }
    let format = image::guess_format(data).map_err(|_| MediaError::InvalidImage)?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(MediaError::UnsupportedFormat);
    }

    // Header only; the declared size bounds what a full decode allocates
    let (width, height) = image::io::Reader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(|_| MediaError::InvalidImage)?;
    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(MediaError::TooManyPixels { width, height });
    }

    image::load_from_memory_with_format(data, format).map_err(|_| MediaError::InvalidImage)?;
    Ok(format)
}

type PinCounts = Arc<Mutex<HashMap<String, usize>>>;

/// A stored file that cannot be released until this guard is dropped.
///
/// Hold it until the row referencing the file is committed.
#[derive(Debug)]
#[must_use]
pub struct StoredMedia {
    path: String,
    pins: PinCounts,
}

impl StoredMedia {
    /// Path relative to the media root.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Deref for StoredMedia {
    type Target = str;

    fn deref(&self) -> &str {
        &self.path
    }
}

impl Drop for StoredMedia {
    fn drop(&mut self) {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = pins.get_mut(&self.path) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&self.path);
            }
        }
    }
}

/// Filesystem-backed media store.
///
/// Files are shared between rows with the same content, so writes and
/// deletions of a path are serialized and a file being saved is pinned.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    pins: PinCounts,
    io_lock: Arc<tokio::sync::Mutex<()>>,
}

impl MediaStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pins: PinCounts::default(),
            io_lock: Arc::default(),
        }
    }

    fn is_pinned(&self, relative: &str) -> bool {
        self.pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(relative)
    }

    fn pin(&self, relative: String) -> StoredMedia {
        *self
            .pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(relative.clone())
            .or_insert(0) += 1;
        StoredMedia {
            path: relative,
            pins: Arc::clone(&self.pins),
        }
    }

    /// Directory files are stored in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the media directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub async fn ensure_dirs(&self) -> Result<(), MediaError> {
        for kind in [MediaKind::PostImage, MediaKind::Avatar] {
            tokio::fs::create_dir_all(self.root.join(kind.directory())).await?;
        }
        Ok(())
    }

    /// Validate and store an uploaded image.
    ///
    /// The returned guard keeps the file from being released until dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a PNG/JPEG image or cannot be written.
    pub async fn save_image(&self, kind: MediaKind, data: &[u8]) -> Result<StoredMedia, MediaError> {
        let format = validate_image(data)?;
        let extension = match format {
            ImageFormat::Png => "png",
            _ => "jpg",
        };

        let digest = hex::encode(Sha256::digest(data));
        let relative = format!("{}/{digest}.{extension}", kind.directory());
        let path = self.root.join(&relative);

        let _io = self.io_lock.lock().await;
        let stored = self.pin(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %stored.path(), "Media file already stored");
        } else {
            tokio::fs::write(&path, data).await?;
            debug!(path = %stored.path(), bytes = data.len(), "Stored media file");
        }

        Ok(stored)
    }

    /// Delete a stored file unless it is pinned or `in_use` reports a reference.
    ///
    /// `in_use` runs while saves are held off, so a reference committed by a
    /// concurrent save is always seen.
    pub async fn release<F, Fut>(&self, relative: &str, in_use: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<bool>>,
    {
        let _io = self.io_lock.lock().await;
        if self.is_pinned(relative) {
            debug!(path = %relative, "Media file is being saved");
            return;
        }
        match in_use().await {
            Ok(false) => self.delete(relative).await,
            Ok(true) => debug!(path = %relative, "Media file still referenced"),
            Err(e) => warn!(path = %relative, "Failed to check media references: {e}"),
        }
    }

    /// Remove a stored file. Missing files and bad paths are logged, not returned.
    async fn delete(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            warn!(path = %relative, "Refusing to delete media outside the media root");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %relative, "Deleted media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %relative, "Failed to delete media file: {e}"),
        }
    }

    /// Absolute path of a stored file, if the relative path stays inside the root.
    #[must_use]
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(rel))
    }
}

/// Public URL path of a stored file.
#[must_use]
pub fn media_url(relative: &str) -> String {
    format!("{MEDIA_URL_PREFIX}{relative}")
}
