//! Upload ingestion: validate, normalise to JPEG, name and store.
//!
//! A batch moves through `Received -> Validated -> Transformed -> Written`.
//! Nothing touches the disk until every file in the batch has passed
//! validation. A batch that fails part-way removes the files it finished
//! writing. On timeout a write already handed to the blocking pool can still
//! land after that cleanup, and such a file stays orphaned.

use crate::config::UploadConfig;
use crate::constants::{COVER_FIELD, GALLERY_FIELD, IMAGE_EXTENSION, MAX_COVER_IMAGES};
use crate::error::{AppError, Result};
use crate::models::{CleanupOutcome, ImageCategory, IngestedImages, UploadedFile};
use crate::services::with_timeout;
use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Hands out millisecond stamps for filenames.
///
/// A reservation of `count` stamps never overlaps any earlier reservation,
/// even when the wall clock has not advanced between requests.
#[derive(Debug)]
pub struct FilenameClock {
    next_free: AtomicU64,
}

impl FilenameClock {
    pub const fn new() -> Self {
        FilenameClock {
            next_free: AtomicU64::new(0),
        }
    }

    /// Reserve `count` consecutive stamps and return the first one.
    pub fn reserve(&self, count: u64) -> u64 {
        let count = count.max(1);
        let now = now_millis();
        let mut current = self.next_free.load(Ordering::Acquire);
        loop {
            let start = now.max(current);
            match self.next_free.compare_exchange_weak(
                current,
                start + count,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return start,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for FilenameClock {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    u64::try_from(millis).unwrap_or(0)
}

pub fn image_file_name(owner_id: &str, stamp: u64) -> String {
    format!("{}-{}.{}", owner_id, stamp, IMAGE_EXTENSION)
}

/// Filenames for a batch starting at `base`: cover first, then the gallery
/// in input order.
fn planned_names(
    owner_id: &str,
    base: u64,
    has_cover: bool,
    gallery_len: usize,
) -> IngestedImages {
    IngestedImages {
        image_cover: has_cover.then(|| image_file_name(owner_id, base)),
        images: (0..gallery_len as u64)
            .map(|i| image_file_name(owner_id, base + 1 + i))
            .collect(),
    }
}

fn is_safe_component(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn validate_owner_id(owner_id: &str) -> Result<()> {
    let valid = !owner_id.is_empty()
        && owner_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid image owner id '{}'",
            owner_id
        )))
    }
}

/// Decode, hard-resize to `width`x`height` and re-encode as JPEG.
fn encode_jpeg(bytes: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AppError::Ingestion(format!("Could not decode image: {}", e)))?;
    let rgb = decoded
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| AppError::Ingestion(format!("Could not encode JPEG: {}", e)))?;
    Ok(out)
}

/// Clones share the filename clock, so batches from any clone never collide.
#[derive(Debug, Clone)]
pub struct ImageIngestor {
    config: UploadConfig,
    clock: Arc<FilenameClock>,
    write_timeout: Duration,
}

impl ImageIngestor {
    pub fn new(config: UploadConfig, clock: Arc<FilenameClock>) -> Self {
        let write_timeout = config.write_timeout();
        ImageIngestor {
            config,
            clock,
            write_timeout,
        }
    }

    /// Override the whole-batch deadline taken from the config.
    pub fn with_write_timeout(mut self, limit: Duration) -> Self {
        self.write_timeout = limit;
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn category_dir(&self, category: ImageCategory) -> PathBuf {
        self.config.image_root.join(category.dir_name())
    }

    /// Run one upload batch to completion.
    ///
    /// Returns the stored filenames only after every write has finished.
    /// An empty batch is passed through untouched.
    pub async fn ingest(
        &self,
        owner_id: &str,
        category: ImageCategory,
        files: Vec<UploadedFile>,
    ) -> Result<IngestedImages> {
        validate_owner_id(owner_id)?;

        let (cover, gallery) = self.split_fields(files)?;

        if let Some(bad) = cover.iter().chain(gallery.iter()).find(|f| !f.is_image()) {
            tracing::info!(
                owner_id,
                file = bad.display_name(),
                content_type = bad.content_type.as_deref().unwrap_or(""),
                "Rejected upload batch with a non-image file"
            );
            return Err(AppError::InvalidFileType(
                "Not an image! Please upload only images.".to_string(),
            ));
        }

        if cover.is_empty() && gallery.is_empty() {
            return Ok(IngestedImages::default());
        }

        let base = self.clock.reserve(1 + gallery.len() as u64);
        let names = planned_names(owner_id, base, !cover.is_empty(), gallery.len());
        let dir = self.category_dir(category);

        tracing::info!(
            owner_id,
            %category,
            cover = cover.len(),
            gallery = gallery.len(),
            "Ingesting images"
        );

        let jobs: Vec<(String, Vec<u8>)> = names
            .all_files()
            .map(str::to_string)
            .zip(cover.into_iter().chain(gallery).map(|f| f.bytes))
            .collect();

        let outcome = with_timeout(
            self.write_timeout,
            "image ingestion",
            self.transform_and_write(&dir, jobs),
        )
        .await;

        if let Err(e) = outcome {
            tracing::error!(owner_id, "Image ingestion failed: {}", e);
            self.discard(&dir, &names).await;
            return Err(e);
        }

        Ok(names)
    }

    /// Delete a superseded image. Failures are reported, never raised.
    pub async fn remove_image(&self, category: ImageCategory, filename: &str) -> CleanupOutcome {
        if !is_safe_component(filename) {
            tracing::warn!(filename, "Refusing to remove image with an unsafe name");
            return CleanupOutcome::Rejected(format!("unsafe filename '{}'", filename));
        }

        let path = self.category_dir(category).join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed image");
                CleanupOutcome::Removed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Image to remove was already gone");
                CleanupOutcome::Missing
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to remove image: {}", e);
                CleanupOutcome::Failed(e.to_string())
            }
        }
    }

    /// Sort files into cover and gallery, enforcing field names, counts and sizes.
    fn split_fields(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<(Vec<UploadedFile>, Vec<UploadedFile>)> {
        let mut cover = Vec::new();
        let mut gallery = Vec::new();

        for file in files {
            if file.bytes.len() > self.config.max_file_size {
                return Err(AppError::Validation(format!(
                    "File '{}' exceeds the {} byte limit",
                    file.display_name(),
                    self.config.max_file_size
                )));
            }
            match file.field.as_str() {
                COVER_FIELD => cover.push(file),
                GALLERY_FIELD => gallery.push(file),
                other => {
                    return Err(AppError::Validation(format!(
                        "Unexpected upload field '{}'",
                        other
                    )))
                }
            }
        }

        if cover.len() > MAX_COVER_IMAGES {
            return Err(AppError::Validation(format!(
                "At most {} file(s) allowed in '{}'",
                MAX_COVER_IMAGES, COVER_FIELD
            )));
        }
        if gallery.len() > self.config.max_gallery_images {
            return Err(AppError::Validation(format!(
                "At most {} files allowed in '{}'",
                self.config.max_gallery_images, GALLERY_FIELD
            )));
        }

        Ok((cover, gallery))
    }

    async fn transform_and_write(&self, dir: &Path, jobs: Vec<(String, Vec<u8>)>) -> Result<()> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::Ingestion(format!("Could not create {}: {}", dir.display(), e))
        })?;

        // All writes settle before the batch reports
        let writes = jobs
            .into_iter()
            .map(|(name, bytes)| self.transform_and_write_one(dir.join(name), bytes));
        join_all(writes).await.into_iter().collect()
    }

    async fn transform_and_write_one(&self, path: PathBuf, bytes: Vec<u8>) -> Result<()> {
        let (width, height, quality) =
            (self.config.width, self.config.height, self.config.jpeg_quality);

        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&bytes, width, height, quality))
            .await
            .map_err(|e| AppError::Ingestion(format!("Image worker failed: {}", e)))??;

        tokio::fs::write(&path, &encoded).await.map_err(|e| {
            AppError::Ingestion(format!("Could not write {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), bytes = encoded.len(), "Wrote image");
        Ok(())
    }

    async fn discard(&self, dir: &Path, names: &IngestedImages) {
        for name in names.all_files() {
            let path = dir.join(name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Discarded partial upload"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Could not discard partial upload: {}", e)
                }
            }
        }
    }
}
