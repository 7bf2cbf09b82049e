use crate::constants::*;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub query_timeout_secs: u64,
    pub upload: UploadConfig,
}

/// Limits and output format for image ingestion.
///
/// Passed explicitly to [`ImageIngestor::new`](crate::services::image_ingest::ImageIngestor::new)
/// so every ingestor carries its own transport limits.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory containing the `tours/` and `users/` image folders
    pub image_root: PathBuf,

    /// Per-file size limit in bytes
    pub max_file_size: usize,

    /// Maximum number of files in the gallery field
    pub max_gallery_images: usize,

    /// Output canvas width in pixels (hard resize, aspect ratio not kept)
    pub width: u32,

    /// Output canvas height in pixels
    pub height: u32,

    /// JPEG quality, 1-100
    pub jpeg_quality: u8,

    /// Budget for transforming and writing one request's images
    pub write_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            image_root: PathBuf::from(DEFAULT_IMAGE_ROOT),
            max_file_size: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_gallery_images: DEFAULT_MAX_GALLERY_IMAGES,
            width: DEFAULT_IMAGE_WIDTH,
            height: DEFAULT_IMAGE_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            write_timeout_secs: DEFAULT_IMAGE_WRITE_TIMEOUT_SECONDS,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let config = Self {
            image_root: env::var("IMAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.image_root),

            max_file_size: env::var("UPLOAD_MAX_FILE_SIZE")
                .unwrap_or_else(|_| defaults.max_file_size.to_string())
                .parse()
                .map_err(|_| "Invalid UPLOAD_MAX_FILE_SIZE")?,

            max_gallery_images: env::var("UPLOAD_MAX_GALLERY_IMAGES")
                .unwrap_or_else(|_| defaults.max_gallery_images.to_string())
                .parse()
                .map_err(|_| "Invalid UPLOAD_MAX_GALLERY_IMAGES")?,

            width: env::var("IMAGE_WIDTH")
                .unwrap_or_else(|_| defaults.width.to_string())
                .parse()
                .map_err(|_| "Invalid IMAGE_WIDTH")?,

            height: env::var("IMAGE_HEIGHT")
                .unwrap_or_else(|_| defaults.height.to_string())
                .parse()
                .map_err(|_| "Invalid IMAGE_HEIGHT")?,

            jpeg_quality: env::var("IMAGE_JPEG_QUALITY")
                .unwrap_or_else(|_| defaults.jpeg_quality.to_string())
                .parse()
                .map_err(|_| "Invalid IMAGE_JPEG_QUALITY")?,

            write_timeout_secs: env::var("IMAGE_WRITE_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.write_timeout_secs.to_string())
                .parse()
                .map_err(|_| "Invalid IMAGE_WRITE_TIMEOUT_SECS")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("IMAGE_WIDTH and IMAGE_HEIGHT must be positive".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err("IMAGE_JPEG_QUALITY must be between 1 and 100".to_string());
        }
        if self.max_file_size == 0 {
            return Err("UPLOAD_MAX_FILE_SIZE must be positive".to_string());
        }
        if self.write_timeout_secs == 0 {
            return Err("IMAGE_WRITE_TIMEOUT_SECS must be positive".to_string());
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Largest multipart body a full batch can legitimately produce.
    pub fn max_request_bytes(&self) -> usize {
        let files = MAX_COVER_IMAGES + self.max_gallery_images;
        self.max_file_size
            .saturating_mul(files)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        let query_timeout_secs: u64 = env::var("QUERY_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_QUERY_TIMEOUT_SECONDS.to_string())
            .parse()
            .map_err(|_| "Invalid QUERY_TIMEOUT_SECS")?;

        if query_timeout_secs == 0 {
            return Err("QUERY_TIMEOUT_SECS must be positive".to_string());
        }

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| "Invalid PORT")?,
            database_url: env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            query_timeout_secs,
            upload: UploadConfig::from_env()?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.width, 1080);
        assert_eq!(config.height, 720);
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.max_file_size, 5_000_000);
        assert_eq!(config.max_gallery_images, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_upload_validation() {
        let config = UploadConfig {
            jpeg_quality: 0,
            ..UploadConfig::default()
        };
        assert!(config.validate().is_err());

        let config = UploadConfig {
            width: 0,
            ..UploadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_request_bytes_covers_full_batch() {
        let config = UploadConfig::default();
        assert!(config.max_request_bytes() >= 9 * 5_000_000);
    }
}
