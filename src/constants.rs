//! Stable application-wide constants.
//!
//! Values here are physical constants, wire-format limits, and default
//! fallbacks for env-var-based configuration. They should rarely change.
//! Upload limits that operators may want to tune live in
//! [`UploadConfig`](crate::config::UploadConfig) instead.

// --- Server defaults (used when HOST / PORT env vars are absent) ---

/// Default bind address for the HTTP server.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port for the HTTP server.
pub const DEFAULT_PORT: &str = "3000";
/// Default timeout applied to every persistence query. Overridden by `QUERY_TIMEOUT_SECS`.
pub const DEFAULT_QUERY_TIMEOUT_SECONDS: u64 = 10;

// --- Earth model ---
// `radius_from_distance` divides a linear distance by these to get the angular
// radius of a spherical cap.

/// Equatorial Earth radius in statute miles.
pub const EARTH_RADIUS_MI: f64 = 3963.2;
/// Equatorial Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6378.1;
/// Sphere radius PostGIS uses for `use_spheroid = false` geography math.
/// Converts an angular radius back into meters for `ST_DWithin`.
pub const POSTGIS_SPHERE_RADIUS_METERS: f64 = 6_371_008.8;

// --- Meter conversion factors (near-query distances are native meters) ---

/// 1 meter in statute miles.
pub const MILES_PER_METER: f64 = 0.000_621_371;
/// 1 meter in kilometers.
pub const KILOMETERS_PER_METER: f64 = 0.001;

// --- Aggregation ---

/// Upper bound on Monthly Plan records. A calendar year has twelve months;
/// the limit only bites on malformed data.
pub const MONTHLY_PLAN_MAX_RECORDS: u32 = 12;
/// Number of tours returned by the top-tours alias.
pub const TOP_TOURS_LIMIT: i64 = 5;

// --- Image ingestion defaults (used when env vars are absent) ---

/// Multipart field carrying the single cover image.
pub const COVER_FIELD: &str = "imageCover";
/// Multipart field carrying the gallery images.
pub const GALLERY_FIELD: &str = "images";
/// Maximum number of cover images per request.
pub const MAX_COVER_IMAGES: usize = 1;
/// Default maximum number of gallery images per request.
pub const DEFAULT_MAX_GALLERY_IMAGES: usize = 8;
/// Default per-file size limit in bytes.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 5_000_000;
/// Output canvas width in pixels.
pub const DEFAULT_IMAGE_WIDTH: u32 = 1080;
/// Output canvas height in pixels.
pub const DEFAULT_IMAGE_HEIGHT: u32 = 720;
/// JPEG quality of normalized images.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
/// Extension of normalized images.
pub const IMAGE_EXTENSION: &str = "jpeg";
/// Default root directory holding the per-category image folders.
pub const DEFAULT_IMAGE_ROOT: &str = "public/img";
/// Default timeout for transforming and writing one ingestion batch.
pub const DEFAULT_IMAGE_WRITE_TIMEOUT_SECONDS: u64 = 30;
/// Slack added on top of the file payloads when sizing the request body limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
