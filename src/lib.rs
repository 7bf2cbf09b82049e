// Library exports for testing and reusability

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use error::{AppError, Result};

use config::UploadConfig;
use db::TourRepository;
use services::geo_query::GeoQueryService;
use services::image_ingest::{FilenameClock, ImageIngestor};
use services::tour_stats::TourStatsService;
use std::sync::Arc;
use std::time::Duration;

// App state for sharing across the application
pub struct AppState {
    pub tour_repo: Arc<dyn TourRepository>,
    pub tour_stats: TourStatsService,
    pub geo_query: GeoQueryService,
    pub image_ingestor: ImageIngestor,
    pub query_timeout: Duration,
}

impl AppState {
    pub fn new(
        tour_repo: Arc<dyn TourRepository>,
        query_timeout: Duration,
        upload: UploadConfig,
    ) -> Self {
        AppState {
            tour_stats: TourStatsService::new(tour_repo.clone(), query_timeout),
            geo_query: GeoQueryService::new(tour_repo.clone(), query_timeout),
            image_ingestor: ImageIngestor::new(upload, Arc::new(FilenameClock::new())),
            tour_repo,
            query_timeout,
        }
    }
}
