use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod memory_repo;
pub mod pipeline;
mod tour_queries;
pub mod tour_repository;

pub use memory_repo::MemoryTourRepository;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use tour_repository::{PgTourRepository, PreviousImages, TourRepository};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}
