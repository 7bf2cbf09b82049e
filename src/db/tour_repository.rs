use crate::db::pipeline::Pipeline;
use crate::error::Result;
use crate::models::{
    Coordinates, Difficulty, GeoPoint, IngestedImages, Tour, TourDistance, TourSummary,
};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared row-to-Tour conversion helpers
// ---------------------------------------------------------------------------

/// Raw tour fields extracted from a database row, before validation.
pub(super) struct RawTourRow {
    pub id: Uuid,
    pub name: String,
    pub summary: Option<String>,
    pub difficulty: String,
    pub price: f64,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub start_dates: Vec<OffsetDateTime>,
    pub start_location_geojson: String,
    pub image_cover: Option<String>,
    pub images: Vec<String>,
}

impl RawTourRow {
    /// Rows whose location cannot be parsed are logged and dropped.
    pub fn into_tour(self) -> Option<Tour> {
        let start_location: GeoPoint = match self.start_location_geojson.parse() {
            Ok(point) => point,
            Err(e) => {
                tracing::error!(
                    "Invalid start location for tour '{}' (id: {}): {}. Skipping row.",
                    self.name,
                    self.id,
                    e
                );
                return None;
            }
        };

        Some(Tour {
            difficulty: parse_difficulty(&self.difficulty, &self.name),
            id: self.id,
            name: self.name,
            summary: self.summary,
            ratings_quantity: self.ratings_quantity,
            ratings_average: self.ratings_average,
            price: self.price,
            start_dates: self.start_dates,
            start_location,
            image_cover: self.image_cover,
            images: self.images,
        })
    }
}

pub(super) fn parse_difficulty(raw: &str, tour_name: &str) -> Difficulty {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(
            "Invalid difficulty '{}' for tour '{}', defaulting to medium",
            raw,
            tour_name
        );
        Difficulty::Medium
    })
}

/// Image references a tour held before [`TourRepository::replace_images`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousImages {
    pub image_cover: Option<String>,
    pub images: Vec<String>,
}

/// Read access to the tour collection plus the image-reference update that
/// follows a successful ingestion.
#[async_trait]
pub trait TourRepository: Send + Sync {
    /// Execute a validated aggregation pipeline; one JSON document per output record.
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<serde_json::Value>>;

    /// Tours whose start location lies within `radius_radians` of `center` on a sphere.
    async fn find_within_sphere(
        &self,
        center: &Coordinates,
        radius_radians: f64,
    ) -> Result<Vec<Tour>>;

    /// Near-query: every tour's distance in meters times `multiplier`, nearest first.
    async fn geo_near(&self, center: &Coordinates, multiplier: f64) -> Result<Vec<TourDistance>>;

    /// Cheapest tours first, ties broken by lower rating.
    async fn top_tours(&self, limit: i64) -> Result<Vec<TourSummary>>;

    /// Point the tour at freshly written images. `None` when the tour does not exist.
    async fn replace_images(
        &self,
        id: Uuid,
        images: &IngestedImages,
    ) -> Result<Option<PreviousImages>>;

    async fn insert(&self, tour: &Tour) -> Result<Uuid>;

    async fn count(&self) -> Result<i64>;

    /// Version of the spatial extension, when the backend has one.
    async fn spatial_version(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn backend_name(&self) -> &'static str;
}

pub struct PgTourRepository {
    pool: sqlx::PgPool,
}

impl PgTourRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TourRepository for PgTourRepository {
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<serde_json::Value>> {
        Ok(super::tour_queries::run_pipeline(&self.pool, pipeline).await?)
    }

    async fn find_within_sphere(
        &self,
        center: &Coordinates,
        radius_radians: f64,
    ) -> Result<Vec<Tour>> {
        Ok(super::tour_queries::find_tours_within_sphere(&self.pool, center, radius_radians).await?)
    }

    async fn geo_near(&self, center: &Coordinates, multiplier: f64) -> Result<Vec<TourDistance>> {
        Ok(super::tour_queries::find_tour_distances(&self.pool, center, multiplier).await?)
    }

    async fn top_tours(&self, limit: i64) -> Result<Vec<TourSummary>> {
        Ok(super::tour_queries::find_top_tours(&self.pool, limit).await?)
    }

    async fn replace_images(
        &self,
        id: Uuid,
        images: &IngestedImages,
    ) -> Result<Option<PreviousImages>> {
        Ok(super::tour_queries::replace_tour_images(&self.pool, id, images).await?)
    }

    async fn insert(&self, tour: &Tour) -> Result<Uuid> {
        Ok(super::tour_queries::insert_tour(&self.pool, tour).await?)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tours")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn spatial_version(&self) -> Result<Option<String>> {
        let version: String = sqlx::query_scalar("SELECT PostGIS_Version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(version))
    }

    fn backend_name(&self) -> &'static str {
        "postgis"
    }
}
