use crate::db::TourRepository;
use crate::error::{AppError, Result};
use crate::models::{Coordinates, DistanceUnit, Tour, TourDistance};
use crate::services::geo_math::{distance_multiplier, radius_from_distance};
use crate::services::with_timeout;
use std::sync::Arc;
use std::time::Duration;

/// Parse the `"lat,lng"` path parameter into typed coordinates.
pub fn parse_lat_lng(raw: &str) -> Result<Coordinates> {
    raw.parse().map_err(AppError::Validation)
}

fn parse_distance(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("Distance '{}' is not a number", raw)))
}

/// Read-only proximity queries over tour start locations.
#[derive(Clone)]
pub struct GeoQueryService {
    repo: Arc<dyn TourRepository>,
    query_timeout: Duration,
}

impl GeoQueryService {
    pub fn new(repo: Arc<dyn TourRepository>, query_timeout: Duration) -> Self {
        GeoQueryService {
            repo,
            query_timeout,
        }
    }

    /// All tours starting within `distance` of `latlng`. No pagination.
    pub async fn tours_within(&self, distance: &str, latlng: &str, unit: &str) -> Result<Vec<Tour>> {
        let center = parse_lat_lng(latlng)?;
        let unit = DistanceUnit::from_param(unit);
        let radius = radius_from_distance(parse_distance(distance)?, unit)?;

        tracing::info!(
            lat = center.lat,
            lng = center.lng,
            radius_rad = radius,
            %unit,
            "Tours-within query"
        );

        let tours = with_timeout(
            self.query_timeout,
            "tours-within query",
            self.repo.find_within_sphere(&center, radius),
        )
        .await?;

        tracing::info!("Tours-within query returned {} results", tours.len());
        Ok(tours)
    }

    /// Distance from `latlng` to every tour, in the near-query's order.
    pub async fn distances(&self, latlng: &str, unit: &str) -> Result<Vec<TourDistance>> {
        let center = parse_lat_lng(latlng)?;
        let unit = DistanceUnit::from_param(unit);
        let multiplier = distance_multiplier(unit);

        tracing::info!(lat = center.lat, lng = center.lng, %unit, "Distances query");

        with_timeout(
            self.query_timeout,
            "distances query",
            self.repo.geo_near(&center, multiplier),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pipeline::Pipeline;
    use crate::db::PreviousImages;
    use crate::models::{IngestedImages, TourSummary};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records the arguments of geo queries and returns nothing.
    #[derive(Default)]
    struct RecordingRepo {
        sphere_calls: Mutex<Vec<([f64; 2], f64)>>,
        near_calls: Mutex<Vec<([f64; 2], f64)>>,
    }

    #[async_trait]
    impl TourRepository for RecordingRepo {
        async fn aggregate(&self, _pipeline: &Pipeline) -> Result<Vec<serde_json::Value>> {
            Ok(vec![])
        }

        async fn find_within_sphere(
            &self,
            center: &Coordinates,
            radius_radians: f64,
        ) -> Result<Vec<Tour>> {
            self.sphere_calls
                .lock()
                .unwrap()
                .push((center.to_lng_lat(), radius_radians));
            Ok(vec![])
        }

        async fn geo_near(&self, center: &Coordinates, multiplier: f64) -> Result<Vec<TourDistance>> {
            self.near_calls
                .lock()
                .unwrap()
                .push((center.to_lng_lat(), multiplier));
            Ok(vec![])
        }

        async fn top_tours(&self, _limit: i64) -> Result<Vec<TourSummary>> {
            Ok(vec![])
        }

        async fn replace_images(
            &self,
            _id: Uuid,
            _images: &IngestedImages,
        ) -> Result<Option<PreviousImages>> {
            Ok(None)
        }

        async fn insert(&self, tour: &Tour) -> Result<Uuid> {
            Ok(tour.id)
        }

        async fn count(&self) -> Result<i64> {
            Ok(0)
        }

        fn backend_name(&self) -> &'static str {
            "recording"
        }
    }

    fn service() -> (Arc<RecordingRepo>, GeoQueryService) {
        let repo = Arc::new(RecordingRepo::default());
        let svc = GeoQueryService::new(repo.clone(), Duration::from_secs(5));
        (repo, svc)
    }

    #[tokio::test]
    async fn test_tours_within_swaps_to_lng_lat() {
        let (repo, svc) = service();
        svc.tours_within("250", "34.08,-118.28", "mi").await.unwrap();

        let calls = repo.sphere_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (center, radius) = calls[0];
        assert_eq!(center, [-118.28, 34.08]);
        assert_eq!(radius, 250.0 / 3963.2);
    }

    #[tokio::test]
    async fn test_tours_within_defaults_to_km() {
        let (repo, svc) = service();
        svc.tours_within("100", "10,20", "").await.unwrap();

        let calls = repo.sphere_calls.lock().unwrap();
        assert_eq!(calls[0].1, 100.0 / 6378.1);
    }

    #[tokio::test]
    async fn test_distances_use_physical_multiplier() {
        let (repo, svc) = service();
        svc.distances("34.08,-118.28", "km").await.unwrap();
        svc.distances("34.08,-118.28", "mi").await.unwrap();

        let calls = repo.near_calls.lock().unwrap();
        assert_eq!(calls[0].0, [-118.28, 34.08]);
        assert_eq!(calls[0].1, 0.001);
        assert_eq!(calls[1].1, 0.000621371);
    }

    #[tokio::test]
    async fn test_missing_coordinates_are_validation_errors() {
        let (repo, svc) = service();

        for latlng in ["", "34.08", "34.08,", ",-118.28", "north,west"] {
            let err = svc.tours_within("250", latlng, "mi").await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{latlng}: {err}");

            let err = svc.distances(latlng, "mi").await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{latlng}: {err}");
        }

        // Nothing reached the persistence layer
        assert!(repo.sphere_calls.lock().unwrap().is_empty());
        assert!(repo.near_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_distance_rejected() {
        let (_repo, svc) = service();
        for distance in ["abc", "0", "-5", ""] {
            let err = svc
                .tours_within(distance, "34.08,-118.28", "mi")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }
}
