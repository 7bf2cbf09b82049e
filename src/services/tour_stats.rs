use crate::constants::{MONTHLY_PLAN_MAX_RECORDS, TOP_TOURS_LIMIT};
use crate::db::pipeline::{Accumulator, GroupKey, Pipeline, SortOrder, TourField};
use crate::db::TourRepository;
use crate::error::{AppError, Result};
use crate::models::{DifficultyStats, MonthlyPlan, TourSummary};
use crate::services::with_timeout;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use time::{Date, Month, OffsetDateTime};

/// Group every tour by uppercased difficulty.
pub fn difficulty_stats_pipeline() -> Result<Pipeline> {
    Pipeline::builder("difficulty-stats")
        .group(
            GroupKey::Upper(TourField::Difficulty),
            vec![
                Accumulator::count("numTours"),
                Accumulator::sum("numRatings", TourField::RatingsQuantity),
                Accumulator::avg("avgRating", TourField::RatingsAverage),
                Accumulator::avg("avgPrice", TourField::Price),
                Accumulator::min("minPrice", TourField::Price),
                Accumulator::max("maxPrice", TourField::Price),
            ],
        )
        .build()
}

/// Tour starts per calendar month of `year`, one name per start date.
pub fn monthly_plan_pipeline(year: i32) -> Result<Pipeline> {
    let (from, to) = year_bounds(year)?;

    Pipeline::builder("monthly-plan")
        .unwind(TourField::StartDates)
        .match_date_range(TourField::StartDates, from, to)
        .group(
            GroupKey::Month(TourField::StartDates),
            vec![
                Accumulator::count("amount"),
                Accumulator::push("name", TourField::Name),
            ],
        )
        .add_field("month", "_id")
        .sort("month", SortOrder::Ascending)
        .exclude(&["_id"])
        .limit(MONTHLY_PLAN_MAX_RECORDS)
        .build()
}

/// First instant of January 1st through the last instant of December 31st, UTC.
fn year_bounds(year: i32) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let invalid = |e: time::error::ComponentRange| {
        AppError::Validation(format!("Invalid year {}: {}", year, e))
    };

    let from = Date::from_calendar_date(year, Month::January, 1)
        .map_err(invalid)?
        .midnight()
        .assume_utc();
    let to = Date::from_calendar_date(year, Month::December, 31)
        .map_err(invalid)?
        .with_hms_nano(23, 59, 59, 999_999_999)
        .map_err(invalid)?
        .assume_utc();

    Ok((from, to))
}

/// Accepts exactly four ASCII digits with no leading zero.
pub fn parse_year(raw: &str) -> Result<i32> {
    let valid = raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) && !raw.starts_with('0');
    if !valid {
        return Err(AppError::Validation(format!(
            "Year must be a 4-digit number, got '{}'",
            raw
        )));
    }
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid year '{}'", raw)))
}

/// Runs the analytical pipelines. Results are computed on every call.
#[derive(Clone)]
pub struct TourStatsService {
    repo: Arc<dyn TourRepository>,
    query_timeout: Duration,
}

impl TourStatsService {
    pub fn new(repo: Arc<dyn TourRepository>, query_timeout: Duration) -> Self {
        TourStatsService {
            repo,
            query_timeout,
        }
    }

    /// One record per difficulty present, sorted by label.
    pub async fn difficulty_stats(&self) -> Result<Vec<DifficultyStats>> {
        let pipeline = difficulty_stats_pipeline()?;
        let mut stats: Vec<DifficultyStats> = self.run(&pipeline).await?;
        stats.sort_by(|a, b| a.difficulty.cmp(&b.difficulty));

        tracing::debug!("Difficulty stats returned {} groups", stats.len());
        Ok(stats)
    }

    pub async fn monthly_plan(&self, year_param: &str) -> Result<Vec<MonthlyPlan>> {
        let year = parse_year(year_param)?;
        let pipeline = monthly_plan_pipeline(year)?;
        let plan: Vec<MonthlyPlan> = self.run(&pipeline).await?;

        if let Some(bad) = plan.iter().find(|p| !(1..=12).contains(&p.month)) {
            return Err(AppError::Internal(format!(
                "Monthly plan produced month {} for year {}",
                bad.month, year
            )));
        }

        tracing::debug!(year, months = plan.len(), "Monthly plan computed");
        Ok(plan)
    }

    pub async fn top_tours(&self) -> Result<Vec<TourSummary>> {
        with_timeout(
            self.query_timeout,
            "top tours query",
            self.repo.top_tours(TOP_TOURS_LIMIT),
        )
        .await
    }

    async fn run<T: DeserializeOwned>(&self, pipeline: &Pipeline) -> Result<Vec<T>> {
        let docs = with_timeout(
            self.query_timeout,
            pipeline.name(),
            self.repo.aggregate(pipeline),
        )
        .await?;

        docs.into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| {
                    AppError::Internal(format!(
                        "Pipeline '{}' returned an unexpected record: {}",
                        pipeline.name(),
                        e
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTourRepository;
    use crate::models::{Coordinates, Difficulty, GeoPoint, Tour};
    use time::macros::datetime;
    use uuid::Uuid;

    fn tour(name: &str, difficulty: Difficulty, price: f64, dates: Vec<OffsetDateTime>) -> Tour {
        Tour {
            id: Uuid::new_v4(),
            name: name.to_string(),
            summary: None,
            difficulty,
            ratings_quantity: 5,
            ratings_average: 4.0,
            price,
            start_dates: dates,
            start_location: GeoPoint::from(Coordinates::new(0.0, 0.0).unwrap()),
            image_cover: None,
            images: vec![],
        }
    }

    fn service(tours: Vec<Tour>) -> TourStatsService {
        TourStatsService::new(
            Arc::new(MemoryTourRepository::with_tours(tours)),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2021").unwrap(), 2021);
        assert!(parse_year("21").is_err());
        assert!(parse_year("20211").is_err());
        assert!(parse_year("abcd").is_err());
        assert!(parse_year("0999").is_err());
        assert!(parse_year("-202").is_err());
        assert!(parse_year("").is_err());
    }

    #[test]
    fn test_year_bounds_cover_whole_year() {
        let (from, to) = year_bounds(2021).unwrap();
        assert_eq!(from, datetime!(2021-01-01 0:00 UTC));
        assert_eq!(to, datetime!(2022-01-01 0:00 UTC) - time::Duration::NANOSECOND);
    }

    #[tokio::test]
    async fn test_difficulty_stats() {
        let svc = service(vec![
            tour("A", Difficulty::Easy, 397.0, vec![]),
            tour("B", Difficulty::Easy, 497.0, vec![]),
            tour("C", Difficulty::Difficult, 997.0, vec![]),
        ]);

        let stats = svc.difficulty_stats().await.unwrap();
        assert_eq!(stats.len(), 2);

        let easy = stats.iter().find(|s| s.difficulty == "EASY").unwrap();
        assert_eq!(easy.num_tours, 2);
        assert_eq!(easy.num_ratings, 10);
        assert_eq!(easy.min_price, 397.0);
        assert_eq!(easy.max_price, 497.0);
        assert_eq!(easy.avg_price, 447.0);
        assert_eq!(easy.avg_rating, 4.0);

        let hard = stats.iter().find(|s| s.difficulty == "DIFFICULT").unwrap();
        assert_eq!(hard.num_tours, 1);
        assert_eq!(hard.min_price, hard.max_price);
    }

    #[tokio::test]
    async fn test_monthly_plan_counts_each_start() {
        let svc = service(vec![
            tour(
                "Sea Explorer",
                Difficulty::Medium,
                497.0,
                vec![
                    datetime!(2021-06-19 10:00 UTC),
                    datetime!(2021-06-27 10:00 UTC),
                    datetime!(2022-06-19 10:00 UTC),
                ],
            ),
            tour(
                "Forest Hiker",
                Difficulty::Easy,
                397.0,
                vec![datetime!(2021-06-01 10:00 UTC), datetime!(2021-03-05 10:00 UTC)],
            ),
        ]);

        let plan = svc.monthly_plan("2021").await.unwrap();
        assert_eq!(plan.len(), 2);

        assert_eq!(plan[0].month, 3);
        assert_eq!(plan[0].amount, 1);

        let june = &plan[1];
        assert_eq!(june.month, 6);
        assert_eq!(june.amount, 3);
        let sea_count = june.name.iter().filter(|n| *n == "Sea Explorer").count();
        assert_eq!(sea_count, 2);
    }

    #[tokio::test]
    async fn test_monthly_plan_sorted_and_bounded() {
        let dates: Vec<OffsetDateTime> = (1..=12u8)
            .rev()
            .map(|m| {
                Date::from_calendar_date(2021, Month::try_from(m).unwrap(), 15)
                    .unwrap()
                    .midnight()
                    .assume_utc()
            })
            .collect();
        let svc = service(vec![tour("All year", Difficulty::Easy, 100.0, dates)]);

        let plan = svc.monthly_plan("2021").await.unwrap();
        assert_eq!(plan.len(), 12);
        let months: Vec<u8> = plan.iter().map(|p| p.month).collect();
        assert_eq!(months, (1..=12).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_monthly_plan_empty_year() {
        let svc = service(vec![tour(
            "Old",
            Difficulty::Easy,
            100.0,
            vec![datetime!(2019-05-01 10:00 UTC)],
        )]);
        assert!(svc.monthly_plan("2021").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_monthly_plan_rejects_bad_year() {
        let svc = service(vec![]);
        let err = svc.monthly_plan("twenty").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
