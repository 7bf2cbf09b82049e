use super::*;
use crate::db::pipeline::Accumulator;
use crate::models::{Difficulty, GeoPoint};
use time::macros::datetime;

fn make_tour(
    name: &str,
    difficulty: Difficulty,
    price: f64,
    dates: Vec<OffsetDateTime>,
    lat: f64,
    lng: f64,
) -> Tour {
    Tour {
        id: Uuid::new_v4(),
        name: name.to_string(),
        summary: Some(format!("Test tour: {name}")),
        difficulty,
        ratings_quantity: 10,
        ratings_average: 4.5,
        price,
        start_dates: dates,
        start_location: GeoPoint::from(Coordinates::new(lat, lng).unwrap()),
        image_cover: None,
        images: vec![],
    }
}

fn stats_pipeline() -> Pipeline {
    Pipeline::builder("stats")
        .group(
            GroupKey::Upper(TourField::Difficulty),
            vec![
                Accumulator::count("numTours"),
                Accumulator::sum("numRatings", TourField::RatingsQuantity),
                Accumulator::min("minPrice", TourField::Price),
                Accumulator::max("maxPrice", TourField::Price),
                Accumulator::avg("avgPrice", TourField::Price),
            ],
        )
        .sort("_id", SortOrder::Ascending)
        .build()
        .unwrap()
}

#[tokio::test]
async fn group_by_uppercased_difficulty() {
    let repo = MemoryTourRepository::with_tours(vec![
        make_tour("A", Difficulty::Easy, 100.0, vec![], 0.0, 0.0),
        make_tour("B", Difficulty::Easy, 300.0, vec![], 0.0, 0.0),
        make_tour("C", Difficulty::Difficult, 500.0, vec![], 0.0, 0.0),
    ]);

    let docs = repo.aggregate(&stats_pipeline()).await.unwrap();
    assert_eq!(docs.len(), 2);

    assert_eq!(docs[0]["_id"], "DIFFICULT");
    assert_eq!(docs[0]["numTours"], 1);

    assert_eq!(docs[1]["_id"], "EASY");
    assert_eq!(docs[1]["numTours"], 2);
    assert_eq!(docs[1]["numRatings"], 20);
    assert_eq!(docs[1]["minPrice"], 100.0);
    assert_eq!(docs[1]["maxPrice"], 300.0);
    assert_eq!(docs[1]["avgPrice"], 200.0);
}

#[tokio::test]
async fn unwind_drops_tours_without_dates() {
    let repo = MemoryTourRepository::with_tours(vec![
        make_tour("No dates", Difficulty::Easy, 100.0, vec![], 0.0, 0.0),
        make_tour(
            "Two dates",
            Difficulty::Easy,
            100.0,
            vec![datetime!(2021-03-01 10:00 UTC), datetime!(2021-07-01 10:00 UTC)],
            0.0,
            0.0,
        ),
    ]);

    let pipeline = Pipeline::builder("unwind")
        .unwind(TourField::StartDates)
        .group(
            GroupKey::Upper(TourField::Name),
            vec![Accumulator::count("rows")],
        )
        .build()
        .unwrap();

    let docs = repo.aggregate(&pipeline).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["_id"], "TWO DATES");
    assert_eq!(docs[0]["rows"], 2);
}

#[tokio::test]
async fn match_bounds_are_inclusive() {
    let from = datetime!(2021-01-01 0:00 UTC);
    let to = datetime!(2021-12-31 23:59:59 UTC);
    let repo = MemoryTourRepository::with_tours(vec![make_tour(
        "Edges",
        Difficulty::Medium,
        100.0,
        vec![from, to, datetime!(2020-12-31 23:59:59 UTC), datetime!(2022-01-01 0:00 UTC)],
        0.0,
        0.0,
    )]);

    let pipeline = Pipeline::builder("edges")
        .unwind(TourField::StartDates)
        .match_date_range(TourField::StartDates, from, to)
        .group(
            GroupKey::Month(TourField::StartDates),
            vec![Accumulator::count("amount")],
        )
        .sort("_id", SortOrder::Ascending)
        .build()
        .unwrap();

    let docs = repo.aggregate(&pipeline).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["_id"], 1);
    assert_eq!(docs[1]["_id"], 12);
}

#[tokio::test]
async fn month_is_taken_in_utc() {
    // 2021-02-01 01:00 at +03:00 is still January in UTC
    let repo = MemoryTourRepository::with_tours(vec![make_tour(
        "Offset",
        Difficulty::Medium,
        100.0,
        vec![datetime!(2021-02-01 01:00 +03:00)],
        0.0,
        0.0,
    )]);

    let pipeline = Pipeline::builder("utc")
        .unwind(TourField::StartDates)
        .group(
            GroupKey::Month(TourField::StartDates),
            vec![Accumulator::push("name", TourField::Name)],
        )
        .build()
        .unwrap();

    let docs = repo.aggregate(&pipeline).await.unwrap();
    assert_eq!(docs[0]["_id"], 1);
    assert_eq!(docs[0]["name"], serde_json::json!(["Offset"]));
}

#[tokio::test]
async fn find_within_sphere_uses_angular_radius() {
    // Los Angeles area center; one tour ~15 km away, one in San Francisco (~550 km)
    let center = Coordinates::new(34.08, -118.28).unwrap();
    let repo = MemoryTourRepository::with_tours(vec![
        make_tour("Near", Difficulty::Easy, 100.0, vec![], 34.0, -118.15),
        make_tour("Far", Difficulty::Easy, 100.0, vec![], 37.77, -122.42),
    ]);

    let radius = 50.0 / 6378.1; // 50 km
    let found = repo.find_within_sphere(&center, radius).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Near");

    let radius = 1000.0 / 6378.1;
    let found = repo.find_within_sphere(&center, radius).await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn geo_near_sorts_nearest_first_and_scales() {
    let center = Coordinates::new(0.0, 0.0).unwrap();
    let repo = MemoryTourRepository::with_tours(vec![
        make_tour("Two degrees", Difficulty::Easy, 100.0, vec![], 0.0, 2.0),
        make_tour("One degree", Difficulty::Easy, 100.0, vec![], 0.0, 1.0),
    ]);

    let results = repo.geo_near(&center, 0.001).await.unwrap();
    assert_eq!(results[0].name, "One degree");
    assert_eq!(results[1].name, "Two degrees");
    // One degree of longitude at the equator is ~111.2 km
    assert!((results[0].distance - 111.2).abs() < 0.5);
}

#[tokio::test]
async fn top_tours_cheapest_first() {
    let repo = MemoryTourRepository::with_tours(vec![
        make_tour("Pricey", Difficulty::Easy, 900.0, vec![], 0.0, 0.0),
        make_tour("Cheap", Difficulty::Easy, 100.0, vec![], 0.0, 0.0),
        make_tour("Mid", Difficulty::Easy, 500.0, vec![], 0.0, 0.0),
    ]);

    let top = repo.top_tours(2).await.unwrap();
    let names: Vec<&str> = top.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Cheap", "Mid"]);
}

#[tokio::test]
async fn replace_images_returns_previous_refs() {
    let mut tour = make_tour("Pics", Difficulty::Easy, 100.0, vec![], 0.0, 0.0);
    tour.image_cover = Some("old-cover.jpeg".to_string());
    tour.images = vec!["old-1.jpeg".to_string()];
    let id = tour.id;
    let repo = MemoryTourRepository::with_tours(vec![tour]);

    let new_images = IngestedImages {
        image_cover: Some("new-cover.jpeg".to_string()),
        images: vec![],
    };
    let previous = repo.replace_images(id, &new_images).await.unwrap().unwrap();
    assert_eq!(previous.image_cover.as_deref(), Some("old-cover.jpeg"));

    let stored = repo.get(id).await.unwrap();
    assert_eq!(stored.image_cover.as_deref(), Some("new-cover.jpeg"));
    // Gallery untouched when no gallery images were uploaded
    assert_eq!(stored.images, vec!["old-1.jpeg".to_string()]);

    assert!(repo
        .replace_images(Uuid::new_v4(), &new_images)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn insert_and_count() {
    let repo = MemoryTourRepository::new();
    assert_eq!(repo.count().await.unwrap(), 0);
    repo.insert(&make_tour("A", Difficulty::Easy, 1.0, vec![], 0.0, 0.0))
        .await
        .unwrap();
    assert_eq!(repo.count().await.unwrap(), 1);
}
