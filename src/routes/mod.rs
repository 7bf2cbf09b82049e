pub mod debug;
pub mod images;
pub mod tours;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.image_ingestor.config().max_request_bytes();

    Router::new()
        .route("/tours/tour-stats", get(tours::tour_stats))
        .route("/tours/monthly-plan/{year}", get(tours::monthly_plan))
        .route(
            "/tours/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours::tours_within),
        )
        .route(
            "/tours/distances/{latlng}/unit/{unit}",
            get(tours::distances),
        )
        .route("/tours/top-5-cheap", get(tours::top_cheap))
        .route(
            "/tours/{id}/images",
            patch(images::upload_tour_images).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/debug/health", get(debug::health_check))
        .with_state(state)
}

/// `{"status": "success", "data": {<key>: value}}`
pub(crate) fn success<T: Serialize>(key: &str, value: T) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { key: value },
    }))
}

/// Same envelope with a `results` count for list responses.
pub(crate) fn success_list<T: Serialize>(key: &str, items: Vec<T>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": items.len(),
        "data": { key: items },
    }))
}

/// `{"status": "success", "results": n, "data": [...]}`
pub(crate) fn success_array<T: Serialize>(items: Vec<T>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": items.len(),
        "data": items,
    }))
}
