use super::{success, success_array, success_list};
use crate::error::Result;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// GET /tours/tour-stats
pub async fn tour_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let stats = state.tour_stats.difficulty_stats().await?;
    Ok(success("stats", stats))
}

/// GET /tours/monthly-plan/{year}
pub async fn monthly_plan(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<Json<Value>> {
    tracing::info!(year = %year, "Monthly plan request");
    let plan = state.tour_stats.monthly_plan(&year).await?;
    Ok(success("plan", plan))
}

/// GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit}
pub async fn tours_within(
    State(state): State<Arc<AppState>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    let tours = state
        .geo_query
        .tours_within(&distance, &latlng, &unit)
        .await?;
    Ok(success_array(tours))
}

/// GET /tours/distances/{latlng}/unit/{unit}
pub async fn distances(
    State(state): State<Arc<AppState>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let distances = state.geo_query.distances(&latlng, &unit).await?;
    Ok(success_array(distances))
}

/// GET /tours/top-5-cheap
/// Five cheapest tours, lower rating first on equal price
pub async fn top_cheap(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let tours = state.tour_stats.top_tours().await?;
    Ok(success_list("data", tours))
}
