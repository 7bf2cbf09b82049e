use crate::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /debug/health - Check the tour store is reachable
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let repo = &state.tour_repo;
    let mut status = json!({
        "status": "ok",
        "backend": repo.backend_name(),
        "checks": {}
    });

    match repo.count().await {
        Ok(count) => {
            status["checks"]["database"] = json!("ok");
            status["checks"]["tour_count"] = json!(count);
        }
        Err(e) => {
            status["checks"]["database"] = json!({"error": e.to_string()});
            status["status"] = json!("error");
        }
    }

    match repo.spatial_version().await {
        Ok(Some(version)) => {
            status["checks"]["postgis"] = json!(version);
        }
        Ok(None) => {}
        Err(e) => {
            status["checks"]["postgis"] = json!({"error": e.to_string()});
            status["status"] = json!("error");
        }
    }

    Json(status)
}
