use axum::response::Json;
use serde_json::{json, Value};
use tracing::instrument;

/// Bare liveness probe kept for existing clients
pub async fn server_up() -> Json<Value> {
    Json(json!({ "message": "Server Up" }))
}

/// Health document for load balancers and dashboards
#[instrument(name = "health_check")]
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
