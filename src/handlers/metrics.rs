use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use crate::observability::Metrics;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// `GET /metrics` in the Prometheus text exposition format.
pub async fn metrics_handler(
    State(metrics): State<Arc<Metrics>>,
) -> Result<impl IntoResponse, StatusCode> {
    let body = metrics.encode().map_err(|e| {
        error!(error = %e, "Could not render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, PROMETHEUS_TEXT)], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_scrape_lists_recorded_series() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_database_operation("find_by_route", "memory", true, 0.004);
        metrics.record_auth_attempt("login", "success");
        metrics.record_restaurant_operation("create_command", false);

        let response = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(metrics)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROMETHEUS_TEXT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains(r#"database_operations_total{operation="find_by_route",status="success",store="memory"} 1"#));
        assert!(text.contains(r#"auth_attempts_total{operation="login",outcome="success"} 1"#));
        assert!(text.contains(r#"restaurant_operations_total{operation="create_command",status="error"} 1"#));
    }
}
