use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    api, cors_layer, health_check, metrics_handler, not_implemented,
    request_validation_middleware, security_headers_middleware, server_up, AppState,
    RequestLimits,
};
use crate::observability::{observability_middleware, Metrics};

/// Assemble the full HTTP surface with its middleware pipeline.
///
/// Layers run outer to inner: HTTP tracing, observability, CORS, security
/// headers, request validation, then the auth gate on protected routes.
pub fn create_app(state: AppState, metrics: Arc<Metrics>, limits: RequestLimits) -> Router {
    let metrics_for_middleware = metrics.clone();

    let operational = Router::new()
        .route("/", get(server_up))
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    operational
        .merge(api::create_api_router(state))
        .fallback(not_implemented)
        .method_not_allowed_fallback(not_implemented)
        .layer(middleware::from_fn_with_state(
            limits,
            request_validation_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
        .layer(TraceLayer::new_for_http())
}
