use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{Status, TraceContextExt};
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, instrument, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{get_current_trace_id, Metrics};
use crate::models::{ServiceError, ServiceResult};

fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|value| value.to_str().ok())
}

/// First hop of `x-forwarded-for`, then `x-real-ip`.
fn client_address(request: &Request) -> String {
    header(request, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .or_else(|| header(request, "x-real-ip"))
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Wraps every request in a server span and records the HTTP metrics.
///
/// Metrics are labelled with the matched route template, never the raw
/// path, so restaurant routes and table hashes stay out of label values.
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let span_name = format!("{} {}", method, endpoint);

    let span = tracing::info_span!(
        target: "qmenu_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %request.uri().path(),
        http.user_agent = %header(&request, "user-agent").unwrap_or("unknown"),
        client.address = %client_address(&request),
        http.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async move {
        metrics.increment_in_flight(&method, &endpoint);
        let trace_id = get_current_trace_id().unwrap_or_default();
        debug!(trace_id = %trace_id, "Request started");

        let response = next.run(request).await;

        let elapsed = started.elapsed();
        let status = response.status().as_u16();
        let span = tracing::Span::current();
        span.record("http.status_code", status);
        span.record("http.response_time_ms", elapsed.as_millis());
        span.context().span().set_status(if status >= 500 {
            Status::error("server error")
        } else {
            Status::Ok
        });

        metrics.decrement_in_flight(&method, &endpoint);
        metrics.record_http_request(&method, &endpoint, status, elapsed.as_secs_f64());

        let duration_ms = elapsed.as_millis();
        match status {
            500..=u16::MAX => error!(trace_id = %trace_id, status, duration_ms, "Request failed"),
            400..=499 => warn!(trace_id = %trace_id, status, duration_ms, "Request rejected"),
            _ => info!(trace_id = %trace_id, status, duration_ms, "Request completed"),
        }

        response
    }
    .instrument(span)
    .await
}

/// Times restaurant store calls.
#[derive(Clone)]
pub struct DatabaseTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl DatabaseTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(skip_all, fields(operation = %operation, store = %store))]
    pub async fn trace_operation<F, T, E>(
        &self,
        operation: &str,
        store: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let result = future.await;
        let elapsed = started.elapsed();

        self.metrics
            .record_database_operation(operation, store, result.is_ok(), elapsed.as_secs_f64());
        if let Err(error) = &result {
            error!(error = %error, duration_ms = elapsed.as_millis(), "Store call failed");
        }

        result
    }
}

/// Records business outcomes for authentication and restaurant operations
#[derive(Clone)]
pub struct BusinessTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl BusinessTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a login or registration. Client-side failures count as
    /// `rejected`, everything else that fails as `error`.
    #[instrument(skip_all, fields(operation = %operation))]
    pub async fn trace_auth_attempt<F, T>(&self, operation: &str, future: F) -> ServiceResult<T>
    where
        F: std::future::Future<Output = ServiceResult<T>>,
    {
        let result = future.await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(
                ServiceError::Unauthorized { .. }
                | ServiceError::Conflict { .. }
                | ServiceError::Validation { .. },
            ) => "rejected",
            Err(_) => "error",
        };
        self.metrics.record_auth_attempt(operation, outcome);

        if let Err(error) = &result {
            warn!(outcome = outcome, error = %error, "Authentication attempt failed");
        }

        result
    }

    #[instrument(skip_all, fields(operation = %operation))]
    pub async fn trace_restaurant_operation<F, T>(
        &self,
        operation: &str,
        future: F,
    ) -> ServiceResult<T>
    where
        F: std::future::Future<Output = ServiceResult<T>>,
    {
        let start_time = Instant::now();
        let result = future.await;

        self.metrics
            .record_restaurant_operation(operation, result.is_ok());

        match &result {
            Ok(_) => info!(
                duration_ms = start_time.elapsed().as_millis(),
                "Restaurant operation completed successfully"
            ),
            Err(error) => warn!(
                error = %error,
                duration_ms = start_time.elapsed().as_millis(),
                "Restaurant operation failed"
            ),
        }

        result
    }
}
