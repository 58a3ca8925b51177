use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use super::error_response;

/// Limits enforced on incoming requests before they reach a handler
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_request_size: u64,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
        }
    }
}

type Rejection = (StatusCode, Json<Value>);

/// Rejects bodies that are not JSON or that announce a length above the limit.
pub async fn request_validation_middleware(
    State(limits): State<RequestLimits>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    if carries_body(request.method()) {
        check_content_type(&request)?;
    }
    check_declared_length(&request, limits.max_request_size)?;

    Ok(next.run(request).await)
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn check_content_type(request: &Request<Body>) -> Result<(), Rejection> {
    let Some(content_type) = request.headers().get(header::CONTENT_TYPE) else {
        warn!(method = %request.method(), "Body sent without a content type");
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Content-Type header is required for requests with body",
        ));
    };

    let content_type = content_type.to_str().unwrap_or_default();
    if content_type.starts_with("application/json") {
        return Ok(());
    }
    warn!(content_type, "Unsupported content type");
    Err(error_response(
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        "Content-Type must be application/json",
    ))
}

fn check_declared_length(request: &Request<Body>, limit: u64) -> Result<(), Rejection> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);

    if declared <= limit {
        return Ok(());
    }
    warn!(declared, limit, "Request body too large");
    Err(error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!(
            "Request size {} bytes exceeds maximum of {} bytes",
            declared, limit
        ),
    ))
}

/// Any origin may call the API; the ordering front-end is served elsewhere
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(86400))
}

const SECURITY_HEADERS: [(header::HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
];

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::post, Router};
    use tower::ServiceExt;

    async fn echo() -> &'static str {
        "ok"
    }

    fn app(max_request_size: u64) -> Router {
        Router::new()
            .route("/new-table", post(echo).get(echo))
            .layer(middleware::from_fn_with_state(
                RequestLimits { max_request_size },
                request_validation_middleware,
            ))
            .layer(middleware::from_fn(security_headers_middleware))
    }

    #[tokio::test]
    async fn test_post_requires_json_content_type() {
        let missing = Request::builder()
            .method(Method::POST)
            .uri("/new-table")
            .body(Body::from("{}"))
            .unwrap();
        let response = app(1024).oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let wrong = Request::builder()
            .method(Method::POST)
            .uri("/new-table")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("{}"))
            .unwrap();
        let response = app(1024).oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_oversized_request_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/new-table")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "2048")
            .body(Body::from("{}"))
            .unwrap();

        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_get_passes_and_carries_security_headers() {
        let request = Request::builder()
            .uri("/new-table")
            .body(Body::empty())
            .unwrap();

        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }
}
