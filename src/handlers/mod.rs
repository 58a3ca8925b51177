pub mod api;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod session;

pub use api::*;
pub use health::*;
pub use metrics::*;
pub use middleware::*;
pub use session::*;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::auth::TokenService;
use crate::models::{RepositoryError, ServiceError};
use crate::observability::BusinessTracingMiddleware;
use crate::services::RestaurantService;

/// Shared state for every restaurant handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RestaurantService>,
    pub tokens: Arc<TokenService>,
    pub business: BusinessTracingMiddleware,
}

/// Builds the `{status, message, timestamp}` envelope every failure is rendered with
pub fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

pub fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let (status, message) = match err {
        ServiceError::Validation { message } => (StatusCode::BAD_REQUEST, message),
        ServiceError::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message),
        ServiceError::Conflict { message } => (StatusCode::CONFLICT, message),
        ServiceError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        ServiceError::Repository {
            source: RepositoryError::ConstraintViolation { message },
        } => (StatusCode::CONFLICT, message),
        ServiceError::Internal { message } => {
            crate::error_with_trace!(error = %message, "Internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
        ServiceError::Repository { source } => {
            crate::error_with_trace!(error = %source, "Store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };

    error_response(status, &message)
}

/// `Json` extractor whose rejection uses the error envelope instead of
/// axum's plain-text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "Rejected request body");
                // Malformed and mistyped bodies are both plain validation failures
                let status = match &rejection {
                    JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    other => other.status(),
                };
                Err(error_response(status, &rejection.body_text()))
            }
        }
    }
}
