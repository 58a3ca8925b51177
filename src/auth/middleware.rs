use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{AuthenticatedRestaurant, TokenService};
use crate::handlers::error_response;

/// Pulls the token out of the Authorization header.
///
/// Both `Bearer <token>` and a bare token are accepted; an empty value counts
/// as missing.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Rejects requests without a valid token and attaches the restaurant identity
/// to the request extensions for downstream handlers.
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "No token provided"))?;

    let claims = tokens.validate(token).map_err(|e| {
        debug!("Token validation failed: {}", e);
        error_response(StatusCode::UNAUTHORIZED, &e.to_string())
    })?;

    request
        .extensions_mut()
        .insert(AuthenticatedRestaurant::from(claims));

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedRestaurant
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedRestaurant>()
            .cloned()
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "No token provided"))
    }
}
