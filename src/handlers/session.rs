use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::Value;
use tracing::instrument;

use super::{service_error_to_response, ApiJson, AppState};
use crate::auth::AuthenticatedRestaurant;
use crate::models::{AuthSession, IdentityResponse, LoginRequest, RegisterRequest};

#[instrument(name = "register", skip(state, request), fields(route = %request.route))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthSession>), (StatusCode, Json<Value>)> {
    state
        .business
        .trace_auth_attempt("register", state.service.register(request))
        .await
        .map(|session| (StatusCode::CREATED, Json(session)))
        .map_err(service_error_to_response)
}

#[instrument(name = "login", skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthSession>, (StatusCode, Json<Value>)> {
    state
        .business
        .trace_auth_attempt("login", state.service.login(request))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// Echo the identity carried by the caller's token
#[instrument(name = "get_identity", skip_all, fields(id = %identity.id))]
pub async fn get_identity(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
) -> Json<IdentityResponse> {
    Json(state.service.identity(&identity))
}
