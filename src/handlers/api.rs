use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{error_response, service_error_to_response, ApiJson, AppState};
use crate::auth::{auth_middleware, AuthenticatedRestaurant};
use crate::models::{
    CommandResponse, CreateCommandRequest, CreateTableRequest, EditMenuItemRequest, MenuItem,
    MenuResponse, MessageResponse, TableResponse, TablesResponse, UpdateMenuRequest,
};
use crate::services::{MenuItemEdit, Removal};

type ApiError = (StatusCode, Json<Value>);

/// Restaurant routes. Menu lookup and command placement are public; every
/// other route requires a valid token.
pub fn create_api_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/login", post(super::login))
        .route("/register", post(super::register))
        .route("/:route/menu", get(get_menu))
        .route("/:route/:table", post(create_command));

    let protected = Router::new()
        .route("/route", get(super::get_identity))
        .route("/table", get(get_tables))
        .route("/table/:hash", get(get_table).delete(clear_table))
        .route("/new-table", post(create_table))
        .route("/new-menu", post(update_menu))
        .route("/add-to-menu", post(add_menu_item))
        .route(
            "/:route/menu/:id",
            put(edit_menu_item).delete(delete_menu_item),
        )
        .route("/:route/table/:hash", axum::routing::delete(delete_table))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            auth_middleware,
        ));

    // Set after the auth layer so a wrong method answers 501 without a token
    public
        .merge(protected)
        .method_not_allowed_fallback(not_implemented)
        .with_state(state)
}

/// Answers every unmatched route and every unsupported method
pub async fn not_implemented() -> ApiError {
    error_response(StatusCode::NOT_IMPLEMENTED, "Not Implemented")
}

// =============================================================================
// TABLE ENDPOINTS
// =============================================================================

#[instrument(name = "get_tables", skip_all, fields(id = %identity.id))]
pub async fn get_tables(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
) -> Result<Json<TablesResponse>, ApiError> {
    let tables = state
        .service
        .get_tables(&identity)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(TablesResponse {
        message: table_message(tables.is_some()).to_string(),
        tables,
    }))
}

#[instrument(name = "get_table", skip(state, identity), fields(id = %identity.id))]
pub async fn get_table(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    Path(hash): Path<String>,
) -> Result<Json<TableResponse>, ApiError> {
    let table = state
        .service
        .get_table(&identity, &hash)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(TableResponse {
        message: table_message(table.is_some()).to_string(),
        table,
    }))
}

#[instrument(name = "create_table", skip_all, fields(id = %identity.id))]
pub async fn create_table(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    ApiJson(request): ApiJson<CreateTableRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let table = state
        .business
        .trace_restaurant_operation("create_table", state.service.create_table(&identity, request))
        .await
        .map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "New table created", "table": table })),
    ))
}

/// Drops every command on the table; unknown hashes are acknowledged the same way
#[instrument(name = "clear_table", skip(state, identity), fields(id = %identity.id))]
pub async fn clear_table(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    Path(hash): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .business
        .trace_restaurant_operation("clear_table", state.service.clear_table(&identity, &hash))
        .await
        .map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Table clear", "table": hash })),
    ))
}

#[instrument(name = "delete_table", skip(state, identity), fields(id = %identity.id))]
pub async fn delete_table(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    Path((route, hash)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removal = state
        .business
        .trace_restaurant_operation(
            "delete_table",
            state.service.delete_table(&identity, &route, &hash),
        )
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(MessageResponse::new(match removal {
        Removal::Removed => "Table removed!",
        Removal::Missing => "This table does not exist!",
    })))
}

// =============================================================================
// COMMAND ENDPOINTS
// =============================================================================

/// Customers place commands without an account
#[instrument(name = "create_command", skip(state, request))]
pub async fn create_command(
    State(state): State<AppState>,
    Path((route, table)): Path<(String, String)>,
    ApiJson(request): ApiJson<CreateCommandRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = state
        .business
        .trace_restaurant_operation(
            "create_command",
            state.service.create_command(&route, &table, request),
        )
        .await
        .map_err(service_error_to_response)?;

    crate::info_with_trace!(route = %route, table = %table, "Command placed");

    Ok((
        StatusCode::CREATED,
        Json(CommandResponse {
            message: "New command added in the table".to_string(),
            table,
            command,
        }),
    ))
}

// =============================================================================
// MENU ENDPOINTS
// =============================================================================

#[instrument(name = "get_menu", skip(state))]
pub async fn get_menu(
    State(state): State<AppState>,
    Path(route): Path<String>,
) -> Result<Json<MenuResponse>, ApiError> {
    state
        .service
        .get_menu(&route)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "add_menu_item", skip_all, fields(id = %identity.id, item_id = %item.id))]
pub async fn add_menu_item(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    ApiJson(item): ApiJson<MenuItem>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let item = state
        .business
        .trace_restaurant_operation("add_menu_item", state.service.add_menu_item(&identity, item))
        .await
        .map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Item add to Menu", "item": item })),
    ))
}

/// Full menu replacement
#[instrument(name = "update_menu", skip_all, fields(id = %identity.id))]
pub async fn update_menu(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    ApiJson(request): ApiJson<UpdateMenuRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let menu = state
        .business
        .trace_restaurant_operation(
            "update_menu",
            state.service.update_menu(&identity, request.menu),
        )
        .await
        .map_err(service_error_to_response)?;

    info!(items = menu.len(), "Menu replaced");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Menu updated", "menu": menu })),
    ))
}

#[instrument(name = "edit_menu_item", skip(state, identity, request), fields(id = %identity.id))]
pub async fn edit_menu_item(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    Path((route, item_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<EditMenuItemRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let edit = state
        .business
        .trace_restaurant_operation(
            "edit_menu_item",
            state
                .service
                .edit_menu_item(&identity, &route, &item_id, request),
        )
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(MessageResponse::new(match edit {
        MenuItemEdit::Updated(_) => "Item updated!",
        MenuItemEdit::Unchanged => "This item is already updated!",
        MenuItemEdit::Missing => "This item does not exist!",
    })))
}

#[instrument(name = "delete_menu_item", skip(state, identity), fields(id = %identity.id))]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    identity: AuthenticatedRestaurant,
    Path((route, item_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removal = state
        .business
        .trace_restaurant_operation(
            "delete_menu_item",
            state.service.delete_menu_item(&identity, &route, &item_id),
        )
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(MessageResponse::new(match removal {
        Removal::Removed => "Item removed!",
        Removal::Missing => "This item does not exist!",
    })))
}

fn table_message(found: bool) -> &'static str {
    if found {
        "Table in the restaurant"
    } else {
        "Table not found"
    }
}
