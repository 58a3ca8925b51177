use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::auth::{AuthPayload, AuthenticatedRestaurant, CredentialService, TokenService};
use crate::models::{
    normalize_email, validate_command_lines, validate_menu, validate_menu_item_name,
    validate_price, AuthSession, Command, CreateCommandRequest, CreateTableRequest,
    EditMenuItemRequest, IdentityResponse, LoginRequest, MenuItem, MenuResponse, RegisterRequest,
    RepositoryError, Restaurant, RestaurantUpdate, ServiceError, ServiceResult, Table, Validate,
};
use crate::repositories::RestaurantRepository;

pub const INVALID_CREDENTIALS: &str = "Email or Password invalid";
pub const RESTAURANT_NOT_FOUND: &str = "Restaurant not found!";
pub const TABLE_NOT_FOUND: &str = "Table not found";
pub const TABLE_ALREADY_EXISTS: &str = "Table already exists";
pub const MENU_ITEM_ALREADY_EXISTS: &str = "The item already exists.";
pub const COMMAND_INVALID: &str = "Command invalid";
pub const ROUTE_MISMATCH: &str = "Route not match";
pub const TABLE_DELETE_FORBIDDEN: &str = "Table can not be deleted";
pub const MENU_ITEM_FIELDS_REQUIRED: &str = "Field: ingredients, name, pic, price are required";
pub const ROUTE_IN_USE: &str = "Route already in use";
pub const EMAIL_IN_USE: &str = "Email already in use";

/// Result of editing a single menu item
#[derive(Debug, Clone, PartialEq)]
pub enum MenuItemEdit {
    Updated(MenuItem),
    Unchanged,
    Missing,
}

/// Result of removing something that may already be gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Missing,
}

/// Business operations for restaurant accounts, menus, tables and commands
pub struct RestaurantService {
    repository: Arc<dyn RestaurantRepository>,
    credentials: CredentialService,
    tokens: Arc<TokenService>,
}

impl RestaurantService {
    pub fn new(
        repository: Arc<dyn RestaurantRepository>,
        credentials: CredentialService,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            repository,
            credentials,
            tokens,
        }
    }

    /// Create a restaurant account and sign the caller in
    #[instrument(skip(self, request), fields(route = %request.route))]
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<AuthSession> {
        request.validate()?;

        let email = normalize_email(&request.email);

        if self.repository.find_by_route(&request.route).await?.is_some() {
            return Err(ServiceError::conflict(ROUTE_IN_USE));
        }
        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict(EMAIL_IN_USE));
        }

        let password_hash = self.credentials.hash(request.password).await?;
        let restaurant = Restaurant::new(
            request.name.trim().to_string(),
            request.route,
            email,
            password_hash,
        );

        // A concurrent registration can still win the race between check and insert
        let restaurant = self
            .repository
            .create(restaurant)
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation { message } => {
                    ServiceError::Conflict { message }
                }
                other => other.into(),
            })?;

        crate::info_with_trace!(id = %restaurant.id, "Restaurant registered");
        self.session_for(&restaurant)
    }

    /// Exchange credentials for a token. Unknown email and wrong password are
    /// indistinguishable to the caller.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<AuthSession> {
        let email = normalize_email(&request.email);

        let Some(restaurant) = self.repository.find_by_email(&email).await? else {
            debug!("Login for unknown email");
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        };

        if !self
            .credentials
            .verify(request.password, restaurant.password_hash.clone())
            .await
        {
            crate::warn_with_trace!(id = %restaurant.id, "Login with wrong password");
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        }

        crate::info_with_trace!(id = %restaurant.id, "Restaurant logged in");
        self.session_for(&restaurant)
    }

    pub fn identity(&self, identity: &AuthenticatedRestaurant) -> IdentityResponse {
        IdentityResponse {
            id: identity.id.clone(),
            name: identity.name.clone(),
            route: identity.route.clone(),
        }
    }

    /// All tables of the caller's restaurant, `None` when the restaurant is gone
    #[instrument(skip(self, identity), fields(id = %identity.id))]
    pub async fn get_tables(
        &self,
        identity: &AuthenticatedRestaurant,
    ) -> ServiceResult<Option<Vec<Table>>> {
        Ok(self
            .repository
            .find_by_id(&identity.id)
            .await?
            .map(|restaurant| restaurant.tables))
    }

    /// One table of the caller's restaurant, matched by hash or by name
    #[instrument(skip(self, identity), fields(id = %identity.id))]
    pub async fn get_table(
        &self,
        identity: &AuthenticatedRestaurant,
        key: &str,
    ) -> ServiceResult<Option<Table>> {
        Ok(self
            .repository
            .find_by_id(&identity.id)
            .await?
            .and_then(|restaurant| restaurant.find_table(key).cloned()))
    }

    /// Public menu lookup by route
    #[instrument(skip(self))]
    pub async fn get_menu(&self, route: &str) -> ServiceResult<MenuResponse> {
        let restaurant = self
            .repository
            .find_by_route(route)
            .await?
            .ok_or_else(|| ServiceError::not_found(RESTAURANT_NOT_FOUND))?;

        Ok(MenuResponse {
            message: format!("Menu from {}", restaurant.name),
            menu: restaurant.menu,
        })
    }

    #[instrument(skip(self, identity), fields(id = %identity.id))]
    pub async fn create_table(
        &self,
        identity: &AuthenticatedRestaurant,
        request: CreateTableRequest,
    ) -> ServiceResult<Table> {
        request.validate()?;

        let restaurant = self.require_restaurant(&identity.id).await?;
        if restaurant.has_table_conflict(&request.hash, &request.name) {
            return Err(ServiceError::conflict(TABLE_ALREADY_EXISTS));
        }

        let table = Table {
            hash: request.hash,
            name: request.name,
            commands: Vec::new(),
        };

        let changed = self
            .repository
            .update(&identity.id, RestaurantUpdate::PushTable(table.clone()))
            .await
            .map_err(|e| ServiceError::from_repository(e, TABLE_ALREADY_EXISTS))?;
        if !changed {
            return Err(ServiceError::not_found(RESTAURANT_NOT_FOUND));
        }

        crate::info_with_trace!(hash = %table.hash, "Table created");
        Ok(table)
    }

    /// Anonymous order placement at a table of the restaurant behind `route`
    #[instrument(skip(self, request))]
    pub async fn create_command(
        &self,
        route: &str,
        hash: &str,
        request: CreateCommandRequest,
    ) -> ServiceResult<Command> {
        let restaurant = self
            .repository
            .find_by_route(route)
            .await?
            .ok_or_else(|| ServiceError::not_found(RESTAURANT_NOT_FOUND))?;

        if restaurant.table_by_hash(hash).is_none() {
            return Err(ServiceError::not_found(TABLE_NOT_FOUND));
        }

        let items = validate_command_lines(&request.command).map_err(|e| {
            debug!(error = %e, "Rejected command");
            ServiceError::validation(COMMAND_INVALID)
        })?;

        let command = Command {
            items,
            date: request.date.unwrap_or_else(Utc::now),
        };

        let changed = self
            .repository
            .update(
                &restaurant.id,
                RestaurantUpdate::PrependCommand {
                    hash: hash.to_string(),
                    command: command.clone(),
                },
            )
            .await?;
        if !changed {
            // Table removed between lookup and write
            return Err(ServiceError::not_found(TABLE_NOT_FOUND));
        }

        crate::info_with_trace!(hash = %hash, lines = command.items.len(), "Command added");
        Ok(command)
    }

    #[instrument(skip(self, identity, item), fields(id = %identity.id, item_id = %item.id))]
    pub async fn add_menu_item(
        &self,
        identity: &AuthenticatedRestaurant,
        item: MenuItem,
    ) -> ServiceResult<MenuItem> {
        item.validate()?;

        let restaurant = self.require_restaurant(&identity.id).await?;
        if restaurant.menu_item(&item.id).is_some() {
            return Err(ServiceError::conflict(MENU_ITEM_ALREADY_EXISTS));
        }

        let changed = self
            .repository
            .update(&identity.id, RestaurantUpdate::PushMenuItem(item.clone()))
            .await
            .map_err(|e| ServiceError::from_repository(e, MENU_ITEM_ALREADY_EXISTS))?;
        if !changed {
            return Err(ServiceError::not_found(RESTAURANT_NOT_FOUND));
        }

        Ok(item)
    }

    /// Replace the whole menu
    #[instrument(skip(self, identity, menu), fields(id = %identity.id, items = menu.len()))]
    pub async fn update_menu(
        &self,
        identity: &AuthenticatedRestaurant,
        menu: Vec<MenuItem>,
    ) -> ServiceResult<Vec<MenuItem>> {
        validate_menu(&menu)?;
        self.require_restaurant(&identity.id).await?;

        self.repository
            .update(&identity.id, RestaurantUpdate::ReplaceMenu(menu.clone()))
            .await
            .map_err(|e| ServiceError::from_repository(e, MENU_ITEM_ALREADY_EXISTS))?;

        Ok(menu)
    }

    /// Replace the content of one menu item. `route` in the path must be the
    /// caller's own route.
    #[instrument(skip(self, identity, request), fields(id = %identity.id))]
    pub async fn edit_menu_item(
        &self,
        identity: &AuthenticatedRestaurant,
        route: &str,
        item_id: &str,
        request: EditMenuItemRequest,
    ) -> ServiceResult<MenuItemEdit> {
        let present = |field: Option<String>| field.filter(|value| !value.trim().is_empty());
        let (Some(ingredients), Some(name), Some(pic), Some(price)) = (
            present(request.ingredients),
            present(request.name),
            present(request.pic),
            request.price,
        ) else {
            return Err(ServiceError::validation(MENU_ITEM_FIELDS_REQUIRED));
        };

        ensure_owner(identity, route, ROUTE_MISMATCH)?;

        validate_menu_item_name(&name)?;
        validate_price(&price)?;

        let restaurant = self.require_restaurant(&identity.id).await?;
        if restaurant.menu_item(item_id).is_none() {
            return Ok(MenuItemEdit::Missing);
        }

        let item = MenuItem {
            id: item_id.to_string(),
            name,
            ingredients,
            pic,
            price,
        };

        let changed = self
            .repository
            .update(&identity.id, RestaurantUpdate::ReplaceMenuItem(item.clone()))
            .await?;

        Ok(if changed {
            MenuItemEdit::Updated(item)
        } else {
            MenuItemEdit::Unchanged
        })
    }

    #[instrument(skip(self, identity), fields(id = %identity.id))]
    pub async fn delete_menu_item(
        &self,
        identity: &AuthenticatedRestaurant,
        route: &str,
        item_id: &str,
    ) -> ServiceResult<Removal> {
        ensure_owner(identity, route, ROUTE_MISMATCH)?;

        let removed = self
            .repository
            .update(
                &identity.id,
                RestaurantUpdate::RemoveMenuItem {
                    id: item_id.to_string(),
                },
            )
            .await?;

        Ok(removal(removed))
    }

    #[instrument(skip(self, identity), fields(id = %identity.id))]
    pub async fn delete_table(
        &self,
        identity: &AuthenticatedRestaurant,
        route: &str,
        hash: &str,
    ) -> ServiceResult<Removal> {
        ensure_owner(identity, route, TABLE_DELETE_FORBIDDEN)?;

        let removed = self
            .repository
            .update(
                &identity.id,
                RestaurantUpdate::RemoveTable {
                    hash: hash.to_string(),
                },
            )
            .await?;

        Ok(removal(removed))
    }

    /// Drop every command on a table. Unknown tables are a silent no-op.
    #[instrument(skip(self, identity), fields(id = %identity.id))]
    pub async fn clear_table(
        &self,
        identity: &AuthenticatedRestaurant,
        hash: &str,
    ) -> ServiceResult<()> {
        let cleared = self
            .repository
            .update(
                &identity.id,
                RestaurantUpdate::ClearCommands {
                    hash: hash.to_string(),
                },
            )
            .await?;

        debug!(cleared, "Clear table processed");
        Ok(())
    }

    async fn require_restaurant(&self, id: &str) -> ServiceResult<Restaurant> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(RESTAURANT_NOT_FOUND))
    }

    fn session_for(&self, restaurant: &Restaurant) -> ServiceResult<AuthSession> {
        let token = self.tokens.issue(&AuthPayload {
            id: restaurant.id.clone(),
            name: restaurant.name.clone(),
            route: restaurant.route.clone(),
        })?;

        Ok(AuthSession {
            token,
            restaurant: restaurant.summary(),
        })
    }
}

fn ensure_owner(
    identity: &AuthenticatedRestaurant,
    route: &str,
    message: &str,
) -> ServiceResult<()> {
    if identity.route == route {
        Ok(())
    } else {
        Err(ServiceError::conflict(message))
    }
}

fn removal(removed: bool) -> Removal {
    if removed {
        Removal::Removed
    } else {
        Removal::Missing
    }
}
