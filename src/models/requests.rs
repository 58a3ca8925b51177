use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Command, MenuItem, RestaurantSummary, Table};

/// Request model for registering a new restaurant
#[derive(Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub route: String,
    pub email: String,
    pub password: String,
}

/// Request model for logging in
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Password fields never reach a log line.
impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateTableRequest {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateMenuRequest {
    #[serde(default)]
    pub menu: Vec<MenuItem>,
}

/// Partial menu item as sent by the edit endpoint. Every field is required,
/// but missing ones surface as a validation error rather than a parse error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EditMenuItemRequest {
    pub ingredients: Option<String>,
    pub name: Option<String>,
    pub pic: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

/// A command line as submitted by a customer. Accepts `id` or the legacy `_id`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommandLineRequest {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub qtd: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateCommandRequest {
    #[serde(default)]
    pub command: Vec<CommandLineRequest>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Token plus restaurant projection returned by login and registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub restaurant: RestaurantSummary,
}

/// Identity carried by a validated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub id: String,
    pub name: String,
    pub route: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesResponse {
    pub message: String,
    pub tables: Option<Vec<Table>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResponse {
    pub message: String,
    pub table: Option<Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuResponse {
    pub message: String,
    pub menu: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub message: String,
    pub table: String,
    pub command: Command,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
