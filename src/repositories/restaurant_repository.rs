use async_trait::async_trait;
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use crate::models::{
    Command, CommandLine, MenuItem, RepositoryError, RepositoryResult, Restaurant,
    RestaurantUpdate, Table,
};

/// Attempts made by a read-apply-write update before giving up on contention
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

const RESTAURANT_PREFIX: &str = "RESTAURANT#";
const ROUTE_PREFIX: &str = "ROUTE#";
const EMAIL_PREFIX: &str = "EMAIL#";

/// Trait defining the interface for restaurant data access operations
#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    /// Insert a new restaurant. Fails with `ConstraintViolation` when the route
    /// or the email is already taken.
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>>;

    async fn find_by_route(&self, route: &str) -> RepositoryResult<Option<Restaurant>>;

    /// Lookup by normalized email
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Restaurant>>;

    /// Apply a targeted update atomically. Returns whether anything changed.
    async fn update(&self, id: &str, update: RestaurantUpdate) -> RepositoryResult<bool>;
}

/// DynamoDB implementation of the RestaurantRepository trait.
///
/// Uses a single table keyed by `pk`. Restaurants live under
/// `RESTAURANT#<id>`; `ROUTE#<route>` and `EMAIL#<email>` guard items point back
/// at the restaurant id and enforce uniqueness through a transactional write.
pub struct DynamoDbRestaurantRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbRestaurantRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// Create a DynamoDB subsegment span with AWS and database attributes
    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.request_id" = tracing::field::Empty,
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "http.status_code" = tracing::field::Empty,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
        )
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn get_by_key(&self, pk: String) -> RepositoryResult<Option<HashMap<String, AttributeValue>>> {
        let get_span = self.create_dynamodb_span("GetItem");

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("pk", AttributeValue::S(pk))
                .consistent_read(true)
                .send()
                .await;

            match &result {
                Ok(output) => {
                    tracing::Span::current().record("http.status_code", 200);
                    if let Some(request_id) = output.request_id() {
                        tracing::Span::current().record("aws.request_id", request_id);
                    }
                }
                Err(e) => {
                    tracing::Span::current().record("http.status_code", 400);
                    error!("DynamoDB GetItem failed: {}", e);
                }
            }

            result.map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(get_span)
        .await?;

        Ok(response.item)
    }

    /// Follows a guard item to the restaurant it points at
    async fn find_by_guard(&self, pk: String) -> RepositoryResult<Option<Restaurant>> {
        let Some(guard) = self.get_by_key(pk).await? else {
            return Ok(None);
        };

        let restaurant_id = string_attr(&guard, "restaurant_id")?;
        self.find_by_id(&restaurant_id).await
    }

    fn guard_put(&self, pk: String, restaurant_id: &str) -> RepositoryResult<Put> {
        let mut item = HashMap::new();
        item.insert("pk".to_string(), AttributeValue::S(pk));
        item.insert(
            "restaurant_id".to_string(),
            AttributeValue::S(restaurant_id.to_string()),
        );

        Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(pk)")
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: e.to_string(),
            })
    }

    /// Convert DynamoDB error to RepositoryError
    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            },
            other => RepositoryError::AwsSdk {
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl RestaurantRepository for DynamoDbRestaurantRepository {
    #[instrument(skip(self, restaurant), fields(table = %self.table_name, id = %restaurant.id, route = %restaurant.route))]
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        info!("Creating new restaurant");

        let restaurant_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(restaurant_to_item(&restaurant)))
            .condition_expression("attribute_not_exists(pk)")
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: e.to_string(),
            })?;
        let route_put = self.guard_put(route_key(&restaurant.route), &restaurant.id)?;
        let email_put = self.guard_put(email_key(&restaurant.email), &restaurant.id)?;

        let transact_span = self.create_dynamodb_span("TransactWriteItems");

        let result = async {
            self.client
                .transact_write_items()
                .transact_items(TransactWriteItem::builder().put(restaurant_put).build())
                .transact_items(TransactWriteItem::builder().put(route_put).build())
                .transact_items(TransactWriteItem::builder().put(email_put).build())
                .send()
                .await
        }
        .instrument(transact_span)
        .await;

        match result {
            Ok(_) => {
                info!("Restaurant created successfully");
                Ok(restaurant)
            }
            Err(e) => match DynamoDbError::from(e) {
                DynamoDbError::TransactionCanceledException(cancelled) => {
                    let failed: Vec<bool> = cancelled
                        .cancellation_reasons()
                        .iter()
                        .map(|reason| reason.code() == Some("ConditionalCheckFailed"))
                        .collect();

                    let message = match failed.as_slice() {
                        [_, true, ..] => "Route already in use",
                        [_, _, true, ..] => "Email already in use",
                        _ => "Restaurant already exists",
                    };
                    warn!("Restaurant creation rejected: {}", message);

                    Err(RepositoryError::ConstraintViolation {
                        message: message.to_string(),
                    })
                }
                other => Err(self.map_dynamodb_error(other)),
            },
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>> {
        match self.get_by_key(restaurant_key(id)).await? {
            Some(item) => Ok(Some(item_to_restaurant(&item)?)),
            None => {
                info!("Restaurant not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, route = %route))]
    async fn find_by_route(&self, route: &str) -> RepositoryResult<Option<Restaurant>> {
        self.find_by_guard(route_key(route)).await
    }

    #[instrument(skip(self, email), fields(table = %self.table_name))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Restaurant>> {
        self.find_by_guard(email_key(email)).await
    }

    #[instrument(skip(self, update), fields(table = %self.table_name, id = %id, operation = update.operation_name()))]
    async fn update(&self, id: &str, update: RestaurantUpdate) -> RepositoryResult<bool> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Some(mut restaurant) = self.find_by_id(id).await? else {
                return Ok(false);
            };

            let expected_version = restaurant.version;
            if !restaurant.apply(update.clone())? {
                info!("Update matched nothing");
                return Ok(false);
            }

            let put_span = self.create_dynamodb_span("PutItem");

            let result = async {
                self.client
                    .put_item()
                    .table_name(&self.table_name)
                    .set_item(Some(restaurant_to_item(&restaurant)))
                    .condition_expression("#version = :expected")
                    .expression_attribute_names("#version", "version")
                    .expression_attribute_values(
                        ":expected",
                        AttributeValue::N(expected_version.to_string()),
                    )
                    .send()
                    .await
            }
            .instrument(put_span)
            .await;

            match result {
                Ok(_) => {
                    info!("Restaurant updated");
                    return Ok(true);
                }
                Err(e) => match DynamoDbError::from(e) {
                    DynamoDbError::ConditionalCheckFailedException(_) => {
                        warn!(attempt, "Concurrent modification detected, retrying update");
                    }
                    other => return Err(self.map_dynamodb_error(other)),
                },
            }
        }

        Err(RepositoryError::TransactionFailed {
            message: format!(
                "Restaurant {} kept changing after {} attempts",
                id, MAX_UPDATE_ATTEMPTS
            ),
        })
    }
}

pub(crate) fn restaurant_key(id: &str) -> String {
    format!("{}{}", RESTAURANT_PREFIX, id)
}

pub(crate) fn route_key(route: &str) -> String {
    format!("{}{}", ROUTE_PREFIX, route)
}

pub(crate) fn email_key(email: &str) -> String {
    format!("{}{}", EMAIL_PREFIX, email)
}

/// Convert a Restaurant to DynamoDB attribute values
pub fn restaurant_to_item(restaurant: &Restaurant) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert("pk".to_string(), AttributeValue::S(restaurant_key(&restaurant.id)));
    item.insert("id".to_string(), AttributeValue::S(restaurant.id.clone()));
    item.insert("name".to_string(), AttributeValue::S(restaurant.name.clone()));
    item.insert("route".to_string(), AttributeValue::S(restaurant.route.clone()));
    item.insert("email".to_string(), AttributeValue::S(restaurant.email.clone()));
    item.insert(
        "password_hash".to_string(),
        AttributeValue::S(restaurant.password_hash.clone()),
    );
    item.insert(
        "menu".to_string(),
        AttributeValue::L(restaurant.menu.iter().map(menu_item_to_attribute).collect()),
    );
    item.insert(
        "tables".to_string(),
        AttributeValue::L(restaurant.tables.iter().map(table_to_attribute).collect()),
    );
    item.insert(
        "version".to_string(),
        AttributeValue::N(restaurant.version.to_string()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(restaurant.created_at.to_rfc3339()),
    );
    item.insert(
        "updated_at".to_string(),
        AttributeValue::S(restaurant.updated_at.to_rfc3339()),
    );

    item
}

/// Convert a DynamoDB item to a Restaurant
pub fn item_to_restaurant(item: &HashMap<String, AttributeValue>) -> RepositoryResult<Restaurant> {
    let menu = list_attr(item, "menu")?
        .iter()
        .map(attribute_to_menu_item)
        .collect::<RepositoryResult<Vec<_>>>()?;

    let tables = list_attr(item, "tables")?
        .iter()
        .map(attribute_to_table)
        .collect::<RepositoryResult<Vec<_>>>()?;

    Ok(Restaurant {
        id: string_attr(item, "id")?,
        name: string_attr(item, "name")?,
        route: string_attr(item, "route")?,
        email: string_attr(item, "email")?,
        password_hash: string_attr(item, "password_hash")?,
        menu,
        tables,
        version: number_attr(item, "version")?,
        created_at: timestamp_attr(item, "created_at")?,
        updated_at: timestamp_attr(item, "updated_at")?,
    })
}

fn menu_item_to_attribute(menu_item: &MenuItem) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert("id".to_string(), AttributeValue::S(menu_item.id.clone()));
    map.insert("name".to_string(), AttributeValue::S(menu_item.name.clone()));
    map.insert(
        "ingredients".to_string(),
        AttributeValue::S(menu_item.ingredients.clone()),
    );
    map.insert("pic".to_string(), AttributeValue::S(menu_item.pic.clone()));
    map.insert("price".to_string(), AttributeValue::N(menu_item.price.to_string()));
    AttributeValue::M(map)
}

fn attribute_to_menu_item(value: &AttributeValue) -> RepositoryResult<MenuItem> {
    let map = map_value(value, "menu")?;

    let price = map
        .get("price")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| Decimal::from_str(n).ok())
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: "Invalid menu price".to_string(),
        })?;

    Ok(MenuItem {
        id: string_attr(map, "id")?,
        name: string_attr(map, "name")?,
        ingredients: optional_string_attr(map, "ingredients"),
        pic: optional_string_attr(map, "pic"),
        price,
    })
}

fn table_to_attribute(table: &Table) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert("hash".to_string(), AttributeValue::S(table.hash.clone()));
    map.insert("name".to_string(), AttributeValue::S(table.name.clone()));
    map.insert(
        "commands".to_string(),
        AttributeValue::L(table.commands.iter().map(command_to_attribute).collect()),
    );
    AttributeValue::M(map)
}

fn attribute_to_table(value: &AttributeValue) -> RepositoryResult<Table> {
    let map = map_value(value, "tables")?;

    let commands = list_attr(map, "commands")?
        .iter()
        .map(attribute_to_command)
        .collect::<RepositoryResult<Vec<_>>>()?;

    Ok(Table {
        hash: string_attr(map, "hash")?,
        name: string_attr(map, "name")?,
        commands,
    })
}

fn command_to_attribute(command: &Command) -> AttributeValue {
    let lines = command
        .items
        .iter()
        .map(|line| {
            let mut map = HashMap::new();
            map.insert("id".to_string(), AttributeValue::S(line.id.clone()));
            map.insert("qtd".to_string(), AttributeValue::N(line.quantity.to_string()));
            AttributeValue::M(map)
        })
        .collect();

    let mut map = HashMap::new();
    map.insert("command".to_string(), AttributeValue::L(lines));
    map.insert("date".to_string(), AttributeValue::S(command.date.to_rfc3339()));
    AttributeValue::M(map)
}

fn attribute_to_command(value: &AttributeValue) -> RepositoryResult<Command> {
    let map = map_value(value, "commands")?;

    let items = list_attr(map, "command")?
        .iter()
        .map(|line| -> RepositoryResult<CommandLine> {
            let line = map_value(line, "command")?;
            Ok(CommandLine {
                id: string_attr(line, "id")?,
                quantity: number_attr(line, "qtd")?,
            })
        })
        .collect::<RepositoryResult<Vec<_>>>()?;

    Ok(Command {
        items,
        date: timestamp_attr(map, "date")?,
    })
}

fn map_value<'a>(
    value: &'a AttributeValue,
    context: &str,
) -> RepositoryResult<&'a HashMap<String, AttributeValue>> {
    value.as_m().map_err(|_| RepositoryError::InvalidItem {
        message: format!("Expected map entry in {}", context),
    })
}

fn string_attr(map: &HashMap<String, AttributeValue>, key: &str) -> RepositoryResult<String> {
    map.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Missing {}", key),
        })
}

fn optional_string_attr(map: &HashMap<String, AttributeValue>, key: &str) -> String {
    map.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default()
}

fn number_attr<T: FromStr>(map: &HashMap<String, AttributeValue>, key: &str) -> RepositoryResult<T> {
    map.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<T>().ok())
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Invalid {}", key),
        })
}

fn timestamp_attr(
    map: &HashMap<String, AttributeValue>,
    key: &str,
) -> RepositoryResult<DateTime<Utc>> {
    map.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Invalid {}", key),
        })
}

// Absent lists are stored by older writers as missing attributes.
fn list_attr<'a>(
    map: &'a HashMap<String, AttributeValue>,
    key: &str,
) -> RepositoryResult<&'a [AttributeValue]> {
    match map.get(key) {
        None => Ok(&[]),
        Some(value) => value
            .as_l()
            .map(|list| list.as_slice())
            .map_err(|_| RepositoryError::InvalidItem {
                message: format!("Expected list for {}", key),
            }),
    }
}
