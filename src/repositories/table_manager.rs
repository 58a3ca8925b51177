use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::models::{RepositoryError, RepositoryResult};

const MAX_ACTIVE_CHECKS: u32 = 30;
const ACTIVE_CHECK_INTERVAL: Duration = Duration::from_secs(2);

fn sdk_error(context: &str, error: impl std::fmt::Display) -> RepositoryError {
    error!(error = %error, "{}", context);
    RepositoryError::AwsSdk {
        message: format!("{}: {}", context, error),
    }
}

/// Provisions the restaurants table for deployments that opt into
/// `create_table_on_startup`.
pub struct TableManager {
    client: Arc<DynamoDbClient>,
}

impl TableManager {
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self { client }
    }

    /// Creates the table keyed by the string attribute `pk` and waits until
    /// it is active. An existing table is left alone.
    #[instrument(skip(self))]
    pub async fn create_restaurants_table(&self, table_name: &str) -> RepositoryResult<()> {
        if self.table_exists(table_name).await? {
            debug!("Restaurants table already present");
            return Ok(());
        }

        let partition_key = AttributeDefinition::builder()
            .attribute_name("pk")
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| sdk_error("Invalid attribute definition", e))?;
        let key_schema = KeySchemaElement::builder()
            .attribute_name("pk")
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| sdk_error("Invalid key schema", e))?;

        let created = self
            .client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(partition_key)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match created.map_err(DynamoDbError::from) {
            Ok(_) => info!("Creating restaurants table"),
            // Another instance won the race; wait for its table instead
            Err(DynamoDbError::ResourceInUseException(_)) => {
                debug!("Restaurants table is being created elsewhere")
            }
            Err(e) => return Err(sdk_error("Failed to create restaurants table", e)),
        }

        self.wait_for_table_active(table_name).await
    }

    #[instrument(skip(self))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        let described = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await;

        match described.map_err(DynamoDbError::from) {
            Ok(_) => Ok(true),
            Err(DynamoDbError::ResourceNotFoundException(_)) => Ok(false),
            Err(e) => {
                error!(error = %e, "Could not describe restaurants table");
                Err(RepositoryError::ConnectionFailed)
            }
        }
    }

    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        for attempt in 1..=MAX_ACTIVE_CHECKS {
            let status = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| sdk_error("Failed to poll table status", DynamoDbError::from(e)))?
                .table
                .and_then(|table| table.table_status);

            if status == Some(TableStatus::Active) {
                info!(attempt, "Restaurants table is active");
                return Ok(());
            }
            debug!(attempt, status = ?status, "Waiting for restaurants table");
            tokio::time::sleep(ACTIVE_CHECK_INTERVAL).await;
        }

        error!("Restaurants table did not become active in time");
        Err(RepositoryError::Timeout)
    }
}
