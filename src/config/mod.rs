use aws_config::{timeout::TimeoutConfig, BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::token::MIN_SECRET_LENGTH;

const ENV_PREFIX: &str = "QMENU";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Environment variable missing: {name}")]
    MissingEnvironmentVariable { name: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub auth: AuthConfig,
    /// Present whenever a setting needs AWS (DynamoDB store or SSM secret)
    pub aws: Option<AwsConfig>,
    jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u64,
}

/// Which restaurant store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_store")]
    pub store: StoreBackend,
    #[serde(default = "default_restaurants_table")]
    pub restaurants_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint override, e.g. DynamoDB Local
    #[serde(default)]
    pub dynamodb_endpoint: Option<String>,
    #[serde(default)]
    pub create_table_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    /// Empty disables trace export
    #[serde(default)]
    pub otlp_endpoint: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

/// Token signing settings, read with `envy`.
///
/// Exactly one of `jwt_secret` or `jwt_secret_parameter` is expected; the
/// inline secret wins when both are set.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub jwt_secret_parameter: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_secret_parameter", &self.jwt_secret_parameter)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("jwt_issuer", &self.jwt_issuer)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub sdk_config: SdkConfig,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

struct CachedParameter {
    value: String,
    fetched_at: Instant,
}

/// SSM Parameter Store reader with a per-name TTL cache.
pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, CachedParameter>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;
        let auth = AuthConfig::from_env()?;

        let needs_aws =
            database.store == StoreBackend::DynamoDb || auth.jwt_secret_parameter.is_some();
        let aws = if needs_aws {
            Some(AwsConfig::load(&database.region, server.request_timeout()).await)
        } else {
            None
        };

        let jwt_secret = auth
            .resolve_secret(aws.as_ref().map(|aws| aws.parameter_store.as_ref()))
            .await?;

        let config = Config {
            server,
            database,
            observability,
            auth,
            aws,
            jwt_secret,
        };

        config.validate()?;
        info!(
            store = ?config.database.store,
            port = config.server.port,
            "Configuration loaded"
        );
        debug!(?config, "Resolved configuration");

        Ok(config)
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.auth.token_ttl_hours)
    }

    /// DynamoDB client honouring the endpoint override, if AWS was configured
    pub fn dynamodb_client(&self) -> Option<DynamoDbClient> {
        let aws = self.aws.as_ref()?;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&aws.sdk_config);
        if let Some(endpoint) = &self.database.dynamodb_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Some(DynamoDbClient::from_conf(builder.build()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_settings(&self.server, &self.database, &self.auth)?;
        validate_secret(&self.jwt_secret)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

pub(crate) fn validate_settings(
    server: &ServerConfig,
    database: &DatabaseConfig,
    auth: &AuthConfig,
) -> Result<(), ConfigError> {
    let checks = [
        (server.port == 0, "Server port cannot be 0"),
        (server.request_timeout_seconds == 0, "Request timeout cannot be 0"),
        (server.max_request_size == 0, "Max request size cannot be 0"),
        (
            database.store == StoreBackend::DynamoDb && database.restaurants_table_name.is_empty(),
            "Restaurants table name cannot be empty",
        ),
        (auth.token_ttl_hours <= 0, "Token TTL must be positive"),
    ];

    match checks.iter().find(|(failed, _)| *failed) {
        Some((_, message)) => Err(invalid(*message)),
        None => Ok(()),
    }
}

pub(crate) fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(invalid(format!(
            "JWT secret must be at least {} bytes",
            MIN_SECRET_LENGTH
        )));
    }
    Ok(())
}

/// One flat `QMENU_*` namespace feeds every section
pub(crate) fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
}

fn load_section<T: DeserializeOwned>(
    source: config::Environment,
    section: &str,
) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(source)
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(environment())
    }

    pub(crate) fn from_source(source: config::Environment) -> Result<Self, ConfigError> {
        load_section(source, "server")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(environment())
    }

    pub(crate) fn from_source(source: config::Environment) -> Result<Self, ConfigError> {
        load_section(source, "database")
    }
}

impl ObservabilityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(environment())
    }

    pub(crate) fn from_source(source: config::Environment) -> Result<Self, ConfigError> {
        load_section(source, "observability")
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed(format!("{}_", ENV_PREFIX))
            .from_env()
            .map_err(|e| ConfigError::LoadError {
                message: format!("Failed to load auth config: {}", e),
            })
    }

    pub(crate) fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(format!("{}_", ENV_PREFIX))
            .from_iter(vars)
            .map_err(|e| ConfigError::LoadError {
                message: format!("Failed to load auth config: {}", e),
            })
    }

    /// Inline secret first, then Parameter Store
    pub async fn resolve_secret(
        &self,
        parameter_store: Option<&ParameterStoreConfig>,
    ) -> Result<String, ConfigError> {
        if let Some(secret) = &self.jwt_secret {
            return Ok(secret.clone());
        }

        match (&self.jwt_secret_parameter, parameter_store) {
            (Some(name), Some(store)) => {
                info!(parameter = %name, "Reading JWT secret from Parameter Store");
                store.get_parameter(name, true).await
            }
            _ => Err(ConfigError::MissingEnvironmentVariable {
                name: format!("{}_JWT_SECRET", ENV_PREFIX),
            }),
        }
    }
}

impl AwsConfig {
    async fn load(region: &str, operation_timeout: Duration) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(operation_timeout)
                    .build(),
            )
            .load()
            .await;

        let parameter_store = Arc::new(ParameterStoreConfig::new(
            SsmClient::new(&sdk_config),
            Duration::from_secs(5 * 60),
        ));

        Self {
            region: region.to_string(),
            sdk_config,
            parameter_store,
        }
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str, decrypt: bool) -> Result<String, ConfigError> {
        if let Some(cached) = self.cache.read().await.get(name) {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                return Ok(cached.value.clone());
            }
        }

        debug!(parameter = %name, "Reading parameter from SSM");
        let output = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?;

        self.cache.write().await.insert(
            name.to_string(),
            CachedParameter {
                value: value.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(value)
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> u64 {
    1024 * 1024
}

pub(crate) fn default_store() -> StoreBackend {
    StoreBackend::DynamoDb
}

pub(crate) fn default_restaurants_table() -> String {
    "QMenuRestaurants".to_string()
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_service_name() -> String {
    "qmenu-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) fn default_token_ttl_hours() -> i64 {
    8
}

pub(crate) fn default_jwt_issuer() -> String {
    "qmenu-rs".to_string()
}
