use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use qmenu_rs::{
    auth::{CredentialService, TokenService},
    create_app,
    handlers::{AppState, RequestLimits},
    init_observability,
    observability::{BusinessTracingMiddleware, DatabaseTracingMiddleware, TelemetrySettings},
    repositories::{
        DynamoDbRestaurantRepository, InMemoryRestaurantRepository,
        InstrumentedRestaurantRepository, RestaurantRepository, TableManager,
    },
    services::RestaurantService,
    shutdown_observability, Config, Metrics, StoreBackend,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment()
        .await
        .context("failed to load configuration")?;

    init_observability(&TelemetrySettings {
        service_name: &config.observability.service_name,
        service_version: &config.observability.service_version,
        otlp_endpoint: &config.observability.otlp_endpoint,
        log_level: &config.observability.log_level,
        enable_json_logging: config.observability.enable_json_logging,
    })?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );

    let metrics = Arc::new(Metrics::new()?);
    let database_tracing = DatabaseTracingMiddleware::new(metrics.clone());

    let repository: Arc<dyn RestaurantRepository> = match config.database.store {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(InstrumentedRestaurantRepository::new(
                Arc::new(InMemoryRestaurantRepository::new()),
                database_tracing,
                "memory",
            ))
        }
        StoreBackend::DynamoDb => {
            let client = Arc::new(
                config
                    .dynamodb_client()
                    .context("DynamoDB store selected without AWS configuration")?,
            );
            info!(
                table = %config.database.restaurants_table_name,
                region = %config.database.region,
                "Using DynamoDB store"
            );

            if config.database.create_table_on_startup {
                TableManager::new(client.clone())
                    .create_restaurants_table(&config.database.restaurants_table_name)
                    .await?;
            }

            Arc::new(InstrumentedRestaurantRepository::new(
                Arc::new(DynamoDbRestaurantRepository::new(
                    client,
                    config.database.restaurants_table_name.clone(),
                    config.database.region.clone(),
                )),
                database_tracing,
                "dynamodb",
            ))
        }
    };

    let tokens = Arc::new(TokenService::new(
        config.jwt_secret(),
        config.auth.jwt_issuer.clone(),
        config.token_ttl(),
    )?);

    let state = AppState {
        service: Arc::new(RestaurantService::new(
            repository,
            CredentialService::new(),
            tokens.clone(),
        )),
        tokens,
        business: BusinessTracingMiddleware::new(metrics.clone()),
    };

    let app = create_app(
        state,
        metrics,
        RequestLimits {
            max_request_size: config.server.max_request_size,
        },
    );

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_observability().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler the server keeps running until killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
