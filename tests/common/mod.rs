#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use qmenu_rs::{
    auth::{CredentialService, TokenService},
    create_app,
    handlers::{AppState, RequestLimits},
    observability::{BusinessTracingMiddleware, DatabaseTracingMiddleware},
    repositories::{InMemoryRestaurantRepository, InstrumentedRestaurantRepository},
    services::RestaurantService,
    Metrics,
};

pub const TEST_SECRET: &str = "integration-secret-0123456789abcdef";
pub const TEST_ISSUER: &str = "qmenu-integration";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("qmenu_rs=warn")
        .with_test_writer()
        .try_init();
});

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub tokens: Arc<TokenService>,
}

/// Registration payload for a restaurant derived from `route`
pub fn registration(route: &str) -> Value {
    json!({
        "name": format!("Restaurant {}", route),
        "route": route,
        "email": format!("{}@example.com", route),
        "password": "secret1"
    })
}

pub fn menu_item(id: &str, name: &str, price: f64) -> Value {
    json!({
        "id": id,
        "name": name,
        "ingredients": "house recipe",
        "pic": format!("{}.png", id),
        "price": price
    })
}

impl TestEnvironment {
    /// Boot the real router over a fresh in-memory store on an ephemeral port
    pub async fn new() -> Self {
        Lazy::force(&TRACING);

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let tokens = Arc::new(
            TokenService::new(TEST_SECRET, TEST_ISSUER, chrono::Duration::hours(8))
                .expect("Failed to create token service"),
        );
        let repository = Arc::new(InstrumentedRestaurantRepository::new(
            Arc::new(InMemoryRestaurantRepository::new()),
            DatabaseTracingMiddleware::new(metrics.clone()),
            "memory",
        ));
        let state = AppState {
            service: Arc::new(RestaurantService::new(
                repository,
                CredentialService::new(),
                tokens.clone(),
            )),
            tokens: tokens.clone(),
            business: BusinessTracingMiddleware::new(metrics.clone()),
        };
        let app = create_app(state, metrics, RequestLimits::default());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            client: Client::new(),
            base_url,
            tokens,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a restaurant and return its token
    pub async fn register(&self, route: &str) -> String {
        let response = self
            .client
            .post(self.url("/register"))
            .json(&registration(route))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.expect("Invalid register body");
        body["token"]
            .as_str()
            .expect("Missing token")
            .to_string()
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn put(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send request")
    }
}

/// Status plus parsed JSON body
pub async fn read(response: Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}
