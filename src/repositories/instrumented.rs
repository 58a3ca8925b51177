use async_trait::async_trait;
use std::sync::Arc;

use super::RestaurantRepository;
use crate::models::{RepositoryResult, Restaurant, RestaurantUpdate};
use crate::observability::DatabaseTracingMiddleware;

/// Wraps any restaurant store and records timing and outcome of every call
/// under the store's label.
pub struct InstrumentedRestaurantRepository {
    inner: Arc<dyn RestaurantRepository>,
    tracing: DatabaseTracingMiddleware,
    store: &'static str,
}

impl InstrumentedRestaurantRepository {
    pub fn new(
        inner: Arc<dyn RestaurantRepository>,
        tracing: DatabaseTracingMiddleware,
        store: &'static str,
    ) -> Self {
        Self {
            inner,
            tracing,
            store,
        }
    }
}

#[async_trait]
impl RestaurantRepository for InstrumentedRestaurantRepository {
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        self.tracing
            .trace_operation("create", self.store, self.inner.create(restaurant))
            .await
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>> {
        self.tracing
            .trace_operation("find_by_id", self.store, self.inner.find_by_id(id))
            .await
    }

    async fn find_by_route(&self, route: &str) -> RepositoryResult<Option<Restaurant>> {
        self.tracing
            .trace_operation("find_by_route", self.store, self.inner.find_by_route(route))
            .await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Restaurant>> {
        self.tracing
            .trace_operation("find_by_email", self.store, self.inner.find_by_email(email))
            .await
    }

    async fn update(&self, id: &str, update: RestaurantUpdate) -> RepositoryResult<bool> {
        let operation = update.operation_name();
        self.tracing
            .trace_operation(operation, self.store, self.inner.update(id, update))
            .await
    }
}
