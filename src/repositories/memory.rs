use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::RestaurantRepository;
use crate::models::{RepositoryError, RepositoryResult, Restaurant, RestaurantUpdate};

#[derive(Default)]
struct Store {
    restaurants: HashMap<String, Restaurant>,
    route_index: HashMap<String, String>,
    email_index: HashMap<String, String>,
}

/// Process-local store used for development and tests.
///
/// One lock guards the restaurants and both unique indexes, so creation and
/// updates are atomic with respect to each other.
#[derive(Clone, Default)]
pub struct InMemoryRestaurantRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryRestaurantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.restaurants.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RestaurantRepository for InMemoryRestaurantRepository {
    #[instrument(skip(self, restaurant), fields(id = %restaurant.id, route = %restaurant.route))]
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        let mut store = self.store.write().await;

        if store.route_index.contains_key(&restaurant.route) {
            return Err(RepositoryError::ConstraintViolation {
                message: "Route already in use".to_string(),
            });
        }
        if store.email_index.contains_key(&restaurant.email) {
            return Err(RepositoryError::ConstraintViolation {
                message: "Email already in use".to_string(),
            });
        }
        if store.restaurants.contains_key(&restaurant.id) {
            return Err(RepositoryError::ConstraintViolation {
                message: "Restaurant already exists".to_string(),
            });
        }

        store
            .route_index
            .insert(restaurant.route.clone(), restaurant.id.clone());
        store
            .email_index
            .insert(restaurant.email.clone(), restaurant.id.clone());
        store
            .restaurants
            .insert(restaurant.id.clone(), restaurant.clone());

        debug!("Restaurant stored");
        Ok(restaurant)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>> {
        Ok(self.store.read().await.restaurants.get(id).cloned())
    }

    async fn find_by_route(&self, route: &str) -> RepositoryResult<Option<Restaurant>> {
        let store = self.store.read().await;
        Ok(store
            .route_index
            .get(route)
            .and_then(|id| store.restaurants.get(id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Restaurant>> {
        let store = self.store.read().await;
        Ok(store
            .email_index
            .get(email)
            .and_then(|id| store.restaurants.get(id))
            .cloned())
    }

    #[instrument(skip(self, update), fields(id = %id, operation = update.operation_name()))]
    async fn update(&self, id: &str, update: RestaurantUpdate) -> RepositoryResult<bool> {
        let mut store = self.store.write().await;

        let Some(stored) = store.restaurants.get(id) else {
            return Ok(false);
        };

        // Apply to a copy so a constraint violation leaves the stored value untouched.
        let mut candidate = stored.clone();
        let changed = candidate.apply(update)?;
        if changed {
            store.restaurants.insert(id.to_string(), candidate);
        }

        Ok(changed)
    }
}
