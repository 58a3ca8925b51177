// Services module - business logic layer

pub mod restaurant_service;

pub use restaurant_service::{MenuItemEdit, Removal, RestaurantService};
