// Repositories module - data access layer

pub mod instrumented;
pub mod memory;
pub mod restaurant_repository;
pub mod table_manager;

pub use instrumented::InstrumentedRestaurantRepository;
pub use memory::InMemoryRestaurantRepository;
pub use restaurant_repository::{DynamoDbRestaurantRepository, RestaurantRepository};
pub use table_manager::TableManager;
