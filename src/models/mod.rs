// Re-export all model types
pub use self::errors::*;
pub use self::requests::*;
pub use self::restaurant::*;
pub use self::validation::*;

mod errors;
mod requests;
mod restaurant;
mod validation;
