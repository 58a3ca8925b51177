use thiserror::Error;

/// Failures surfaced by `RestaurantService`. Every variant carries the text
/// shown to the client, except the internal ones which are logged instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

/// Failures of the restaurant store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Restaurant store is unreachable")]
    ConnectionFailed,

    #[error("Uniqueness constraint violated: {message}")]
    ConstraintViolation { message: String },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("Restaurants table {table_name} does not exist")]
    TableNotFound { table_name: String },

    #[error("Invalid stored item: {message}")]
    InvalidItem { message: String },

    #[error("Store transaction rejected: {message}")]
    TransactionFailed { message: String },

    #[error("Store operation timed out")]
    Timeout,
}

/// Field-level problems found in request bodies.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field: {field} is required")]
    RequiredField { field: String },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{field} must be at most {max_length} characters, got {actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("{field} must be at least {min_length} characters, got {actual_length}")]
    TooShort {
        field: String,
        min_length: usize,
        actual_length: usize,
    },

    #[error("{field} must be {expected}")]
    InvalidFormat { field: String, expected: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation {
            message: err.to_string(),
        }
    }
}

impl ServiceError {
    /// Folds store-level uniqueness failures into `Conflict`; every other
    /// repository failure stays an internal error.
    pub fn from_repository(err: RepositoryError, conflict_message: &str) -> Self {
        match err {
            RepositoryError::ConstraintViolation { .. } => ServiceError::Conflict {
                message: conflict_message.to_string(),
            },
            other => ServiceError::Repository { source: other },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ServiceError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound {
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

pub type ValidationResult<T> = Result<T, ValidationError>;
