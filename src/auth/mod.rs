pub mod credentials;
pub mod middleware;
pub mod token;

pub use credentials::CredentialService;
pub use middleware::{auth_middleware, extract_bearer_token};
pub use token::{AuthPayload, Claims, TokenService};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ServiceError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Credential hashing failed: {0}")]
    Credential(String),

    #[error("Token issuance failed: {0}")]
    Issue(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized(message) => ServiceError::Unauthorized { message },
            AuthError::TokenInvalid | AuthError::TokenExpired => ServiceError::Unauthorized {
                message: err.to_string(),
            },
            AuthError::Credential(_) | AuthError::Issue(_) => ServiceError::Internal {
                message: err.to_string(),
            },
        }
    }
}

/// Restaurant identity attached to a request once its token has been validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedRestaurant {
    pub id: String,
    pub name: String,
    pub route: String,
}

impl From<Claims> for AuthenticatedRestaurant {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            route: claims.route,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_map_to_unauthorized() {
        for err in [AuthError::TokenInvalid, AuthError::TokenExpired] {
            match ServiceError::from(err) {
                ServiceError::Unauthorized { .. } => {}
                other => panic!("Expected Unauthorized, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_internal_auth_failures_map_to_internal() {
        match ServiceError::from(AuthError::Issue("bad key".to_string())) {
            ServiceError::Internal { message } => assert!(message.contains("bad key")),
            other => panic!("Expected Internal, got {:?}", other),
        }
    }
}
