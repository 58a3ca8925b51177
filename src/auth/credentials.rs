use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::{instrument, warn};

use super::{AuthError, AuthResult};

/// One-way password hashing backed by argon2id.
///
/// Hashes are PHC strings, so the salt and parameters travel with the hash.
/// Both operations run on the blocking pool since argon2 is deliberately slow.
#[derive(Debug, Clone, Default)]
pub struct CredentialService;

impl CredentialService {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all)]
    pub async fn hash(&self, password: String) -> AuthResult<String> {
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Credential(e.to_string()))?
    }

    /// Never fails: a malformed stored hash simply does not verify.
    #[instrument(skip_all)]
    pub async fn verify(&self, password: String, hash: String) -> bool {
        match tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Password verification task failed: {}", e);
                false
            }
        }
    }
}

pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Credential(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
