use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::domain::errors::ApiError;

/// Argon2id hash in PHC string format. Runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!("password hashing failed >>> {}", e);
                ApiError::ServerError
            })
    })
    .await
    .map_err(|e| {
        tracing::error!("password hashing task failed >>> {}", e);
        ApiError::ServerError
    })?
}

/// A malformed stored hash never authenticates.
pub async fn verify_password(password: String, hash: String) -> bool {
    let result = tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("stored password hash is malformed >>> {}", e);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await;

    match result {
        Ok(matches) => matches,
        Err(e) => {
            tracing::error!("password verification task failed >>> {}", e);
            false
        }
    }
}
