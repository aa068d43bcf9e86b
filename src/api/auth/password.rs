//! `Argon2id` password hashing.
//!
//! Hashing is CPU bound, so the async wrappers run it on the blocking pool.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

use super::store::StoreError;

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, StoreError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| StoreError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Produce a PHC string for storage.
pub(super) async fn hash(password: &SecretString) -> Result<String, StoreError> {
    let password = SecretString::from(password.expose_secret());
    tokio::task::spawn_blocking(move || hash_password(password.expose_secret())).await?
}

/// Verify a password against the stored hash.
///
/// With no stored hash (unknown username) a throwaway hash is computed so the
/// response takes as long as a real mismatch.
pub(super) async fn verify(
    password: &SecretString,
    stored_hash: Option<String>,
) -> Result<bool, StoreError> {
    let password = SecretString::from(password.expose_secret());
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(stored_hash) => verify_password(password.expose_secret(), &stored_hash),
        None => hash_password(password.expose_secret()).map(|_| false),
    })
    .await?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret").unwrap();

        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("secret", "not-a-phc-string"),
            Err(StoreError::PasswordHash(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_unknown_user_never_matches() {
        let password = SecretString::from("secret");
        assert!(!verify(&password, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let password = SecretString::from("secret");
        let stored = hash(&password).await.unwrap();
        assert!(verify(&password, Some(stored)).await.unwrap());
    }
}
