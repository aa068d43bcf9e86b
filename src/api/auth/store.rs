//! Account and session store interfaces.
//!
//! Handlers only see these traits; the backends live in `memory` and `postgres`.

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// A registered user. The password hash never leaves the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
}

/// An authenticated session bound to an existing account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub account: Account,
    pub created_at_unix: i64,
}

/// A freshly created session and the raw token to hand to the browser.
///
/// The raw token only exists here; stores keep its hash.
#[derive(Debug)]
pub struct EstablishedSession {
    pub session: Session,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("session token generation failed: {0}")]
    Token(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        error!("Store failure: {self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
            .into_response()
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account, hashing the password.
    ///
    /// Fails with [`StoreError::DuplicateUsername`] when the username is taken.
    async fn create(&self, username: &str, password: &SecretString)
        -> Result<Account, StoreError>;

    /// Check credentials, returning the account on a match.
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<Account>, StoreError>;

    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn establish(&self, account: &Account) -> Result<EstablishedSession, StoreError>;

    /// Look up a live session by its raw token. Expired sessions are `None`.
    async fn current(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// Remove a session. Unknown tokens are not an error.
    async fn destroy(&self, token: &str) -> Result<(), StoreError>;
}
