//! In-process stores, used when no database is configured and in tests.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::time::SystemTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    password,
    session::{generate_session_token, hash_session_token},
    store::{Account, AccountStore, EstablishedSession, Session, SessionStore, StoreError},
};

pub(super) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<String, StoredAccount>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.accounts.lock().await.contains_key(username)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Account, StoreError> {
        if self.contains(username).await {
            return Err(StoreError::DuplicateUsername);
        }

        // Hash outside the lock; the insert below re-checks for a concurrent winner.
        let password_hash = password::hash(password).await?;

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(username) {
            return Err(StoreError::DuplicateUsername);
        }
        let account = Account {
            id: Uuid::now_v7(),
            username: username.to_string(),
        };
        accounts.insert(
            username.to_string(),
            StoredAccount {
                account: account.clone(),
                password_hash,
            },
        );

        Ok(account)
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<Account>, StoreError> {
        let stored = self
            .accounts
            .lock()
            .await
            .get(username)
            .map(|stored| (stored.account.clone(), stored.password_hash.clone()));

        match stored {
            Some((account, password_hash)) => {
                if password::verify(password, Some(password_hash)).await? {
                    Ok(Some(account))
                } else {
                    Ok(None)
                }
            }
            None => {
                password::verify(password, None).await?;
                Ok(None)
            }
        }
    }
}

struct SessionEntry {
    session: Session,
    expires_at_unix: i64,
}

pub struct MemorySessionStore {
    ttl_seconds: i64,
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl_seconds,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub async fn active(&self) -> usize {
        let now = now_unix_seconds();
        self.sessions
            .lock()
            .await
            .values()
            .filter(|entry| entry.expires_at_unix > now)
            .count()
    }

    /// Live sessions bound to the given account.
    pub async fn active_for(&self, account_id: Uuid) -> usize {
        let now = now_unix_seconds();
        self.sessions
            .lock()
            .await
            .values()
            .filter(|entry| entry.expires_at_unix > now && entry.session.account.id == account_id)
            .count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn establish(&self, account: &Account) -> Result<EstablishedSession, StoreError> {
        let token = generate_session_token()?;
        let created_at_unix = now_unix_seconds();
        let session = Session {
            account: account.clone(),
            created_at_unix,
        };

        let mut sessions = self.sessions.lock().await;
        // Drop expired entries while we hold the lock anyway.
        sessions.retain(|_, entry| entry.expires_at_unix > created_at_unix);
        sessions.insert(
            hash_session_token(&token),
            SessionEntry {
                session: session.clone(),
                expires_at_unix: created_at_unix.saturating_add(self.ttl_seconds),
            },
        );

        Ok(EstablishedSession { session, token })
    }

    async fn current(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let token_hash = hash_session_token(token);
        let now = now_unix_seconds();
        let mut sessions = self.sessions.lock().await;

        let expired = match sessions.get(&token_hash) {
            Some(entry) if entry.expires_at_unix > now => return Ok(Some(entry.session.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.remove(&token_hash);
        }
        Ok(None)
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .remove(&hash_session_token(token));
        Ok(())
    }
}
