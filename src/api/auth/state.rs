//! Auth configuration and the shared state handed to handlers.

use axum::http::HeaderMap;
use std::sync::Arc;

use super::{
    session::extract_session_token,
    store::{AccountStore, Session, SessionStore, StoreError},
};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;
const DEFAULT_LOGIN_URL: &str = "/login";
const DEFAULT_LANDING_URL: &str = "/";
pub const DEFAULT_REDIRECT_FIELD: &str = "next";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    session_ttl_seconds: i64,
    login_url: String,
    landing_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            landing_url: DEFAULT_LANDING_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_url(mut self, login_url: String) -> Self {
        self.login_url = login_url;
        self
    }

    #[must_use]
    pub fn with_landing_url(mut self, landing_url: String) -> Self {
        self.landing_url = landing_url;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    #[must_use]
    pub fn landing_url(&self) -> &str {
        &self.landing_url
    }

    /// Only mark cookies secure when the service is reached over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Config plus the two stores, shared by every handler through an `Extension`.
pub struct AuthState {
    config: AuthConfig,
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            accounts,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Resolve the session cookie carried by a request, if any.
    ///
    /// # Errors
    /// Returns an error if the session store cannot be reached.
    pub async fn current_session(&self, headers: &HeaderMap) -> Result<Option<Session>, StoreError> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        self.sessions.current(&token).await
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
