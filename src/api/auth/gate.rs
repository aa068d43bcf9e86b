//! Login gate for pages that need a session.
//!
//! One guard, [`LoginRequired::guard`], with two ways to attach it:
//!
//! - [`require_login`]: route middleware, configured with a [`LoginRequired`] value.
//! - [`Authenticated`]: extractor, configured by a [`LoginPolicy`] type. Handlers
//!   grouped on a view type implement the policy on that type.
//!
//! Anonymous requests are redirected to the login URL with the original path and
//! query in the redirect field, e.g. `/login?redirect_to=/protected`.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::LOCATION, request::Parts, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, error};

use super::{
    state::{AuthConfig, AuthState, DEFAULT_REDIRECT_FIELD},
    store::Session,
};

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(err) => {
            error!("Refusing redirect to invalid location: {err}");
            (StatusCode::BAD_REQUEST, "Invalid redirect target".to_string()).into_response()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRequired {
    login_url: String,
    redirect_field: String,
}

impl LoginRequired {
    #[must_use]
    pub fn new(login_url: impl Into<String>, redirect_field: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            redirect_field: redirect_field.into(),
        }
    }

    /// Service-wide defaults: the configured login URL and the `next` field.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.login_url(), DEFAULT_REDIRECT_FIELD)
    }

    #[must_use]
    pub fn for_policy<P: LoginPolicy>(config: &AuthConfig) -> Self {
        let login_url = match P::LOGIN_URL {
            Some(login_url) => login_url,
            None => config.login_url(),
        };
        Self::new(login_url, P::REDIRECT_FIELD)
    }

    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    #[must_use]
    pub fn redirect_field(&self) -> &str {
        &self.redirect_field
    }

    /// Login URL carrying `next` in the redirect field.
    #[must_use]
    pub fn login_location(&self, next: &str) -> String {
        // Slashes stay readable; everything else outside the unreserved set is escaped.
        let next = urlencoding::encode(next).replace("%2F", "/");
        let separator = if self.login_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}{}={next}",
            self.login_url, self.redirect_field
        )
    }

    #[must_use]
    pub fn redirect_to_login(&self, uri: &Uri) -> Response {
        let next = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());
        found(&self.login_location(next))
    }

    /// Return the request's session, or the response that sends it to login.
    ///
    /// # Errors
    /// Returns the redirect for anonymous requests and a 500 when the session
    /// store fails.
    pub async fn guard(
        &self,
        auth: &AuthState,
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<Session, Response> {
        match auth.current_session(headers).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => {
                debug!("No session for {}, redirecting to login", uri.path());
                Err(self.redirect_to_login(uri))
            }
            Err(err) => Err(err.into_response()),
        }
    }
}

/// Route middleware form of the gate. The resolved [`Session`] is added to the
/// request extensions for the handler.
pub async fn require_login(
    State(gate): State<LoginRequired>,
    Extension(auth): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let guarded = gate.guard(&auth, request.headers(), request.uri()).await;
    match guarded {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(response) => response,
    }
}

/// Per-view gate configuration. `LOGIN_URL = None` falls back to the
/// configured login URL.
pub trait LoginPolicy: Send + Sync + 'static {
    const LOGIN_URL: Option<&'static str> = None;
    const REDIRECT_FIELD: &'static str = DEFAULT_REDIRECT_FIELD;
}

/// Extractor form of the gate. Rejects with the login redirect.
pub struct Authenticated<P> {
    pub session: Session,
    policy: PhantomData<fn() -> P>,
}

#[async_trait]
impl<S, P> FromRequestParts<S> for Authenticated<P>
where
    S: Send + Sync,
    P: LoginPolicy,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(auth) = parts.extensions.get::<Arc<AuthState>>().cloned() else {
            error!("AuthState extension is missing");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        };

        let gate = LoginRequired::for_policy::<P>(auth.config());
        let session = gate.guard(&auth, &parts.headers, &parts.uri).await?;

        Ok(Self {
            session,
            policy: PhantomData,
        })
    }
}
