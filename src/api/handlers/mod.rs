pub mod health;
pub mod login;
pub mod logout;
pub mod register;
pub mod views;

#[cfg(test)]
mod tests;

// common functions for the handlers
use axum::{
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::api::auth::{
    gate::found,
    session::{extract_session_token, session_cookie},
    Account, AuthState,
};

/// Establish a session for `account` and redirect to `location` with the cookie set.
///
/// Any session carried by the request is destroyed first, so a sign-in never
/// reuses the token the client arrived with.
pub(crate) async fn start_session(
    auth_state: &AuthState,
    headers: &HeaderMap,
    account: &Account,
    location: &str,
) -> Response {
    if let Some(token) = extract_session_token(headers) {
        if let Err(err) = auth_state.sessions().destroy(&token).await {
            return err.into_response();
        }
    }

    let established = match auth_state.sessions().establish(account).await {
        Ok(established) => established,
        Err(err) => return err.into_response(),
    };

    let cookie = match session_cookie(auth_state.config(), &established.token) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
                .into_response();
        }
    };

    info!("Session established for {}", account.username);

    let mut response = found(location);
    response.headers_mut().insert(SET_COOKIE, cookie);
    response
}
