//! Logout.
//!
//! `GET /logout` signs out. `POST /logout` leaves the session alone and goes
//! back to the landing page.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::auth::{
    gate::found,
    session::{clear_session_cookie, extract_session_token},
    AuthState,
};

#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 302, description = "Session destroyed, redirect to the login page")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = auth_state.sessions().destroy(&token).await {
            return err.into_response();
        }
        info!("Session destroyed");
    }

    let mut response = found(auth_state.config().login_url());

    // Always clear the cookie, even if there was no session to destroy.
    match clear_session_cookie(auth_state.config()) {
        Ok(cookie) => {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build logout cookie: {err}"),
    }

    response
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 302, description = "Session untouched, redirect to the landing page")
    ),
    tag = "auth"
)]
pub async fn logout_post(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    warn!("logout attempted with POST method");
    found(auth_state.config().landing_url())
}
