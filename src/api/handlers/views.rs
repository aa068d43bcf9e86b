//! Pages that require a signed-in user.
//!
//! `/` is gated by the [`require_login`](crate::api::auth::gate::require_login)
//! middleware; `/protected` takes the [`Authenticated`] extractor with the
//! [`ProtectedView`] policy instead.

use axum::{extract::Extension, response::IntoResponse};
use minijinja::context;
use std::sync::Arc;

use crate::api::{
    auth::{
        gate::{Authenticated, LoginPolicy},
        Session,
    },
    pages::{self, Pages},
};

const LOGOUT_PATH: &str = "/logout";

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Landing page", content_type = "text/html", body = String),
        (status = 302, description = "No session, redirect to the login page")
    ),
    tag = "pages"
)]
pub async fn home(session: Extension<Session>, pages: Extension<Arc<Pages>>) -> impl IntoResponse {
    pages.render(
        pages::HOME,
        context! {
            username => &session.account.username,
            logout_url => LOGOUT_PATH,
        },
    )
}

/// Gate policy for `/protected`: its own login URL and redirect field.
pub struct ProtectedView;

impl LoginPolicy for ProtectedView {
    const LOGIN_URL: Option<&'static str> = Some("/login");
    const REDIRECT_FIELD: &'static str = "redirect_to";
}

#[utoipa::path(
    get,
    path = "/protected",
    responses(
        (status = 200, description = "Protected page", content_type = "text/html", body = String),
        (status = 302, description = "No session, redirect to `/login?redirect_to=...`")
    ),
    tag = "pages"
)]
pub async fn protected(
    view: Authenticated<ProtectedView>,
    pages: Extension<Arc<Pages>>,
) -> impl IntoResponse {
    pages.render(
        pages::PROTECTED,
        context! {
            username => &view.session.account.username,
            logout_url => LOGOUT_PATH,
        },
    )
}
