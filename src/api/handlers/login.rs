//! Username/password login.

use axum::{
    extract::{Extension, Form, Query},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use minijinja::context;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::start_session;
use crate::api::{
    auth::{
        forms::{redirect_target, LoginForm, NextQuery, INVALID_CREDENTIALS},
        AuthState,
    },
    pages::{self, Pages},
};

const LOGIN_PATH: &str = "/login";

fn render_form(pages: &Pages, next: &str, error: Option<&str>) -> Response {
    pages.render(
        pages::LOGIN,
        context! {
            action => LOGIN_PATH,
            register_url => "/register",
            next => next,
            error => error,
        },
    )
}

#[utoipa::path(
    get,
    path = "/login",
    params(NextQuery),
    responses(
        (status = 200, description = "Login form", content_type = "text/html", body = String)
    ),
    tag = "auth"
)]
pub async fn login_form(
    pages: Extension<Arc<Pages>>,
    Query(query): Query<NextQuery>,
) -> impl IntoResponse {
    let next = redirect_target(&[query.next.as_deref(), query.redirect_to.as_deref()], "");
    render_form(&pages, next, None)
}

#[utoipa::path(
    post,
    path = "/login",
    params(NextQuery),
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Invalid credentials, form re-rendered", content_type = "text/html", body = String),
        (status = 302, description = "Signed in, redirect to `next` or the landing page")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pages: Extension<Arc<Pages>>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> impl IntoResponse {
    let password = SecretString::from(form.password.as_str());
    let account = match auth_state
        .accounts()
        .authenticate(&form.username, &password)
        .await
    {
        Ok(Some(account)) => account,
        Ok(None) => {
            info!("Invalid credentials for {:?}", form.username);
            let next = redirect_target(
                &[
                    form.next.as_deref(),
                    query.next.as_deref(),
                    query.redirect_to.as_deref(),
                ],
                "",
            );
            return render_form(&pages, next, Some(INVALID_CREDENTIALS));
        }
        Err(err) => return err.into_response(),
    };

    let landing_url = auth_state.config().landing_url();
    let mut target = redirect_target(&[form.next.as_deref(), query.next.as_deref()], landing_url);
    if HeaderValue::from_str(target).is_err() {
        warn!("Ignoring unusable redirect target {:?}", target);
        target = landing_url;
    }

    start_session(&auth_state, &headers, &account, target).await
}
