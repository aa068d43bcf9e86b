//! Account registration.

use axum::{
    extract::{Extension, Form},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use minijinja::context;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::start_session;
use crate::api::{
    auth::{
        forms::{FormErrors, RegisterForm, DUPLICATE_USERNAME},
        AuthState, StoreError,
    },
    pages::{self, Pages},
};

const REGISTER_PATH: &str = "/register";

fn render_form(
    pages: &Pages,
    auth_state: &AuthState,
    username: &str,
    errors: &FormErrors,
) -> Response {
    pages.render(
        pages::REGISTER,
        context! {
            action => REGISTER_PATH,
            login_url => auth_state.config().login_url(),
            username => username,
            errors => errors,
        },
    )
}

#[utoipa::path(
    get,
    path = "/register",
    responses(
        (status = 200, description = "Registration form", content_type = "text/html", body = String)
    ),
    tag = "auth"
)]
pub async fn register_form(
    auth_state: Extension<Arc<AuthState>>,
    pages: Extension<Arc<Pages>>,
) -> impl IntoResponse {
    render_form(&pages, &auth_state, "", &FormErrors::default())
}

#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Form re-rendered with validation errors", content_type = "text/html", body = String),
        (status = 302, description = "Account created and session established, redirect to the landing page")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pages: Extension<Arc<Pages>>,
    Form(form): Form<RegisterForm>,
) -> impl IntoResponse {
    let username = form.cleaned_username();

    if let Err(errors) = form.validate() {
        debug!("Registration form rejected: {:?}", errors);
        return render_form(&pages, &auth_state, &username, &errors);
    }

    let password = SecretString::from(form.cleaned_password());
    let account = match auth_state.accounts().create(&username, &password).await {
        Ok(account) => account,
        Err(StoreError::DuplicateUsername) => {
            let mut errors = FormErrors::default();
            errors.add_field("username", DUPLICATE_USERNAME);
            return render_form(&pages, &auth_state, &username, &errors);
        }
        Err(err) => return err.into_response(),
    };

    info!("Registered account {}", account.username);

    start_session(
        &auth_state,
        &headers,
        &account,
        auth_state.config().landing_url(),
    )
    .await
}
