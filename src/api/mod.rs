use crate::api::{
    auth::{
        gate::{self, LoginRequired},
        postgres, AuthConfig, AuthState, MemoryAccountStore, MemorySessionStore, PgAccountStore,
        PgSessionStore,
    },
    handlers::{health, login, logout, register, views},
    pages::Pages,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;

pub mod auth;
pub mod handlers;
pub mod pages;

mod openapi;
pub use openapi::openapi;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: Option<String>, auth_config: AuthConfig) -> Result<()> {
    let auth_state = Arc::new(build_state(dsn.as_deref(), auth_config).await?);
    let pages = Arc::new(Pages::new().context("Failed to load page templates")?);

    let app = app(auth_state, pages);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn build_state(dsn: Option<&str>, auth_config: AuthConfig) -> Result<AuthState> {
    let ttl_seconds = auth_config.session_ttl_seconds();

    let Some(dsn) = dsn else {
        warn!("No DSN configured, accounts and sessions are kept in memory and lost on restart");
        return Ok(AuthState::new(
            auth_config,
            Arc::new(MemoryAccountStore::new()),
            Arc::new(MemorySessionStore::new(ttl_seconds)),
        ));
    };

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    postgres::apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    Ok(AuthState::new(
        auth_config,
        Arc::new(PgAccountStore::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool, ttl_seconds)),
    ))
}

/// Build the router with every page, form and health route.
pub fn app(auth_state: Arc<AuthState>, pages: Arc<Pages>) -> Router {
    let home_gate = LoginRequired::from_config(auth_state.config());

    Router::new()
        .route(
            "/",
            get(views::home).route_layer(middleware::from_fn_with_state(
                home_gate,
                gate::require_login,
            )),
        )
        .route("/protected", get(views::protected))
        .route(
            "/register",
            get(register::register_form).post(register::register),
        )
        .route("/login", get(login::login_form).post(login::login))
        .route("/logout", get(logout::logout).post(logout::logout_post))
        .route("/health", get(health::health).options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state))
                .layer(Extension(pages)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}
