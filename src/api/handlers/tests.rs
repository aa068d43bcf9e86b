//! Router-level tests against the in-memory stores.

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use secrecy::SecretString;
use std::sync::Arc;
use tower::ServiceExt;

use crate::api::{
    app,
    auth::{AccountStore, AuthConfig, AuthState, MemoryAccountStore, MemorySessionStore},
    pages::Pages,
};

const FORM: &str = "application/x-www-form-urlencoded";

struct TestApp {
    router: Router,
    accounts: Arc<MemoryAccountStore>,
    sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    fn new() -> Result<Self> {
        let config = AuthConfig::new("http://localhost:8080".to_string());
        let accounts = Arc::new(MemoryAccountStore::new());
        let sessions = Arc::new(MemorySessionStore::new(config.session_ttl_seconds()));
        let auth_state = Arc::new(AuthState::new(config, accounts.clone(), sessions.clone()));
        let pages = Arc::new(Pages::new()?);

        Ok(Self {
            router: app(auth_state, pages),
            accounts,
            sessions,
        })
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty())?).await
    }

    async fn post(&self, uri: &str, body: &str, cookie: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, FORM);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string()))?).await
    }

    async fn register_and_login(&self, username: &str, password: &str) -> Result<String> {
        self.accounts
            .create(username, &SecretString::from(password))
            .await?;
        let response = self
            .post(
                "/login",
                &format!("username={username}&password={password}"),
                None,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::FOUND);
        session_cookie(&response).context("login did not set a session cookie")
    }
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// `name=value` part of the `Set-Cookie` header, ready for a `Cookie` header.
fn session_cookie(response: &Response) -> Option<String> {
    let value = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_string)
}

async fn body_text(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn register_form_renders() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.get("/register", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("name=\"password_confirm\""));
    Ok(())
}

#[tokio::test]
async fn register_with_mismatched_passwords_creates_nothing() -> Result<()> {
    let app = TestApp::new()?;
    let response = app
        .post(
            "/register",
            "username=alice&password=pw1&password_confirm=pw2",
            None,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body = body_text(response).await?;
    assert!(body.contains("Passwords do not match!"));
    assert!(body.contains("value=\"alice\""));
    assert!(app.accounts.is_empty().await);
    assert_eq!(app.sessions.active().await, 0);
    Ok(())
}

#[tokio::test]
async fn register_with_missing_fields_reports_required() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.post("/register", "username=alice", None).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("This field is required."));
    assert!(!body.contains("Passwords do not match!"));
    assert!(app.accounts.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn register_success_signs_in_and_redirects_home() -> Result<()> {
    let app = TestApp::new()?;
    let response = app
        .post(
            "/register",
            "username=bob&password=secret&password_confirm=secret",
            None,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/"));
    let cookie = session_cookie(&response).context("missing session cookie")?;
    assert_eq!(app.accounts.len().await, 1);
    assert!(app.accounts.contains("bob").await);
    assert_eq!(app.sessions.active().await, 1);
    let bob = app
        .accounts
        .authenticate("bob", &SecretString::from("secret"))
        .await?
        .context("bob cannot sign in")?;
    assert_eq!(app.sessions.active_for(bob.id).await, 1);

    let response = app.get("/", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains("bob"));
    Ok(())
}

#[tokio::test]
async fn register_replaces_existing_session() -> Result<()> {
    let app = TestApp::new()?;
    let alice = app.register_and_login("alice", "secret").await?;

    let response = app
        .post(
            "/register",
            "username=bob&password=secret&password_confirm=secret",
            Some(&alice),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let bob = session_cookie(&response).context("missing session cookie")?;
    assert_ne!(alice, bob);
    assert_eq!(app.sessions.active().await, 1);

    let response = app.get("/", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let response = app.get("/", Some(&bob)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains("bob"));
    Ok(())
}

#[tokio::test]
async fn register_with_blank_passwords_creates_nothing() -> Result<()> {
    let app = TestApp::new()?;
    let response = app
        .post(
            "/register",
            "username=alice&password=%20%20%20&password_confirm=%20%20%20",
            None,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body = body_text(response).await?;
    assert!(body.contains("This field is required."));
    assert!(!body.contains("Passwords do not match!"));
    assert!(app.accounts.is_empty().await);
    assert_eq!(app.sessions.active().await, 0);
    Ok(())
}

#[tokio::test]
async fn register_stores_normalized_username_and_trimmed_password() -> Result<()> {
    let app = TestApp::new()?;
    // Fullwidth "ｂｏｂ" and a password padded with spaces.
    let response = app
        .post(
            "/register",
            "username=%EF%BD%82%EF%BD%8F%EF%BD%82&password=%20secret%20&password_confirm=secret",
            None,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(app.accounts.contains("bob").await);
    let account = app
        .accounts
        .authenticate("bob", &SecretString::from("secret"))
        .await?;
    assert!(account.is_some());
    Ok(())
}

#[tokio::test]
async fn register_duplicate_username_is_a_field_error() -> Result<()> {
    let app = TestApp::new()?;
    app.accounts
        .create("bob", &SecretString::from("secret"))
        .await?;

    let response = app
        .post(
            "/register",
            "username=bob&password=other&password_confirm=other",
            None,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(body_text(response)
        .await?
        .contains("A user with that username already exists."));
    assert_eq!(app.accounts.len().await, 1);
    assert_eq!(app.sessions.active().await, 0);
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() -> Result<()> {
    let app = TestApp::new()?;
    app.accounts
        .create("bob", &SecretString::from("secret"))
        .await?;

    let response = app
        .post("/login", "username=bob&password=wrong", None)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(body_text(response).await?.contains("Invalid Credentials!"));
    assert_eq!(app.sessions.active().await, 0);
    Ok(())
}

#[tokio::test]
async fn login_with_unknown_user_is_rejected() -> Result<()> {
    let app = TestApp::new()?;
    let response = app
        .post("/login", "username=nobody&password=secret", None)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains("Invalid Credentials!"));
    assert_eq!(app.sessions.active().await, 0);
    Ok(())
}

#[tokio::test]
async fn login_redirect_precedence() -> Result<()> {
    let app = TestApp::new()?;
    app.accounts
        .create("bob", &SecretString::from("secret"))
        .await?;

    let response = app
        .post(
            "/login?next=/from-query",
            "username=bob&password=secret&next=/from-form",
            None,
        )
        .await?;
    assert_eq!(location(&response), Some("/from-form"));

    let response = app
        .post(
            "/login?next=/from-query",
            "username=bob&password=secret&next=",
            None,
        )
        .await?;
    assert_eq!(location(&response), Some("/from-query"));

    let response = app
        .post("/login", "username=bob&password=secret", None)
        .await?;
    assert_eq!(location(&response), Some("/"));
    Ok(())
}

#[tokio::test]
async fn login_replaces_existing_session() -> Result<()> {
    let app = TestApp::new()?;
    let first = app.register_and_login("bob", "secret").await?;

    let response = app
        .post("/login", "username=bob&password=secret", Some(&first))
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let second = session_cookie(&response).context("missing session cookie")?;
    assert_ne!(first, second);
    assert_eq!(app.sessions.active().await, 1);

    let response = app.get("/", Some(&first)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let response = app.get("/", Some(&second)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn login_form_keeps_redirect_target() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.get("/login?redirect_to=/protected", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("name=\"next\""));
    assert!(body.contains("protected"));
    Ok(())
}

#[tokio::test]
async fn gated_pages_redirect_anonymous_requests() -> Result<()> {
    let app = TestApp::new()?;

    let response = app.get("/", None).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login?next=/"));

    let response = app.get("/protected", None).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login?redirect_to=/protected"));

    let response = app.get("/protected", Some("authgate_session=forged")).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    Ok(())
}

#[tokio::test]
async fn gated_pages_render_with_session() -> Result<()> {
    let app = TestApp::new()?;
    let cookie = app.register_and_login("bob", "secret").await?;

    let response = app.get("/protected", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("Protected page"));
    assert!(body.contains("bob"));
    Ok(())
}

#[tokio::test]
async fn logout_get_destroys_session() -> Result<()> {
    let app = TestApp::new()?;
    let cookie = app.register_and_login("bob", "secret").await?;

    let response = app.get("/logout", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(app.sessions.active().await, 0);

    let response = app.get("/", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    Ok(())
}

#[tokio::test]
async fn logout_post_keeps_session() -> Result<()> {
    let app = TestApp::new()?;
    let cookie = app.register_and_login("bob", "secret").await?;

    let response = app.post("/logout", "", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/"));
    assert_eq!(app.sessions.active().await, 1);

    let response = app.get("/", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_without_session_still_redirects() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.get("/logout", None).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.get("/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let x_app = response
        .headers()
        .get("X-App")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(x_app.starts_with(env!("CARGO_PKG_NAME")));

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["database"], "ok");

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/health")
        .body(Body::empty())?;
    let response = app.send(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_and_propagated() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.get("/health", None).await?;
    assert!(response.headers().get("x-request-id").is_some());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = app.send(request).await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}
