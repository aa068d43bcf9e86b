//! # Authgate (session-based sign-up and sign-in)
//!
//! `authgate` serves the classic username/password flow: a registration form, a
//! login form, logout, and pages that are only reachable with a valid session.
//!
//! ## Accounts and sessions
//!
//! Accounts and sessions live behind the [`api::auth::AccountStore`] and
//! [`api::auth::SessionStore`] traits. Two backends exist: `PostgreSQL` (when a
//! DSN is configured) and an in-process map used for development and tests.
//!
//! - **Passwords** are stored only as salted `Argon2id` hashes.
//! - **Session tokens** are random, handed to the browser in an `HttpOnly`
//!   cookie, and only their `SHA-256` hash is stored.
//!
//! ## Login gate
//!
//! Pages that require a session either sit behind the [`api::auth::gate::require_login`]
//! middleware or take an [`api::auth::gate::Authenticated`] extractor. Both
//! redirect anonymous requests to the login page with a redirect-back parameter.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
