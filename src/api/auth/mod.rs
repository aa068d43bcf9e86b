//! Accounts, sessions and the login gate.
//!
//! Flow:
//! - `register`/`login` validate the submitted form, then call the [`AccountStore`].
//! - On success a session is established through the [`SessionStore`] and its raw
//!   token is returned to the browser in the `authgate_session` cookie.
//! - [`gate`] resolves that cookie on protected pages and redirects anonymous
//!   requests to the login page.

pub mod forms;
pub mod gate;
pub mod memory;
mod password;
pub mod postgres;
pub mod session;
pub mod state;
pub mod store;

pub use memory::{MemoryAccountStore, MemorySessionStore};
pub use postgres::{PgAccountStore, PgSessionStore};
pub use state::{AuthConfig, AuthState};
pub use store::{Account, AccountStore, EstablishedSession, Session, SessionStore, StoreError};
