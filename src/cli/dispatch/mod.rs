//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, currently only the HTTP
//! server with its auth configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{self, auth};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .filter(|dsn| !dsn.trim().is_empty())
        .cloned();

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url: auth_opts.base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        login_url: auth_opts.login_url,
        landing_url: auth_opts.landing_url,
    }))
}
