use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_LOGIN_URL: &str = "login-url";
pub const ARG_LANDING_URL: &str = "landing-url";

#[derive(Debug)]
pub struct Options {
    pub base_url: String,
    pub session_ttl_seconds: i64,
    pub login_url: String,
    pub landing_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing from the matches.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            base_url: matches
                .get_one::<String>(ARG_BASE_URL)
                .cloned()
                .context("missing required argument: --base-url")?,
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .context("missing required argument: --session-ttl-seconds")?,
            login_url: matches
                .get_one::<String>(ARG_LOGIN_URL)
                .cloned()
                .context("missing required argument: --login-url")?,
            landing_url: matches
                .get_one::<String>(ARG_LANDING_URL)
                .cloned()
                .context("missing required argument: --landing-url")?,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL; an https URL marks the session cookie Secure")
                .env("AUTHGATE_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("AUTHGATE_SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOGIN_URL)
                .long(ARG_LOGIN_URL)
                .help("Where anonymous requests to gated pages are sent")
                .env("AUTHGATE_LOGIN_URL")
                .default_value("/login"),
        )
        .arg(
            Arg::new(ARG_LANDING_URL)
                .long(ARG_LANDING_URL)
                .help("Redirect target after registration, login without `next`, and POST logout")
                .env("AUTHGATE_LANDING_URL")
                .default_value("/"),
        )
}
