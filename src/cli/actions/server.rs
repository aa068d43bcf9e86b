use crate::api::{self, auth::AuthConfig};
use anyhow::{Context, Result};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub base_url: String,
    pub session_ttl_seconds: i64,
    pub login_url: String,
    pub landing_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let base_url = Url::parse(&args.base_url)
        .with_context(|| format!("Invalid base URL: {}", args.base_url))?;

    if let Some(dsn) = &args.dsn {
        let parsed = Url::parse(dsn).context("Invalid database connection string")?;
        info!(
            "Using PostgreSQL store at {}",
            parsed.host_str().unwrap_or("localhost")
        );
    }

    let auth_config = AuthConfig::new(base_url.to_string())
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_login_url(args.login_url)
        .with_landing_url(args.landing_url);

    debug!("Auth config: {:?}", auth_config);

    api::new(args.port, args.dsn, auth_config).await
}
