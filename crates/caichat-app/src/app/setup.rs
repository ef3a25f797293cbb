use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use caichat_api::{HttpUpstreamClient, UpstreamClient};
use caichat_chat::{SessionManager, StreamPacing};
use caichat_types::Credentials;

use crate::cli::Cli;
use crate::config::{normalize_upstream_url, DEFAULT_UPSTREAM_URL};

/// Application configuration derived from CLI arguments and environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub upstream_url: String,
    pub pacing: StreamPacing,
    pub web_addr: SocketAddr,
    pub static_dir: PathBuf,
}

impl AppConfig {
    /// Session manager over an HTTP client for the configured upstream
    pub fn session_manager(&self) -> SessionManager {
        let client: Arc<dyn UpstreamClient> =
            Arc::new(HttpUpstreamClient::new(self.upstream_url.clone()));
        SessionManager::new(client)
    }
}

/// Set up application configuration from CLI arguments
pub fn setup_from_cli(cli: &Cli) -> Result<AppConfig> {
    let token = match cli.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => bail!("TOKEN is not set (pass --token or set the TOKEN environment variable)"),
    };

    let web_next_auth = cli
        .web_next_auth
        .as_deref()
        .map(str::trim)
        .filter(|cookie| !cookie.is_empty())
        .map(str::to_string);

    let upstream_url = normalize_upstream_url(
        cli.upstream_url
            .as_deref()
            .unwrap_or(DEFAULT_UPSTREAM_URL),
    );

    let web_addr: SocketAddr = format!("{}:{}", cli.web_bind, cli.web_port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.web_bind, cli.web_port))?;

    Ok(AppConfig {
        credentials: Credentials::new(token, web_next_auth),
        upstream_url,
        pacing: StreamPacing::from_millis(cli.stream_delay_ms),
        web_addr,
        static_dir: cli.static_dir.clone(),
    })
}
