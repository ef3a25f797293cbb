use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use caichat_chat::{SessionManager, StreamPacing};

use crate::signal::shutdown_requested;
use crate::web::routes::{self, AppState};

/// Web server configuration
pub struct WebServerConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub pacing: StreamPacing,
}

/// Web server instance
pub struct WebServer {
    config: WebServerConfig,
    state: AppState,
}

impl WebServer {
    /// Create a new web server over an open session
    pub fn new(config: WebServerConfig, session: Arc<SessionManager>) -> Result<Self> {
        let state = AppState::new(session, config.pacing)
            .context("web server needs an authenticated session")?;
        Ok(Self { config, state })
    }

    /// Router with all routes and layers applied
    pub fn router(&self) -> Router {
        if !self.config.static_dir.exists() {
            warn!(dir = %self.config.static_dir.display(), "static directory not found");
        }

        // Browsers load the UI from other origins during development
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::create_router(self.state.clone(), &self.config.static_dir)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.bind_addr))?;
        info!(addr = %self.config.bind_addr, "web server listening");
        println!("Web server running on http://{}", self.config.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_requested())
            .await?;

        info!("web server stopped");
        Ok(())
    }
}
