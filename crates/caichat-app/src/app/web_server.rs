use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use caichat_chat::SessionManager;

use crate::app::setup::AppConfig;
use crate::web::server::{WebServer, WebServerConfig};

/// Run the web server until Ctrl-C
pub async fn run_web_server(config: &AppConfig, session: Arc<SessionManager>) -> Result<()> {
    println!("{}", "Starting caichat web server...".bright_cyan());
    println!("   Address: {}", config.web_addr);
    println!("   Upstream: {}", config.upstream_url);

    let server_config = WebServerConfig {
        bind_addr: config.web_addr,
        static_dir: config.static_dir.clone(),
        pacing: config.pacing,
    };

    let server = WebServer::new(server_config, session)?;
    server.start().await?;

    Ok(())
}
