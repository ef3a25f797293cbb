use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use caichat::app::{run_create_character, run_repl_mode, run_web_server, setup_from_cli};
use caichat::signal::spawn_close_on_terminate;
use caichat::{init_logging, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    // Set up application configuration from CLI
    let app_config = setup_from_cli(&cli)?;
    let session = Arc::new(app_config.session_manager());

    let cli_ref = &cli;
    let config_ref = &app_config;
    let session_ref = &session;

    // The session is closed on every exit path, panics included
    session
        .run_scoped(&app_config.credentials, move |identity| async move {
            tracing::info!(username = %identity.username, "session ready");

            if cli_ref.web && cli_ref.command.is_none() {
                return run_web_server(config_ref, Arc::clone(session_ref)).await;
            }

            // Line editing blocks this task, so SIGTERM is watched elsewhere
            let watcher = spawn_close_on_terminate(Arc::clone(session_ref));
            let result = match cli_ref.command {
                Some(Commands::CreateCharacter) => run_create_character(session_ref).await,
                None => run_repl_mode(session_ref, config_ref.pacing).await,
            };
            watcher.abort();
            result
        })
        .await
        .context("could not authenticate with the upstream service")?
}
