use clap::{Parser, Subcommand};
use std::path::PathBuf;

use caichat_types::DEFAULT_STREAM_DELAY_MS;

/// CLI arguments for caichat
#[derive(Parser, Debug)]
#[command(name = "caichat")]
#[command(about = "Character chat relay - terminal client and streaming web API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Upstream account token
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Optional web-next-auth cookie sent alongside the token
    #[arg(long, env = "WEB_NEXT_AUTH", hide_env_values = true)]
    pub web_next_auth: Option<String>,

    /// Base URL of the upstream gateway
    #[arg(long, env = "CAICHAT_UPSTREAM_URL", value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Serve the HTTP API instead of the terminal client
    #[arg(long)]
    pub web: bool,

    /// Port for the web server
    #[arg(long, env = "PORT", default_value = "10000")]
    pub web_port: u16,

    /// Address for the web server to bind to
    #[arg(long, env = "CAICHAT_WEB_BIND", default_value = "0.0.0.0")]
    pub web_bind: String,

    /// Directory holding index.html and other static assets
    #[arg(long, value_name = "DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Pause between streamed chunks in milliseconds (0 disables pacing)
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_STREAM_DELAY_MS)]
    pub stream_delay_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactively create a new character, then exit
    CreateCharacter,
}
