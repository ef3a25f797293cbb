//! caichat application crate: CLI parsing, configuration, logging, the
//! terminal client and the HTTP front-end.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signal;
pub mod web;

pub use cli::{Cli, Commands};
pub use config::{normalize_upstream_url, DEFAULT_UPSTREAM_URL};
pub use logging::init_logging;
