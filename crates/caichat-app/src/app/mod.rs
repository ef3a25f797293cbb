pub mod create_character;
pub mod repl;
pub mod setup;
pub mod web_server;

pub use create_character::run_create_character;
pub use repl::run_repl_mode;
pub use setup::{setup_from_cli, AppConfig};
pub use web_server::run_web_server;
