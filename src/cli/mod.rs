//! CLI module for tablestore
//!
//! Provides command-line interface for:
//! - serve: Start the HTTP server

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{load_config, run, run_command, serve, ServeOverrides};
pub use errors::{CliError, CliResult};
