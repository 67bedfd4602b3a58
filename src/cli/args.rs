//! CLI argument definitions using clap
//!
//! Commands:
//! - tablestore serve [--config <path>] [--host <host>] [--port <port>] [--data-dir <dir>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tablestore - relational tables inside named databases, served over HTTP
#[derive(Parser, Debug)]
#[command(name = "tablestore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to, overriding the configuration file
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to, overriding the configuration file
        #[arg(long)]
        port: Option<u16>,

        /// Directory for database files, overriding the configuration file
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
