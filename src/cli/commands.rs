//! CLI command implementations

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::http_server::HttpServer;
use crate::logging;
use crate::store::DatabaseRegistry;

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            host,
            port,
            data_dir,
        } => serve(
            config.as_deref(),
            ServeOverrides {
                host,
                port,
                data_dir,
            },
        ),
    }
}

/// Resolve the effective configuration.
///
/// Without a config path the defaults are used; a path that cannot be read
/// or parsed is an error. Overrides are applied before validation.
pub fn load_config(config_path: Option<&Path>, overrides: ServeOverrides) -> CliResult<ServerConfig> {
    let mut config = match config_path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    if let Some(host) = overrides.host {
        config.http.host = host;
    }
    if let Some(port) = overrides.port {
        config.http.port = port;
    }
    if let Some(data_dir) = overrides.data_dir {
        config.data_dir = data_dir;
    }

    config.validate()?;
    Ok(config)
}

/// Start the HTTP server
///
/// 1. Resolve configuration
/// 2. Initialize logging
/// 3. Create the data directory and the database registry
/// 4. Serve until the process is stopped
pub fn serve(config_path: Option<&Path>, overrides: ServeOverrides) -> CliResult<()> {
    let config = load_config(config_path, overrides)?;
    logging::init(&config.logging)?;

    fs::create_dir_all(&config.data_dir).map_err(|e| {
        CliError::boot_failed(format!(
            "Failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        ))
    })?;
    info!(data_dir = %config.data_dir.display(), "using data directory");

    let registry = Arc::new(DatabaseRegistry::new(
        config.data_dir.clone(),
        config.busy_timeout(),
    ));
    let server = HttpServer::new(config.http.clone(), registry);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}
