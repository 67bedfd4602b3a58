//! # HTTP Server Module
//!
//! Serves the REST API over HTTP.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/db/<database>` - List tables, run raw SQL, create tables
//! - `/db/<database>/<table>` - Read, create, upsert and drop a table

pub mod config;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
