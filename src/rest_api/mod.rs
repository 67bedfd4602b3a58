//! # REST API Module
//!
//! Exposes every database as `/db/<database>` and every table inside it as
//! `/db/<database>/<table>`, in JSON or CSV.

pub mod codec;
pub mod database;
pub mod errors;
pub mod filter;
pub mod format;
pub mod handler;
pub mod parser;
pub mod response;
pub mod server;

pub use database::DatabaseFacade;
pub use errors::{RestError, RestResult};
pub use filter::{FilterExpr, FilterOperator, FilterSet};
pub use format::Format;
pub use handler::{RequestBody, RestHandler};
pub use parser::QueryParams;
pub use response::{Reply, StatusEnvelope};
pub use server::RestServer;
