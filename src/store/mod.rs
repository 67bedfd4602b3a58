//! # Table Store
//!
//! Thin layer over SQLite that the REST handlers drive:
//!
//! - [`DatabaseRegistry`] maps database names to backing files
//! - [`Session`] is one connection, scoped to one request
//! - [`TableHandle`] binds a table name to engine operations
//!
//! Every table carries the system identifier column [`ID_COLUMN`].

mod errors;
mod registry;
mod result;
mod session;
mod table;
mod value;

pub use errors::{StoreError, StoreResult};
pub use registry::{Database, DatabaseRegistry};
pub use result::{ResultSet, Row};
pub use session::Session;
pub use table::{Selection, SortDirection, TableHandle};
pub use value::{column_type, from_sql_value, to_sql_value};

/// Engine-assigned unique row key, present on every table.
pub const ID_COLUMN: &str = "__id__";

/// Quote an identifier for inclusion in a statement.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
