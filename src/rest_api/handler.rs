//! # REST API Handler
//!
//! The operations behind each resource. Implementations are synchronous and
//! run on the blocking pool; the server takes care of negotiation and
//! rendering.

use super::errors::RestResult;
use super::format::Format;
use super::response::Reply;

/// A request body with the format it was declared in
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub format: Format,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    pub fn new(format: Format, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }
}

/// Path-only URL of a table resource
pub fn resource_url(database: &str, table: &str) -> String {
    format!("/db/{}/{}", database, table)
}

/// Path-only URL of a database resource
pub fn database_url(database: &str) -> String {
    format!("/db/{}", database)
}

/// REST handler trait for database and table resources
pub trait RestHandler: Send + Sync + 'static {
    /// List the databases that have a backing file
    fn list_databases(&self) -> RestResult<Reply>;

    /// List the tables of a database
    fn list_tables(&self, database: &str) -> RestResult<Reply>;

    /// Execute a raw statement body. `content_type` is the declared
    /// `Content-Type` header, if any.
    fn execute_sql(
        &self,
        database: &str,
        content_type: Option<String>,
        body: &[u8],
    ) -> RestResult<Reply>;

    /// Create a table from the rows in the body
    fn create(&self, database: &str, table: &str, body: &RequestBody) -> RestResult<Reply>;

    /// Read rows selected by query arguments
    fn read(&self, database: &str, table: &str, params: &[(String, String)]) -> RestResult<Reply>;

    /// Update rows matched on `unique` columns, appending rows that match nothing
    fn update(
        &self,
        database: &str,
        table: &str,
        unique: &[String],
        body: &RequestBody,
    ) -> RestResult<Reply>;

    /// Drop a table
    fn delete(&self, database: &str, table: &str) -> RestResult<Reply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url() {
        assert_eq!(resource_url("fixtures", "csv"), "/db/fixtures/csv");
    }
}
