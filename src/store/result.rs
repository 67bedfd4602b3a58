//! Query results.

use serde_json::{Map, Value};

/// One row: column name to scalar value, in column order.
pub type Row = Map<String, Value>;

/// Materialized result of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in statement order.
    pub columns: Vec<String>,
    /// Rows keyed by column name.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Creates a result set from explicit columns and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Result of a statement that produced no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
