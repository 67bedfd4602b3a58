//! Request-scoped database session.
//!
//! A session owns one SQLite connection. Writes run inside a single
//! `IMMEDIATE` transaction that is started on the first write and must be
//! committed explicitly; a session dropped with an open transaction rolls it
//! back, so early error exits never leave partial writes behind.
//!
//! Raw statements are the exception: they run as sent, in autocommit mode
//! unless the session already holds a transaction, so statements the engine
//! refuses inside a transaction (`VACUUM`, `BEGIN`, ...) work as well.

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OpenFlags, Statement};
use tracing::{debug, warn};

use super::errors::{StoreError, StoreResult};
use super::result::{ResultSet, Row};
use super::table::TableHandle;
use super::value::from_sql_value;

/// One connection to one database, used for the duration of one request.
pub struct Session {
    conn: Connection,
    database: String,
    in_transaction: Cell<bool>,
}

impl Session {
    /// Open a connection to the database file at `path`
    pub(crate) fn open(database: &str, path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            database: database.to_string(),
            in_transaction: Cell::new(false),
        })
    }

    /// Name of the database this session is bound to
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Handle for a table in this database
    pub fn table(&self, name: &str) -> TableHandle<'_> {
        TableHandle::new(self, name)
    }

    /// Start the write transaction if it is not already open.
    ///
    /// `IMMEDIATE` takes the database write lock up front, which serializes
    /// concurrent schema widening on the same database.
    pub fn begin(&self) -> StoreResult<()> {
        if !self.in_transaction.get() {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_transaction.set(true);
        }
        Ok(())
    }

    /// Commit the open transaction, if any
    pub fn commit(&self) -> StoreResult<()> {
        if self.in_transaction.get() {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction.set(false);
            debug!(database = %self.database, "committed");
        }
        Ok(())
    }

    /// Whether a write transaction is open
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    /// Names of all user tables, sorted
    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Execute a raw statement as sent.
    ///
    /// A single statement is atomic on its own, so no transaction is opened
    /// for it. Statements that produce columns return their rows; all others
    /// return an empty result set.
    pub fn execute_raw(&self, sql: &str) -> StoreResult<ResultSet> {
        let mut stmt = self.conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            let changed = stmt.execute([])?;
            debug!(database = %self.database, changed, "executed statement");
            return Ok(ResultSet::empty());
        }
        collect_rows(&mut stmt, &[])
    }

    /// Run a query with positional parameters and materialize the rows
    pub(crate) fn query(&self, sql: &str, params: &[SqlValue]) -> StoreResult<ResultSet> {
        debug!(database = %self.database, sql, "query");
        let mut stmt = self.conn.prepare(sql)?;
        collect_rows(&mut stmt, params)
    }

    /// Run a statement with positional parameters, returning affected rows
    pub(crate) fn execute(&self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        debug!(database = %self.database, sql, "execute");
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction.get() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(database = %self.database, error = %e, "rollback failed");
            } else {
                debug!(database = %self.database, "rolled back uncommitted transaction");
            }
        }
    }
}

/// Result column names, with repeats suffixed `:1`, `:2`, ... so no value
/// is lost when rows become maps
fn distinct_column_names(names: Vec<&str>) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 0;
        while distinct.contains(&candidate) {
            n += 1;
            candidate = format!("{}:{}", name, n);
        }
        distinct.push(candidate);
    }
    distinct
}

fn collect_rows(stmt: &mut Statement<'_>, params: &[SqlValue]) -> StoreResult<ResultSet> {
    let columns = distinct_column_names(stmt.column_names());
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, column) in columns.iter().enumerate() {
            record.insert(column.clone(), from_sql_value(row.get_ref(idx)?));
        }
        collected.push(record);
    }

    Ok(ResultSet::new(columns, collected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DatabaseRegistry;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Session {
        DatabaseRegistry::new(dir.path(), Duration::from_millis(100))
            .resolve("test")
            .unwrap()
            .session()
            .unwrap()
    }

    #[test]
    fn test_raw_select() {
        let dir = TempDir::new().unwrap();
        let session = open(&dir);

        let result = session.execute_raw("SELECT 1 AS one, 'x' AS two").unwrap();
        assert_eq!(result.columns, vec!["one", "two"]);
        assert_eq!(result.rows[0]["one"], json!(1));
        assert_eq!(result.rows[0]["two"], json!("x"));
    }

    #[test]
    fn test_raw_ddl_returns_empty_set() {
        let dir = TempDir::new().unwrap();
        let session = open(&dir);

        let result = session.execute_raw("CREATE TABLE t (a)").unwrap();
        assert!(result.columns.is_empty());
        assert!(result.is_empty());
        session.commit().unwrap();
        assert_eq!(session.table_names().unwrap(), vec!["t"]);
    }

    #[test]
    fn test_uncommitted_work_rolls_back_on_drop() {
        let dir = TempDir::new().unwrap();
        {
            let session = open(&dir);
            session.begin().unwrap();
            session.execute_raw("CREATE TABLE t (a)").unwrap();
            assert!(session.in_transaction());
        }
        let session = open(&dir);
        assert!(session.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_raw_statement_runs_outside_transaction() {
        let dir = TempDir::new().unwrap();
        {
            let session = open(&dir);
            session.execute_raw("CREATE TABLE t (a)").unwrap();
            assert!(!session.in_transaction());
            session.execute_raw("VACUUM").unwrap();
        }
        assert_eq!(open(&dir).table_names().unwrap(), vec!["t"]);
    }

    #[test]
    fn test_duplicate_result_columns_are_kept() {
        let dir = TempDir::new().unwrap();
        let session = open(&dir);

        let result = session.execute_raw("SELECT 1 AS a, 2 AS a, 3 AS a").unwrap();
        assert_eq!(result.columns, vec!["a", "a:1", "a:2"]);
        assert_eq!(result.rows[0]["a"], json!(1));
        assert_eq!(result.rows[0]["a:1"], json!(2));
        assert_eq!(result.rows[0]["a:2"], json!(3));
    }

    #[test]
    fn test_raw_syntax_error() {
        let dir = TempDir::new().unwrap();
        let session = open(&dir);

        let err = session.execute_raw("SELECT FROM WHERE").unwrap_err();
        assert!(matches!(err, StoreError::Engine(_)));
    }
}
