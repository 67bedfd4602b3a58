//! Table handle.
//!
//! Binds a table name to engine operations inside a [`Session`]. Tables are
//! schemaless from the client's point of view: writes add any column they
//! mention that the table does not have yet, and the first write creates the
//! table itself with only the [`ID_COLUMN`]. A new column is declared with
//! the type of the first value written to it.
//!
//! Table and column names are matched case-insensitively, as the engine
//! does. Names starting with `sqlite_` belong to the engine and never
//! resolve to a table.

use rusqlite::types::Value as SqlValue;
use rusqlite::OptionalExtension;
use tracing::{debug, info};

use super::errors::{StoreError, StoreResult};
use super::result::{ResultSet, Row};
use super::session::Session;
use super::value::{column_type, to_sql_value};
use super::{quote_ident, ID_COLUMN};

/// Name prefix the engine reserves for its own tables
const INTERNAL_PREFIX: &str = "sqlite_";

/// Sort direction for one ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A selection over one table: predicate, ordering and window.
///
/// `predicate` is a SQL boolean expression using positional `?`
/// placeholders, bound in order from `params`.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub predicate: Option<String>,
    pub params: Vec<SqlValue>,
    pub order_by: Vec<(String, SortDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A named table inside the session's database.
pub struct TableHandle<'s> {
    session: &'s Session,
    name: String,
}

impl<'s> TableHandle<'s> {
    pub(crate) fn new(session: &'s Session, name: &str) -> Self {
        Self {
            session,
            name: name.to_string(),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_internal(&self) -> bool {
        self.name
            .get(..INTERNAL_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(INTERNAL_PREFIX))
    }

    /// Whether the table exists
    pub fn exists(&self) -> StoreResult<bool> {
        if self.is_internal() {
            return Ok(false);
        }
        let found = self
            .session
            .connection()
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [&self.name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Column names in declaration order; empty if the table does not exist
    pub fn columns(&self) -> StoreResult<Vec<String>> {
        if self.is_internal() {
            return Ok(Vec::new());
        }
        let sql = format!("PRAGMA table_info({})", quote_ident(&self.name));
        let mut stmt = self.session.connection().prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Make sure the table exists and has every column in `fields`.
    ///
    /// Returns the resulting column set.
    fn ensure_columns<'a>(
        &self,
        fields: impl IntoIterator<Item = (&'a String, &'a serde_json::Value)>,
    ) -> StoreResult<Vec<String>> {
        self.session.begin()?;

        let mut columns = self.columns()?;
        if columns.is_empty() {
            let sql = format!(
                "CREATE TABLE {} ({} INTEGER PRIMARY KEY)",
                quote_ident(&self.name),
                quote_ident(ID_COLUMN)
            );
            self.session.execute(&sql, &[])?;
            info!(database = %self.session.database(), table = %self.name, "created table");
            columns.push(ID_COLUMN.to_string());
        }

        for (field, value) in fields {
            if columns.iter().any(|c| c.eq_ignore_ascii_case(field)) {
                continue;
            }
            let mut sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(&self.name),
                quote_ident(field)
            );
            let declared = column_type(value);
            if let Some(declared) = declared {
                sql.push(' ');
                sql.push_str(declared);
            }
            self.session.execute(&sql, &[])?;
            debug!(table = %self.name, column = %field, ?declared, "added column");
            columns.push(field.clone());
        }

        Ok(columns)
    }

    /// Insert one row, widening the schema for unseen columns.
    ///
    /// A client-supplied identifier column is ignored.
    pub fn add_row(&self, row: &Row) -> StoreResult<()> {
        let fields: Vec<(&String, &serde_json::Value)> =
            row.iter().filter(|(k, _)| k.as_str() != ID_COLUMN).collect();
        self.ensure_columns(fields.iter().copied())?;

        if fields.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&self.name));
            self.session.execute(&sql, &[])?;
            return Ok(());
        }

        let names: Vec<String> = fields.iter().map(|(k, _)| quote_ident(k)).collect();
        let placeholders = vec!["?"; fields.len()].join(", ");
        let values: Vec<SqlValue> = fields.iter().map(|(_, v)| to_sql_value(v)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.name),
            names.join(", "),
            placeholders
        );
        self.session.execute(&sql, &values)?;
        Ok(())
    }

    /// Update the rows whose `unique` columns equal the row's values.
    ///
    /// Returns `false` when nothing matched, when `unique` is empty, or when
    /// the row has no value for one of the `unique` columns; the caller is
    /// expected to insert the row instead.
    pub fn update_row(&self, unique: &[String], row: &Row) -> StoreResult<bool> {
        if unique.is_empty() {
            return Ok(false);
        }

        let existing = self.columns()?;
        if existing.is_empty() {
            return Ok(false);
        }
        if let Some(missing) = unique.iter().find(|u| !existing.contains(u)) {
            return Err(StoreError::InvalidColumn(missing.clone()));
        }

        let mut conditions = Vec::with_capacity(unique.len());
        let mut match_values = Vec::with_capacity(unique.len());
        for column in unique {
            match row.get(column) {
                Some(value) => {
                    conditions.push(format!("{} IS ?", quote_ident(column)));
                    match_values.push(to_sql_value(value));
                }
                None => return Ok(false),
            }
        }
        let predicate = conditions.join(" AND ");

        let assignments: Vec<(&String, &serde_json::Value)> = row
            .iter()
            .filter(|(k, _)| k.as_str() != ID_COLUMN && !unique.contains(k))
            .collect();

        if assignments.is_empty() {
            let sql = format!(
                "SELECT 1 FROM {} WHERE {} LIMIT 1",
                quote_ident(&self.name),
                predicate
            );
            return Ok(!self.session.query(&sql, &match_values)?.is_empty());
        }

        self.ensure_columns(assignments.iter().copied())?;

        let set_clause: Vec<String> = assignments
            .iter()
            .map(|(k, _)| format!("{} = ?", quote_ident(k)))
            .collect();
        let mut params: Vec<SqlValue> = assignments.iter().map(|(_, v)| to_sql_value(v)).collect();
        params.extend(match_values);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(&self.name),
            set_clause.join(", "),
            predicate
        );
        let changed = self.session.execute(&sql, &params)?;
        debug!(table = %self.name, changed, "update_row");
        Ok(changed > 0)
    }

    /// Drop the table and all its rows
    pub fn drop(&self) -> StoreResult<()> {
        self.session.begin()?;
        if !self.exists()? {
            return Err(StoreError::NotFound(self.name.clone()));
        }
        self.session
            .execute(&format!("DROP TABLE {}", quote_ident(&self.name)), &[])?;
        info!(database = %self.session.database(), table = %self.name, "dropped table");
        Ok(())
    }

    /// Commit everything written through this session
    pub fn commit(&self) -> StoreResult<()> {
        self.session.commit()
    }

    /// Run a selection against the table.
    ///
    /// Rows come back in the requested order, ties broken by the identifier
    /// column, so repeated windows over unchanged data are identical.
    pub fn select(&self, selection: &Selection) -> StoreResult<ResultSet> {
        let mut sql = format!("SELECT * FROM {}", quote_ident(&self.name));
        let mut params = selection.params.clone();

        if let Some(predicate) = &selection.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }

        let mut order: Vec<String> = selection
            .order_by
            .iter()
            .map(|(column, direction)| format!("{} {}", quote_ident(column), direction.as_sql()))
            .collect();
        order.push(format!("{} ASC", quote_ident(ID_COLUMN)));
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        match (selection.limit, selection.offset) {
            (None, None) => {}
            (limit, offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(SqlValue::Integer(limit.unwrap_or(-1)));
                params.push(SqlValue::Integer(offset.unwrap_or(0)));
            }
        }

        self.session.query(&sql, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DatabaseRegistry;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        DatabaseRegistry::new(dir.path(), Duration::from_millis(100))
            .resolve("test")
            .unwrap()
            .session()
            .unwrap()
    }

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_add_row_creates_and_widens() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("weather");

        assert!(!table.exists().unwrap());
        table.add_row(&row(json!({"date": "2011-01-01", "place": "Galway"}))).unwrap();
        table.add_row(&row(json!({"place": "Honolulu", "climate": "mild"}))).unwrap();
        table.commit().unwrap();

        assert!(table.exists().unwrap());
        assert_eq!(table.columns().unwrap(), vec![ID_COLUMN, "date", "place", "climate"]);

        let result = table.select(&Selection::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0][ID_COLUMN], json!(1));
        assert_eq!(result.rows[1]["date"], Value::Null);
        assert_eq!(result.rows[1]["climate"], json!("mild"));
    }

    #[test]
    fn test_client_identifier_is_ignored() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");

        table.add_row(&row(json!({"__id__": 99, "a": 1}))).unwrap();
        let result = table.select(&Selection::default()).unwrap();
        assert_eq!(result.rows[0][ID_COLUMN], json!(1));
    }

    #[test]
    fn test_update_row_matches_unique_columns() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");
        table.add_row(&row(json!({"place": "Berkeley", "temperature": 6}))).unwrap();
        table.add_row(&row(json!({"place": "Galway", "temperature": 1}))).unwrap();

        let unique = vec!["place".to_string()];
        let updated = table
            .update_row(&unique, &row(json!({"place": "Berkeley", "country": "United States"})))
            .unwrap();
        assert!(updated);

        let missed = table
            .update_row(&unique, &row(json!({"place": "Honolulu", "country": "United States"})))
            .unwrap();
        assert!(!missed);

        let result = table.select(&Selection::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0]["country"], json!("United States"));
        assert_eq!(result.rows[1]["country"], Value::Null);
    }

    #[test]
    fn test_update_row_without_unique_never_matches() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");
        table.add_row(&row(json!({"a": 1}))).unwrap();

        assert!(!table.update_row(&[], &row(json!({"a": 1}))).unwrap());
    }

    #[test]
    fn test_update_row_unknown_unique_column() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");
        table.add_row(&row(json!({"a": 1}))).unwrap();

        let err = table
            .update_row(&["nope".to_string()], &row(json!({"nope": 1})))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidColumn(c) if c == "nope"));
    }

    #[test]
    fn test_text_matches_numeric_column() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");
        table.add_row(&row(json!({"place": "Berkeley", "temperature": 8}))).unwrap();
        table.add_row(&row(json!({"place": "Galway", "temperature": 1}))).unwrap();

        let selection = Selection {
            predicate: Some("\"temperature\" = ?".to_string()),
            params: vec![SqlValue::Text("8".to_string())],
            ..Default::default()
        };
        let result = table.select(&selection).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows[0]["temperature"], json!(8));

        let unique = vec!["temperature".to_string()];
        let updated = table
            .update_row(&unique, &row(json!({"temperature": "8", "country": "United States"})))
            .unwrap();
        assert!(updated);
        assert_eq!(table.select(&Selection::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_text_written_into_numeric_column_reads_back_as_number() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");
        table.add_row(&row(json!({"n": 1, "x": 0.5, "note": null}))).unwrap();
        table.add_row(&row(json!({"n": "2", "x": "1.5", "note": 3}))).unwrap();

        let result = table.select(&Selection::default()).unwrap();
        assert_eq!(result.rows[1]["n"], json!(2));
        assert_eq!(result.rows[1]["x"], json!(1.5));
        assert_eq!(result.rows[1]["note"], json!(3));
    }

    #[test]
    fn test_exists_ignores_case() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        session.table("foo").add_row(&row(json!({"a": "orig"}))).unwrap();

        assert!(session.table("FOO").exists().unwrap());
        assert!(session.table("Foo").exists().unwrap());
    }

    #[test]
    fn test_internal_tables_do_not_resolve() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        session.table("t").add_row(&row(json!({"a": 1}))).unwrap();

        for name in ["sqlite_master", "SQLITE_MASTER", "sqlite_schema"] {
            let table = session.table(name);
            assert!(!table.exists().unwrap());
            assert!(table.columns().unwrap().is_empty());
        }
    }

    #[test]
    fn test_drop_missing_table() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        assert!(matches!(
            session.table("ghost").drop(),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_select_window_and_order() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let table = session.table("t");
        for n in [1, -1, 0, 6, 8, 5] {
            table.add_row(&row(json!({ "n": n }))).unwrap();
        }

        let selection = Selection {
            order_by: vec![("n".to_string(), SortDirection::Descending)],
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        let result = table.select(&selection).unwrap();
        let values: Vec<_> = result.rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(values, vec![json!(6), json!(5)]);

        let offset_only = Selection {
            offset: Some(4),
            ..Default::default()
        };
        assert_eq!(table.select(&offset_only).unwrap().len(), 2);
    }
}
