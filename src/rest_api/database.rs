//! # Database Facade for REST API
//!
//! Implements [`RestHandler`] on top of the store. Every call opens one
//! session on the named database; writes are committed only after the whole
//! request succeeded, and an early return drops the session, which rolls the
//! transaction back.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;
use tracing::{debug, info};

use crate::store::{DatabaseRegistry, ResultSet, Row, Session};

use super::codec::decode;
use super::errors::{RestError, RestResult};
use super::format::Format;
use super::handler::{database_url, resource_url, RequestBody, RestHandler};
use super::parser::QueryParams;
use super::response::Reply;

/// REST handler backed by the database registry
pub struct DatabaseFacade {
    registry: Arc<DatabaseRegistry>,
}

impl DatabaseFacade {
    pub fn new(registry: Arc<DatabaseRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.registry
    }

    fn session(&self, database: &str) -> RestResult<Session> {
        let database = self.registry.resolve(database)?;
        Ok(database.session()?)
    }
}

/// Two-column `name`/`url` listing
fn link_rows(entries: impl IntoIterator<Item = (String, String)>) -> ResultSet {
    let rows = entries
        .into_iter()
        .map(|(name, url)| {
            let mut row = Row::new();
            row.insert("name".to_string(), Value::String(name));
            row.insert("url".to_string(), Value::String(url));
            row
        })
        .collect();
    ResultSet::new(vec!["name".to_string(), "url".to_string()], rows)
}

/// Rows that carry at least one field
fn non_empty(rows: Vec<Row>) -> impl Iterator<Item = Row> {
    rows.into_iter().filter(|row| !row.is_empty())
}

impl RestHandler for DatabaseFacade {
    fn list_databases(&self) -> RestResult<Reply> {
        let names = self.registry.database_names()?;
        debug!(count = names.len(), "listing databases");

        Ok(Reply::table(link_rows(names.into_iter().map(|name| {
            let url = database_url(&name);
            (name, url)
        }))))
    }

    fn list_tables(&self, database: &str) -> RestResult<Reply> {
        let session = self.session(database)?;

        Ok(Reply::table(link_rows(session.table_names()?.into_iter().map(
            |name| {
                let url = resource_url(database, &name);
                (name, url)
            },
        ))))
    }

    fn execute_sql(
        &self,
        database: &str,
        content_type: Option<String>,
        body: &[u8],
    ) -> RestResult<Reply> {
        let declared = content_type.as_deref().and_then(Format::from_media_type);
        if declared != Some(Format::Sql) {
            return Err(RestError::UnsupportedMediaType(
                content_type.unwrap_or_else(|| "none".to_string()),
            ));
        }

        let sql = std::str::from_utf8(body)
            .map_err(|e| RestError::MalformedInput(e.to_string()))?;

        let session = self.session(database)?;
        debug!(database, sql, "raw statement");
        let result = session.execute_raw(sql)?;

        Ok(Reply::table(result))
    }

    fn create(&self, database: &str, table: &str, body: &RequestBody) -> RestResult<Reply> {
        if table.is_empty() {
            return Err(RestError::MissingParam("table".to_string()));
        }
        let url = resource_url(database, table);

        let session = self.session(database)?;
        session.begin()?;
        let handle = session.table(table);
        if handle.exists()? {
            return Err(RestError::Conflict {
                table: table.to_string(),
                url,
            });
        }

        let mut inserted = 0usize;
        for row in non_empty(decode(&body.bytes, body.format)?) {
            handle.add_row(&row)?;
            inserted += 1;
        }
        handle.commit()?;

        info!(database, table, rows = inserted, "table created");
        Ok(Reply::success(StatusCode::CREATED, format!("Successfully created: {}", table)).with_url(url))
    }

    fn read(&self, database: &str, table: &str, params: &[(String, String)]) -> RestResult<Reply> {
        let session = self.session(database)?;
        let handle = session.table(table);

        let columns = handle.columns()?;
        if columns.is_empty() {
            return Err(RestError::NotFound(table.to_string()));
        }

        let query = QueryParams::parse(params, &columns)?;
        debug!(database, table, ?query, "read");
        let result = handle.select(&query.to_selection())?;

        Ok(Reply::table(result))
    }

    fn update(
        &self,
        database: &str,
        table: &str,
        unique: &[String],
        body: &RequestBody,
    ) -> RestResult<Reply> {
        let session = self.session(database)?;
        session.begin()?;
        let handle = session.table(table);
        if !handle.exists()? {
            return Err(RestError::NotFound(table.to_string()));
        }

        let (mut updated, mut appended) = (0usize, 0usize);
        for row in non_empty(decode(&body.bytes, body.format)?) {
            if handle.update_row(unique, &row)? {
                updated += 1;
            } else {
                handle.add_row(&row)?;
                appended += 1;
            }
        }
        handle.commit()?;

        info!(database, table, updated, appended, "table updated");
        Ok(Reply::success(StatusCode::CREATED, format!("Table updated: {}", table))
            .with_url(resource_url(database, table)))
    }

    fn delete(&self, database: &str, table: &str) -> RestResult<Reply> {
        let session = self.session(database)?;
        let handle = session.table(table);
        handle.drop()?;
        handle.commit()?;

        Ok(Reply::success(StatusCode::GONE, format!("Table dropped: {}", table)))
    }
}
