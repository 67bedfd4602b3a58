//! # REST API HTTP Server
//!
//! Axum routes for database and table resources. Each handler negotiates the
//! representation, runs the [`RestHandler`] call on the blocking pool and
//! renders the outcome.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use super::errors::{RestError, RestResult};
use super::format::{explicit_format, request_format, response_format, split_format, Format};
use super::handler::{RequestBody, RestHandler};
use super::response::Reply;

/// Query argument naming the table to create on the database resource
const TABLE_PARAM: &str = "table";

/// Query argument naming the columns an update matches on
const UNIQUE_PARAM: &str = "unique";

/// REST API server state
pub struct RestServer<H: RestHandler> {
    handler: Arc<H>,
}

impl<H: RestHandler> RestServer<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Build the Axum router
    pub fn router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/health", get(health_handler))
            .route("/db", get(databases_handler::<H>))
            .route(
                "/db/{database}",
                get(list_handler::<H>)
                    .put(sql_handler::<H>)
                    .post(create_in_database_handler::<H>),
            )
            .route(
                "/db/{database}/{table}",
                get(read_handler::<H>)
                    .put(update_handler::<H>)
                    .post(create_handler::<H>)
                    .delete(delete_handler::<H>),
            )
            .with_state(state)
    }
}

/// Shared state type
type ServerState<H> = Arc<RestServer<H>>;

type Params = Vec<(String, String)>;

/// Run a handler call on the blocking pool
async fn run_blocking<H, F>(server: &ServerState<H>, call: F) -> RestResult<Reply>
where
    H: RestHandler,
    F: FnOnce(&H) -> RestResult<Reply> + Send + 'static,
{
    let handler = Arc::clone(&server.handler);
    tokio::task::spawn_blocking(move || call(&handler))
        .await
        .map_err(|e| RestError::Internal(format!("handler task failed: {}", e)))?
}

/// Render a handler outcome in the negotiated format
fn finish(format: Format, result: RestResult<Reply>) -> Response {
    match result {
        Ok(reply) => reply.render(format),
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                error!(status = status.as_u16(), error = %err, "request failed");
            } else {
                warn!(status = status.as_u16(), error = %err, "request rejected");
            }
            err.into_response_as(format)
        }
    }
}

fn first_param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Health check handler
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// List databases handler
async fn databases_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let format = response_format(explicit_format(None, &params), &headers);
    let result = run_blocking(&server, |h| h.list_databases()).await;
    finish(format, result)
}

/// List tables handler
async fn list_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path(database): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let (database, suffix) = split_format(&database);
    let format = response_format(explicit_format(suffix, &params), &headers);

    let database = database.to_string();
    let result = run_blocking(&server, move |h| h.list_tables(&database)).await;
    finish(format, result)
}

/// Raw SQL handler
async fn sql_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path(database): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (database, suffix) = split_format(&database);
    let format = response_format(explicit_format(suffix, &params), &headers);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let database = database.to_string();
    let result =
        run_blocking(&server, move |h| h.execute_sql(&database, content_type, &body)).await;
    finish(format, result)
}

/// Create handler for `POST /db/{database}?table=T`
async fn create_in_database_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path(database): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (database, suffix) = split_format(&database);
    let format = response_format(explicit_format(suffix, &params), &headers);

    let table = match first_param(&params, TABLE_PARAM) {
        Some(table) if !table.is_empty() => table.to_string(),
        _ => return finish(format, Err(RestError::MissingParam(TABLE_PARAM.to_string()))),
    };

    let body = RequestBody::new(request_format(suffix, &headers), body.to_vec());
    let database = database.to_string();
    let result = run_blocking(&server, move |h| h.create(&database, &table, &body)).await;
    finish(format, result)
}

/// Create handler for `POST /db/{database}/{table}`
async fn create_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path((database, table)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (table, suffix) = split_format(&table);
    let format = response_format(explicit_format(suffix, &params), &headers);

    let body = RequestBody::new(request_format(suffix, &headers), body.to_vec());
    let table = table.to_string();
    let result = run_blocking(&server, move |h| h.create(&database, &table, &body)).await;
    finish(format, result)
}

/// Read rows handler
async fn read_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path((database, table)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let (table, suffix) = split_format(&table);
    let format = response_format(explicit_format(suffix, &params), &headers);

    let table = table.to_string();
    let result = run_blocking(&server, move |h| h.read(&database, &table, &params)).await;
    finish(format, result)
}

/// Upsert rows handler
async fn update_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path((database, table)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (table, suffix) = split_format(&table);
    let format = response_format(explicit_format(suffix, &params), &headers);

    let unique: Vec<String> = params
        .iter()
        .filter(|(k, v)| k == UNIQUE_PARAM && !v.is_empty())
        .map(|(_, v)| v.clone())
        .collect();
    let body = RequestBody::new(request_format(suffix, &headers), body.to_vec());
    let table = table.to_string();
    let result =
        run_blocking(&server, move |h| h.update(&database, &table, &unique, &body)).await;
    finish(format, result)
}

/// Drop table handler
async fn delete_handler<H: RestHandler>(
    State(server): State<ServerState<H>>,
    Path((database, table)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let (table, suffix) = split_format(&table);
    let format = response_format(explicit_format(suffix, &params), &headers);

    let table = table.to_string();
    let result = run_blocking(&server, move |h| h.delete(&database, &table)).await;
    finish(format, result)
}
