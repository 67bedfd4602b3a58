//! # REST API Errors
//!
//! Error types for the REST API module. Every error is rendered as a status
//! envelope in the negotiated representation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

use super::format::Format;
use super::response::{render_message, StatusEnvelope};

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;

/// REST API errors
#[derive(Debug, Clone, Error)]
pub enum RestError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Missing required argument
    #[error("Missing argument: {0}")]
    MissingParam(String),

    /// Request body does not parse as the declared format
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Filter names a column the table does not have
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Sort value without the `direction:column` separator
    #[error("Invalid sorting format, use: order:column (got: {0})")]
    InvalidSortFormat(String),

    /// Sort names a column the table does not have
    #[error("Invalid sort column: {0}")]
    InvalidSortColumn(String),

    /// `_limit` or `_offset` is not a non-negative integer
    #[error("Invalid value: {0}")]
    InvalidPagination(String),

    /// Raw SQL sent with a content type other than text/sql
    #[error("Only text/sql content is supported, got: {0}")]
    UnsupportedMediaType(String),

    /// Database name cannot be used
    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    /// Statement rejected by the engine
    #[error("Invalid query: {0}")]
    Query(String),

    /// Table not found
    #[error("No such table: {0}")]
    NotFound(String),

    /// Table already exists
    #[error("Table already exists: {table}")]
    Conflict { table: String, url: String },

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Unexpected engine or connection failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RestError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RestError::MissingParam(_) => StatusCode::BAD_REQUEST,
            RestError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidSortFormat(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidSortColumn(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidPagination(_) => StatusCode::BAD_REQUEST,
            RestError::UnsupportedMediaType(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidDatabaseName(_) => StatusCode::BAD_REQUEST,
            RestError::Query(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found
            RestError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            RestError::Conflict { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status envelope for this error. Server errors get a generic message.
    pub fn envelope(&self) -> StatusEnvelope {
        let envelope = match self {
            RestError::Internal(_) => StatusEnvelope::error("Internal server error"),
            other => StatusEnvelope::error(other.to_string()),
        };
        match self {
            RestError::Conflict { url, .. } => envelope.with_url(url.clone()),
            _ => envelope,
        }
    }

    /// Render as a response in the given representation
    pub fn into_response_as(self, format: Format) -> Response {
        render_message(format, self.status_code(), &self.envelope())
    }
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(table) => RestError::NotFound(table),
            StoreError::InvalidColumn(column) => RestError::InvalidFilter(column),
            StoreError::InvalidName(name) => RestError::InvalidDatabaseName(name),
            StoreError::Engine(message) => RestError::Query(message),
            StoreError::Connection(message) => RestError::Internal(message),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        self.into_response_as(Format::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RestError::InvalidPagination("BANANA".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RestError::NotFound("csv".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RestError::Conflict {
                table: "csv".to_string(),
                url: "/db/fixtures/csv".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RestError::Internal("disk".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_carry_offending_literal() {
        assert!(RestError::InvalidPagination("BANANA".into())
            .to_string()
            .contains("BANANA"));
        assert!(RestError::InvalidSortFormat("theotherway".into())
            .to_string()
            .starts_with("Invalid sorting format"));
        assert_eq!(
            RestError::InvalidFilter("nope".into()).to_string(),
            "Invalid filter: nope"
        );
    }

    #[test]
    fn test_store_error_translation() {
        assert!(matches!(
            RestError::from(StoreError::Engine("no such table: x".into())),
            RestError::Query(m) if m == "no such table: x"
        ));
        assert!(matches!(
            RestError::from(StoreError::Connection("locked".into())),
            RestError::Internal(_)
        ));
    }

    #[test]
    fn test_internal_envelope_hides_detail() {
        let envelope = RestError::Internal("disk I/O error at /secret".into()).envelope();
        assert_eq!(envelope.message, "Internal server error");
    }

    #[test]
    fn test_conflict_envelope_has_url() {
        let envelope = RestError::Conflict {
            table: "json".into(),
            url: "/db/fixtures/json".into(),
        }
        .envelope();
        assert_eq!(envelope.url.as_deref(), Some("/db/fixtures/json"));
    }
}
