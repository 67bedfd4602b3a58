//! Store error types.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Table does not exist
    #[error("No such table: {0}")]
    NotFound(String),

    /// Column is not part of the table schema
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    /// Database name cannot be mapped to a backing file
    #[error("Invalid database name: {0}")]
    InvalidName(String),

    /// Statement rejected by the engine
    #[error("{0}")]
    Engine(String),

    /// Connection, locking or I/O failure
    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::PermissionDenied
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::OutOfMemory
                | ErrorCode::ReadOnly
                | ErrorCode::FileLockingProtocolFailed
                | ErrorCode::InternalMalfunction => StoreError::Connection(err.to_string()),
                _ => StoreError::Engine(err.to_string()),
            },
            rusqlite::Error::MultipleStatement
            | rusqlite::Error::ExecuteReturnedResults
            | rusqlite::Error::InvalidParameterCount(_, _) => StoreError::Engine(err.to_string()),
            _ => StoreError::Connection(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_is_engine_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = StoreError::from(conn.execute_batch("SELEKT 1").unwrap_err());
        assert!(matches!(err, StoreError::Engine(_)));
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_multiple_statements_is_engine_error() {
        let err = StoreError::from(rusqlite::Error::MultipleStatement);
        assert!(matches!(err, StoreError::Engine(_)));
    }
}
