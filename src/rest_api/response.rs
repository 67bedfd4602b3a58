//! # Response Formatting
//!
//! Status envelopes and the two kinds of reply a handler produces: a table
//! of rows or a status message.

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::store::{ResultSet, Row};

use super::codec::{encode, encode_message};
use super::format::Format;

/// Outcome reported in a status envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    Success,
    Error,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageState::Success => "success",
            MessageState::Error => "error",
        }
    }
}

/// `{message, state, url?}` body used for every non-tabular response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEnvelope {
    pub message: String,
    pub state: MessageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl StatusEnvelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            state: MessageState::Success,
            url: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            state: MessageState::Error,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// The envelope as a single row, for tabular formats
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("message".to_string(), Value::String(self.message.clone()));
        row.insert("state".to_string(), Value::String(self.state.as_str().to_string()));
        row.insert(
            "url".to_string(),
            self.url.clone().map_or(Value::Null, Value::String),
        );
        row
    }
}

/// What a handler hands back for rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Rows rendered through the codec
    Table { status: StatusCode, result: ResultSet },
    /// A status envelope
    Message {
        status: StatusCode,
        envelope: StatusEnvelope,
    },
}

impl Reply {
    /// 200 with a table of rows
    pub fn table(result: ResultSet) -> Self {
        Reply::Table {
            status: StatusCode::OK,
            result,
        }
    }

    /// A success envelope with the given status
    pub fn success(status: StatusCode, message: impl Into<String>) -> Self {
        Reply::Message {
            status,
            envelope: StatusEnvelope::success(message),
        }
    }

    /// Attach a resource URL to a message reply
    pub fn with_url(self, url: impl Into<String>) -> Self {
        match self {
            Reply::Message { status, envelope } => Reply::Message {
                status,
                envelope: envelope.with_url(url),
            },
            table => table,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Reply::Table { status, .. } | Reply::Message { status, .. } => *status,
        }
    }

    /// Render in the given representation
    pub fn render(self, format: Format) -> Response {
        match self {
            Reply::Table { status, result } => {
                let ResultSet { columns, rows } = result;
                match encode(rows, Some(columns.as_slice()), format) {
                    Ok(body) => respond(format, status, body),
                    Err(err) => err.into_response_as(format),
                }
            }
            Reply::Message { status, envelope } => render_message(format, status, &envelope),
        }
    }
}

/// Render a status envelope with the given status code
pub fn render_message(format: Format, status: StatusCode, envelope: &StatusEnvelope) -> Response {
    match encode_message(envelope, format) {
        Ok(body) => respond(format, status, body),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
    }
}

fn respond(format: Format, status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(CONTENT_TYPE, format.content_type())], body).into_response()
}
