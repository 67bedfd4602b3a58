//! # Representation Formats
//!
//! Content negotiation between the wire formats and the handlers.
//!
//! Responses: explicit path suffix or `_format` argument, then `Accept`,
//! then JSON. Request bodies: `Content-Type`, then path suffix, then JSON.

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::HeaderMap;

/// Query argument that selects the response format explicitly
pub const FORMAT_PARAM: &str = "_format";

/// Wire representation of rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Structured records: one JSON object per row
    Json,
    /// Delimited text: CSV with a header row
    Csv,
    /// Raw statement text; only meaningful as a request body
    Sql,
}

impl Format {
    /// Format named by a path suffix or `_format` value
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "csv" => Some(Format::Csv),
            "sql" => Some(Format::Sql),
            _ => None,
        }
    }

    /// Format for a media type; parameters such as `charset` are ignored
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/json" => Some(Format::Json),
            "text/csv" => Some(Format::Csv),
            "text/sql" => Some(Format::Sql),
            _ => None,
        }
    }

    /// Content type used when rendering a response in this format
    pub fn content_type(&self) -> &'static str {
        match self.for_response() {
            Format::Csv => "text/csv; charset=utf-8",
            _ => "application/json",
        }
    }

    /// Format actually used for a response body. SQL has no row
    /// representation, so it renders as JSON.
    pub fn for_response(self) -> Self {
        match self {
            Format::Sql => Format::Json,
            other => other,
        }
    }
}

/// Split a `.json`, `.csv` or `.sql` suffix off a path segment.
///
/// Other extensions are part of the name.
pub fn split_format(segment: &str) -> (&str, Option<Format>) {
    if let Some((name, ext)) = segment.rsplit_once('.') {
        if let Some(format) = Format::from_extension(ext) {
            return (name, Some(format));
        }
    }
    (segment, None)
}

/// Explicit format from the path suffix or the `_format` argument
pub fn explicit_format(suffix: Option<Format>, params: &[(String, String)]) -> Option<Format> {
    suffix.or_else(|| {
        params
            .iter()
            .find(|(k, _)| k == FORMAT_PARAM)
            .and_then(|(_, v)| Format::from_extension(v))
    })
}

/// Resolve the response format
pub fn response_format(explicit: Option<Format>, headers: &HeaderMap) -> Format {
    if let Some(format) = explicit {
        return format;
    }
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|accept| accept.split(',').find_map(Format::from_media_type))
        .unwrap_or(Format::Json)
}

/// Declared `Content-Type` of the request body, if recognized
pub fn content_format(headers: &HeaderMap) -> Option<Format> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(Format::from_media_type)
}

/// Resolve the request body format
pub fn request_format(explicit: Option<Format>, headers: &HeaderMap) -> Format {
    content_format(headers).or(explicit).unwrap_or(Format::Json)
}
