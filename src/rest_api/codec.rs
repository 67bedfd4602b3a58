//! # Representation Codec
//!
//! Converts request bodies into rows and rows into response bodies.
//!
//! JSON bodies are an array of objects or a single object; CSV bodies are a
//! header row followed by records. Output key order is fixed for the whole
//! payload: the caller's column list, or the keys of the first row.

use serde_json::Value;

use crate::store::{Row, ID_COLUMN};

use super::errors::{RestError, RestResult};
use super::format::Format;
use super::response::StatusEnvelope;

/// Column names of a rendered status envelope
const ENVELOPE_COLUMNS: [&str; 3] = ["message", "state", "url"];

/// Decode a request body into rows
pub fn decode(body: &[u8], format: Format) -> RestResult<Vec<Row>> {
    match format {
        Format::Json => decode_json(body),
        Format::Csv => decode_csv(body),
        Format::Sql => Err(RestError::MalformedInput(
            "text/sql bodies are only accepted on the database resource".to_string(),
        )),
    }
}

fn decode_json(body: &[u8]) -> RestResult<Vec<Row>> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RestError::MalformedInput(e.to_string()))?;

    match value {
        // A single object is a one-row table
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(RestError::MalformedInput(format!(
                    "expected an object per row, got: {}",
                    other
                ))),
            })
            .collect(),
        other => Err(RestError::MalformedInput(format!(
            "expected an object or an array of objects, got: {}",
            other
        ))),
    }
}

fn decode_csv(body: &[u8]) -> RestResult<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| RestError::MalformedInput(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RestError::MalformedInput(e.to_string()))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(column, field)| (column.to_string(), Value::String(field.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Encode rows for a response.
///
/// `keys` fixes the column order; when absent the first row's keys are used.
pub fn encode<I>(rows: I, keys: Option<&[String]>, format: Format) -> RestResult<Vec<u8>>
where
    I: IntoIterator<Item = Row>,
{
    let mut rows = rows.into_iter().peekable();
    let keys: Vec<String> = match keys {
        Some(keys) => keys.to_vec(),
        None => rows
            .peek()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default(),
    };

    match format.for_response() {
        Format::Csv => encode_csv(rows, &keys),
        _ => encode_json(rows, &keys),
    }
}

fn encode_json(rows: impl Iterator<Item = Row>, keys: &[String]) -> RestResult<Vec<u8>> {
    let mut out = vec![b'['];
    for (idx, mut row) in rows.enumerate() {
        if idx > 0 {
            out.push(b',');
        }
        let ordered: Row = keys
            .iter()
            .filter_map(|key| row.remove(key).map(|value| (key.clone(), value)))
            .collect();
        serde_json::to_writer(&mut out, &ordered)
            .map_err(|e| RestError::Internal(format!("JSON encoding failed: {}", e)))?;
    }
    out.push(b']');
    Ok(out)
}

fn encode_csv(rows: impl Iterator<Item = Row>, keys: &[String]) -> RestResult<Vec<u8>> {
    let columns = csv_columns(keys);
    let mut writer = csv::Writer::from_writer(Vec::new());

    if !columns.is_empty() {
        writer.write_record(&columns).map_err(csv_error)?;
    }
    for row in rows {
        let record: Vec<String> = columns.iter().map(|c| csv_cell(row.get(c))).collect();
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| RestError::Internal(format!("CSV encoding failed: {}", e)))
}

/// CSV column order: identifier first, then the rest in encounter order
fn csv_columns(keys: &[String]) -> Vec<String> {
    let mut columns = Vec::with_capacity(keys.len());
    if keys.iter().any(|k| k == ID_COLUMN) {
        columns.push(ID_COLUMN.to_string());
    }
    columns.extend(keys.iter().filter(|k| k.as_str() != ID_COLUMN).cloned());
    columns
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_error(err: csv::Error) -> RestError {
    RestError::Internal(format!("CSV encoding failed: {}", err))
}

/// Encode a status envelope.
///
/// As CSV the envelope is a one-row table with columns `message,state,url`.
pub fn encode_message(envelope: &StatusEnvelope, format: Format) -> RestResult<Vec<u8>> {
    match format.for_response() {
        Format::Csv => {
            let keys: Vec<String> = ENVELOPE_COLUMNS.iter().map(|c| c.to_string()).collect();
            encode_csv(std::iter::once(envelope.to_row()), &keys)
        }
        _ => serde_json::to_vec(envelope)
            .map_err(|e| RestError::Internal(format!("JSON encoding failed: {}", e))),
    }
}
