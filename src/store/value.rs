//! Conversion between row values and engine values.
//!
//! Strings, integers, reals and null map directly. Booleans are stored as
//! 0/1 and nested arrays or objects as their compact JSON text. Blobs only
//! arrive through raw SQL and are read back as base64 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Convert a row value into a bindable engine value.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Declared type for a column first written with `value`.
///
/// The type gives the column an affinity, so text from query strings or CSV
/// bodies compares equal to numbers written through JSON. Null leaves the
/// column untyped.
pub fn column_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some("INTEGER"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("INTEGER"),
        Value::Number(_) => Some("REAL"),
        Value::String(_) | Value::Array(_) | Value::Object(_) => Some("TEXT"),
    }
}

/// Convert an engine value into a row value.
pub fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_to_sql() {
        assert_eq!(to_sql_value(&json!("Galway")), SqlValue::Text("Galway".into()));
        assert_eq!(to_sql_value(&json!(-1)), SqlValue::Integer(-1));
        assert_eq!(to_sql_value(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&Value::Null), SqlValue::Null);
    }

    #[test]
    fn test_nested_values_stored_as_json_text() {
        let value = json!({"lat": 53.27, "tags": ["coast"]});
        assert_eq!(
            to_sql_value(&value),
            SqlValue::Text(r#"{"lat":53.27,"tags":["coast"]}"#.into())
        );
    }

    #[test]
    fn test_column_type_follows_first_value() {
        assert_eq!(column_type(&json!(8)), Some("INTEGER"));
        assert_eq!(column_type(&json!(true)), Some("INTEGER"));
        assert_eq!(column_type(&json!(0.5)), Some("REAL"));
        assert_eq!(column_type(&json!("8")), Some("TEXT"));
        assert_eq!(column_type(&json!(["a"])), Some("TEXT"));
        assert_eq!(column_type(&Value::Null), None);
    }

    #[test]
    fn test_from_sql() {
        assert_eq!(from_sql_value(ValueRef::Integer(8)), json!(8));
        assert_eq!(from_sql_value(ValueRef::Text(b"Berkeley")), json!("Berkeley"));
        assert_eq!(from_sql_value(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(from_sql_value(ValueRef::Blob(b"hi")), json!("aGk="));
    }
}
