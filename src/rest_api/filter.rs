//! # Filter Expressions
//!
//! Per-column predicates built from query arguments, rendered as SQL with
//! positional parameters.
//!
//! A plain `column=value` argument is an equality test against the value as
//! sent. Other operators use a key suffix: `temperature__gt=5`.

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{quote_ident, to_sql_value};

/// Separator between a column name and an operator suffix
pub const OPERATOR_SEPARATOR: &str = "__";

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Equals
    #[serde(rename = "eq")]
    Eq,

    /// Not equals
    #[serde(rename = "ne")]
    Ne,

    /// Greater than
    #[serde(rename = "gt")]
    Gt,

    /// Greater than or equal
    #[serde(rename = "gte")]
    Gte,

    /// Less than
    #[serde(rename = "lt")]
    Lt,

    /// Less than or equal
    #[serde(rename = "lte")]
    Lte,

    /// Pattern match (LIKE)
    #[serde(rename = "like")]
    Like,

    /// Value in comma-separated list
    #[serde(rename = "in")]
    In,
}

impl FilterOperator {
    /// Operator for a key suffix; equality has no suffix
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "ne" => Some(FilterOperator::Ne),
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            "like" => Some(FilterOperator::Like),
            "in" => Some(FilterOperator::In),
            _ => None,
        }
    }

    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::In => "in",
        }
    }

    fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte
        )
    }

    fn sql_operator(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::In => "IN",
        }
    }
}

/// A filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Column to filter on
    pub field: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    /// Create a new filter expression
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter; the value is compared as sent
    pub fn equals(field: impl Into<String>, value: &str) -> Self {
        Self::new(field, FilterOperator::Eq, Value::String(value.to_string()))
    }

    /// Create a filter from a query argument value, coercing it for the
    /// operator: numeric literals become numbers for range comparisons and
    /// `in` splits on commas.
    pub fn parse(field: impl Into<String>, operator: FilterOperator, raw: &str) -> Self {
        let value = match operator {
            FilterOperator::In => Value::Array(
                raw.split(',')
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            ),
            op if op.is_range() => coerce_number(raw),
            _ => Value::String(raw.to_string()),
        };
        Self::new(field, operator, value)
    }

    /// Render as SQL, appending bound values to `params`
    pub fn to_sql(&self, params: &mut Vec<SqlValue>) -> String {
        let column = quote_ident(&self.field);
        match (&self.operator, &self.value) {
            (FilterOperator::In, Value::Array(items)) => {
                params.extend(items.iter().map(to_sql_value));
                let placeholders = vec!["?"; items.len()].join(", ");
                format!("{} IN ({})", column, placeholders)
            }
            (op, Value::Number(_)) if op.is_range() => {
                params.push(to_sql_value(&self.value));
                format!("CAST({} AS NUMERIC) {} ?", column, op.sql_operator())
            }
            (op, value) => {
                params.push(to_sql_value(value));
                format!("{} {} ?", column, op.sql_operator())
            }
        }
    }
}

fn coerce_number(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Value::String(raw.to_string()), Value::Number)
}

/// A set of filters combined with AND logic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub filters: Vec<FilterExpr>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: FilterExpr) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Render the conjunction, or `None` when there are no filters
    pub fn to_sql(&self) -> Option<(String, Vec<SqlValue>)> {
        if self.filters.is_empty() {
            return None;
        }
        let mut params = Vec::new();
        let clauses: Vec<String> = self.filters.iter().map(|f| f.to_sql(&mut params)).collect();
        Some((clauses.join(" AND "), params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eq_filter_is_not_coerced() {
        let filter = FilterExpr::equals("temperature", "8");
        let mut params = Vec::new();

        assert_eq!(filter.to_sql(&mut params), "\"temperature\" = ?");
        assert_eq!(params, vec![SqlValue::Text("8".into())]);
    }

    #[test]
    fn test_gt_filter_coerces_numbers() {
        let filter = FilterExpr::parse("temperature", FilterOperator::Gt, "5");
        assert_eq!(filter.value, json!(5));

        let mut params = Vec::new();
        assert_eq!(
            filter.to_sql(&mut params),
            "CAST(\"temperature\" AS NUMERIC) > ?"
        );
        assert_eq!(params, vec![SqlValue::Integer(5)]);
    }

    #[test]
    fn test_range_on_text_compares_text() {
        let filter = FilterExpr::parse("date", FilterOperator::Gte, "2011-01-02");
        let mut params = Vec::new();

        assert_eq!(filter.to_sql(&mut params), "\"date\" >= ?");
        assert_eq!(params, vec![SqlValue::Text("2011-01-02".into())]);
    }

    #[test]
    fn test_in_filter() {
        let filter = FilterExpr::parse("place", FilterOperator::In, "Galway,Berkeley");
        let mut params = Vec::new();

        assert_eq!(filter.to_sql(&mut params), "\"place\" IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_filter_set() {
        let filters = FilterSet::new()
            .and(FilterExpr::equals("place", "Galway"))
            .and(FilterExpr::parse("temperature", FilterOperator::Lt, "1"));

        let (sql, params) = filters.to_sql().unwrap();
        assert_eq!(
            sql,
            "\"place\" = ? AND CAST(\"temperature\" AS NUMERIC) < ?"
        );
        assert_eq!(params.len(), 2);
        assert!(FilterSet::new().to_sql().is_none());
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(FilterOperator::from_suffix("gte"), Some(FilterOperator::Gte));
        assert_eq!(FilterOperator::from_suffix("id"), None);
    }
}
