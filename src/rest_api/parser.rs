//! # Query Parameter Parser
//!
//! Parses read query arguments into a table selection. Reserved arguments
//! start with an underscore; every other argument is a filter.

use rusqlite::types::Value as SqlValue;

use crate::store::{Selection, SortDirection};

use super::errors::{RestError, RestResult};
use super::filter::{FilterExpr, FilterOperator, FilterSet, OPERATOR_SEPARATOR};
use super::format::FORMAT_PARAM;

pub const LIMIT_PARAM: &str = "_limit";
pub const OFFSET_PARAM: &str = "_offset";
pub const SORT_PARAM: &str = "_sort";

/// Parsed query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Filter expressions, combined with AND
    pub filters: FilterSet,

    /// Order by clauses, in argument order
    pub order: Vec<OrderBy>,

    /// Number of records to return (None = all)
    pub limit: Option<i64>,

    /// Number of records to skip
    pub offset: Option<i64>,
}

/// Order by clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

impl QueryParams {
    /// Parse query arguments against the table's current columns.
    ///
    /// Pagination is checked first, then sorting, then filters, so the first
    /// reported error follows that order.
    pub fn parse(params: &[(String, String)], columns: &[String]) -> RestResult<Self> {
        let limit = parse_pagination(first_value(params, LIMIT_PARAM))?;
        let offset = parse_pagination(first_value(params, OFFSET_PARAM))?;

        let order = params
            .iter()
            .filter(|(key, _)| key == SORT_PARAM)
            .map(|(_, value)| parse_order(value, columns))
            .collect::<RestResult<Vec<_>>>()?;

        let mut filters = FilterSet::new();
        for (key, value) in params {
            if is_reserved(key) {
                continue;
            }
            filters.push(parse_filter(key, value, columns)?);
        }

        Ok(QueryParams {
            filters,
            order,
            limit,
            offset,
        })
    }

    /// Convert into a store selection
    pub fn to_selection(&self) -> Selection {
        let (predicate, params): (Option<String>, Vec<SqlValue>) = match self.filters.to_sql() {
            Some((sql, params)) => (Some(sql), params),
            None => (None, Vec::new()),
        };

        Selection {
            predicate,
            params,
            order_by: self
                .order
                .iter()
                .map(|o| {
                    let direction = if o.ascending {
                        SortDirection::Ascending
                    } else {
                        SortDirection::Descending
                    };
                    (o.field.clone(), direction)
                })
                .collect(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(key, LIMIT_PARAM | OFFSET_PARAM | SORT_PARAM | FORMAT_PARAM)
}

fn first_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Parse `_limit`/`_offset`; an empty value counts as absent
fn parse_pagination(value: Option<&str>) -> RestResult<Option<i64>> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 0 => Ok(Some(n)),
            _ => Err(RestError::InvalidPagination(raw.to_string())),
        },
    }
}

/// Parse a `direction:column` sort value
fn parse_order(value: &str, columns: &[String]) -> RestResult<OrderBy> {
    let (direction, field) = value
        .split_once(':')
        .ok_or_else(|| RestError::InvalidSortFormat(value.to_string()))?;

    if !columns.iter().any(|c| c == field) {
        return Err(RestError::InvalidSortColumn(field.to_string()));
    }

    // Anything other than desc sorts ascending
    let ascending = !direction.eq_ignore_ascii_case("desc");

    Ok(OrderBy {
        field: field.to_string(),
        ascending,
    })
}

/// Parse a filter argument. A key naming an existing column is equality;
/// otherwise the key may carry an operator suffix.
fn parse_filter(key: &str, value: &str, columns: &[String]) -> RestResult<FilterExpr> {
    if columns.iter().any(|c| c == key) {
        return Ok(FilterExpr::equals(key, value));
    }

    if let Some((field, suffix)) = key.rsplit_once(OPERATOR_SEPARATOR) {
        if let Some(operator) = FilterOperator::from_suffix(suffix) {
            if columns.iter().any(|c| c == field) {
                return Ok(FilterExpr::parse(field, operator, value));
            }
            return Err(RestError::InvalidFilter(field.to_string()));
        }
    }

    Err(RestError::InvalidFilter(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        ["__id__", "date", "temperature", "place"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_pagination() {
        let query = QueryParams::parse(&params(&[("_limit", "2"), ("_offset", "2")]), &columns())
            .unwrap();
        assert_eq!(query.limit, Some(2));
        assert_eq!(query.offset, Some(2));

        let query = QueryParams::parse(&params(&[("_limit", "")]), &columns()).unwrap();
        assert_eq!(query.limit, None);
    }

    #[test]
    fn test_invalid_pagination_names_value() {
        let err = QueryParams::parse(&params(&[("_limit", "BANANA")]), &columns()).unwrap_err();
        assert!(matches!(err, RestError::InvalidPagination(ref v) if v == "BANANA"));

        let err = QueryParams::parse(&params(&[("_offset", "-1")]), &columns()).unwrap_err();
        assert!(matches!(err, RestError::InvalidPagination(_)));
    }

    #[test]
    fn test_parse_sort() {
        let query = QueryParams::parse(
            &params(&[("_sort", "desc:temperature"), ("_sort", "sideways:place")]),
            &columns(),
        )
        .unwrap();
        assert_eq!(
            query.order,
            vec![
                OrderBy {
                    field: "temperature".into(),
                    ascending: false
                },
                OrderBy {
                    field: "place".into(),
                    ascending: true
                },
            ]
        );
    }

    #[test]
    fn test_sort_errors() {
        let err = QueryParams::parse(&params(&[("_sort", "theotherway")]), &columns()).unwrap_err();
        assert!(matches!(err, RestError::InvalidSortFormat(_)));

        let err = QueryParams::parse(&params(&[("_sort", "asc:altitude")]), &columns()).unwrap_err();
        assert!(matches!(err, RestError::InvalidSortColumn(ref c) if c == "altitude"));
    }

    #[test]
    fn test_pagination_checked_before_filters() {
        let err = QueryParams::parse(
            &params(&[("nope", "1"), ("_limit", "BANANA")]),
            &columns(),
        )
        .unwrap_err();
        assert!(matches!(err, RestError::InvalidPagination(_)));
    }

    #[test]
    fn test_parse_filters() {
        let query = QueryParams::parse(
            &params(&[("place", "Galway"), ("temperature__gte", "0"), ("_format", "csv")]),
            &columns(),
        )
        .unwrap();
        assert_eq!(query.filters.filters.len(), 2);
        assert_eq!(query.filters.filters[1].operator, FilterOperator::Gte);

        let selection = query.to_selection();
        assert_eq!(
            selection.predicate.as_deref(),
            Some("\"place\" = ? AND CAST(\"temperature\" AS NUMERIC) >= ?")
        );
        assert_eq!(selection.params.len(), 2);
    }

    #[test]
    fn test_unknown_filter_column() {
        let err = QueryParams::parse(&params(&[("altitude", "3")]), &columns()).unwrap_err();
        assert!(matches!(err, RestError::InvalidFilter(ref c) if c == "altitude"));

        let err = QueryParams::parse(&params(&[("altitude__gt", "3")]), &columns()).unwrap_err();
        assert!(matches!(err, RestError::InvalidFilter(ref c) if c == "altitude"));
    }

    #[test]
    fn test_column_with_separator_is_equality() {
        let mut cols = columns();
        cols.push("min__gt".to_string());

        let query = QueryParams::parse(&params(&[("min__gt", "4")]), &cols).unwrap();
        assert_eq!(query.filters.filters[0], FilterExpr::equals("min__gt", "4"));
    }
}
