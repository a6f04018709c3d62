//! Query evaluation against cached records.
//!
//! This module provides the engine behind local filtering: it evaluates [`Expr`] trees
//! over JSON records, then applies sorting and pagination.

use serde_json::Value;
use std::{cmp::Ordering, collections::HashMap};

use crate::{
    error::{DataStoreError, DataStoreResult},
    query::{Expr, FieldOp, Query, QueryVisitor, SortDirection},
    record::Record,
};

/// Comparable representation of JSON values.
///
/// All numbers are normalized to f64 so integers and floats compare naturally.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => value
                .as_f64()
                .map(Comparable::Number)
                .unwrap_or(Comparable::Null),
            Value::String(value) => Comparable::String(value),
            Value::Array(items) => Comparable::Array(
                items
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(map) => Comparable::Map(
                map
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates filter expressions against a single record.
pub struct RecordEvaluator<'a> {
    record: &'a Record,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DataStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns whether `record` satisfies `expr`. Evaluation errors count as a mismatch.
    pub fn matches(record: &'a Record, expr: &Expr) -> bool {
        RecordEvaluator::new(record)
            .evaluate(expr)
            .unwrap_or(false)
    }
}

impl<'a> QueryVisitor for RecordEvaluator<'a> {
    type Output = bool;
    type Error = DataStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Value) -> Result<Self::Output, Self::Error> {
        let field_value = self.record.get(field).unwrap_or(&Value::Null);
        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => match left.partial_cmp(&right) {
                Some(ordering) => match op {
                    FieldOp::Gt => ordering == Ordering::Greater,
                    FieldOp::Gte => ordering != Ordering::Less,
                    FieldOp::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            },
            FieldOp::Contains => contains(&left, &right),
            FieldOp::NotContains => !contains(&left, &right),
            FieldOp::AnyOf => any_of(&left, &right),
            FieldOp::NoneOf => !any_of(&left, &right),
        })
    }
}

fn contains(left: &Comparable<'_>, right: &Comparable<'_>) -> bool {
    match (left, right) {
        (Comparable::Array(items), _) => items.iter().any(|item| item == right),
        (Comparable::String(haystack), Comparable::String(needle)) => haystack.contains(needle),
        _ => false,
    }
}

fn any_of(left: &Comparable<'_>, right: &Comparable<'_>) -> bool {
    match (left, right) {
        (Comparable::Array(items), Comparable::Array(values)) => values
            .iter()
            .any(|value| items.iter().any(|item| item == value)),
        (Comparable::Array(items), single) => items.iter().any(|item| item == single),
        (single, Comparable::Array(values)) => values.iter().any(|value| value == single),
        (Comparable::String(value), Comparable::String(candidates)) => candidates.contains(value),
        _ => false,
    }
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    let left = a.get(field).map(Comparable::from).unwrap_or(Comparable::Null);
    let right = b.get(field).map(Comparable::from).unwrap_or(Comparable::Null);

    left.partial_cmp(&right).unwrap_or(Ordering::Equal)
}

/// Runs `query` over `records`: filter, stable sort, then offset and limit.
pub fn execute_query<'a>(query: &Query, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
    let mut matched = records
        .into_iter()
        .filter(|record| match &query.filter {
            Some(filter) => RecordEvaluator::matches(record, filter),
            None => true,
        })
        .collect::<Vec<_>>();

    if !query.sort.is_empty() {
        matched.sort_by(|a, b| {
            query
                .sort
                .iter()
                .map(|sort| match sort.direction {
                    SortDirection::Asc => compare_field(a, b, &sort.field),
                    SortDirection::Desc => compare_field(b, a, &sort.field),
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    matched
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, params_from_value};
    use serde_json::json;

    fn posts() -> Vec<Record> {
        [
            json!({ "id": 5, "author": "John", "age": 30, "tags": ["a", "b"] }),
            json!({ "id": 6, "author": "Sally", "age": 31, "tags": ["b"] }),
            json!({ "id": 7, "author": "Mike", "age": 32, "tags": [] }),
            json!({ "id": 8, "author": "Adam", "age": 33 }),
            json!({ "id": 9, "author": "Adam", "age": 33.0 }),
        ]
        .into_iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect()
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    fn run(params: Value) -> Vec<i64> {
        let query = Query::from_params(&params_from_value(params).unwrap()).unwrap();
        ids(&execute_query(&query, &posts()))
    }

    #[test]
    fn filters_with_where_operators() {
        assert_eq!(run(json!({ "where": { "author": "Adam" } })), vec![8, 9]);
        assert_eq!(run(json!({ "where": { "id": { ">": 8 } } })), vec![9]);
        assert_eq!(run(json!({ "where": { "age": { ">=": 31, "<": 33 } } })), vec![6, 7]);
        assert_eq!(run(json!({ "where": { "author": { "in": ["John", "Mike"] } } })), vec![5, 7]);
        assert_eq!(run(json!({ "where": { "author": { "notIn": ["John", "Mike"] } } })), vec![6, 8, 9]);
        assert_eq!(run(json!({ "where": { "tags": { "contains": "b" } } })), vec![5, 6]);
        assert_eq!(run(json!({ "where": { "id": { "<": 6, "|>": 8 } } })), vec![5, 9]);
    }

    #[test]
    fn integers_equal_integral_floats() {
        assert_eq!(run(json!({ "age": 33 })), vec![8, 9]);
    }

    #[test]
    fn sorts_then_paginates() {
        assert_eq!(run(json!({ "orderBy": [["age", "DESC"], ["id", "ASC"]] })), vec![8, 9, 7, 6, 5]);
        assert_eq!(run(json!({ "orderBy": "age", "offset": 1, "limit": 2 })), vec![6, 7]);
    }

    #[test]
    fn missing_fields_never_match_comparisons() {
        let query = Query::builder().filter(Filter::gt("missing", 1)).build();

        assert!(execute_query(&query, &posts()).is_empty());
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        assert_eq!(ids(&execute_query(&Query::new(), &posts())), vec![5, 6, 7, 8, 9]);
    }
}
