//! Query construction, parsing and signatures.
//!
//! Callers describe the records they want with a *query descriptor*: a JSON object of
//! filter, sort and pagination parameters. The same descriptor is sent to the adapter on a
//! fetch and evaluated locally by [`filter`](crate::store::DataStore::filter) against cached
//! records. This module turns descriptors into a structured [`Query`] and computes the
//! [`QuerySignature`] used to recognize equivalent fetches.
//!
//! # Descriptor syntax
//!
//! ```json
//! {
//!   "where": { "age": { ">": 30, "|<": 10 }, "author": "Adam" },
//!   "orderBy": [["age", "DESC"], "author"],
//!   "offset": 10,
//!   "limit": 5,
//!   "published": true
//! }
//! ```
//!
//! - `where` maps a field to a value (equality) or to an object of operators: `==`, `===`,
//!   `!=`, `!==`, `>`, `>=`, `<`, `<=`, `in`, `notIn`, `contains`, `notContains`.
//!   An operator prefixed with `|` is OR-ed with the conditions before it; all others are
//!   AND-ed.
//! - `orderBy` (or `sort`) accepts `"field"`, `["field", "DESC"]` or a list of those.
//! - `offset` (or `skip`) and `limit` paginate the result.
//! - Every other top-level key is an equality condition.
//!
//! # Query Building
//!
//! Queries can also be built directly:
//!
//! ```ignore
//! use datastore::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("author", "Adam").and(Filter::gt("age", 30)))
//!     .limit(10)
//!     .sort("age", SortDirection::Desc)
//!     .build();
//! ```

use serde_json::{Map, Value};

use crate::error::{DataStoreError, DataStoreResult};

const RESERVED_KEYS: [&str; 6] = ["where", "orderBy", "sort", "limit", "offset", "skip"];

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9).
    Asc,
    /// Descending order (Z to A, 9 to 0).
    Desc,
}

impl SortDirection {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String or array contains value.
    Contains,
    /// String or array does not contain value.
    NotContains,
    /// Field value is one of the given values.
    AnyOf,
    /// Field value is none of the given values.
    NoneOf,
}

impl FieldOp {
    /// Parses a descriptor operator, returning whether it was `|`-prefixed.
    fn parse(op: &str) -> Option<(Self, bool)> {
        let (op, or) = match op.strip_prefix('|') {
            Some(rest) => (rest, true),
            None => (op, false),
        };

        let op = match op {
            "==" | "===" => FieldOp::Eq,
            "!=" | "!==" => FieldOp::Ne,
            ">" => FieldOp::Gt,
            ">=" => FieldOp::Gte,
            "<" => FieldOp::Lt,
            "<=" => FieldOp::Lte,
            "in" => FieldOp::AnyOf,
            "notIn" => FieldOp::NoneOf,
            "contains" => FieldOp::Contains,
            "notContains" => FieldOp::NotContains,
            _ => return None,
        };

        Some((op, or))
    }
}

/// A filter expression for querying records.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Value,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Value) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A structured query for filtering, sorting and paginating records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match records.
    pub filter: Option<Expr>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of records to skip.
    pub offset: Option<usize>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
}

impl Query {
    /// Creates a new empty query that matches everything.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Parses a query descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::IllegalArgument`] for malformed `where`, `orderBy`,
    /// `limit` or `offset` entries and for unknown operators.
    pub fn from_params(params: &Map<String, Value>) -> DataStoreResult<Self> {
        let mut filter: Option<Expr> = None;

        for (key, value) in params {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                push_condition(&mut filter, Filter::eq(key.as_str(), value.clone()), false);
            }
        }

        if let Some(clause) = params.get("where") {
            let clause = clause
                .as_object()
                .ok_or_else(|| DataStoreError::illegal_argument("params.where: Must be an object!"))?;

            for (field, condition) in clause {
                parse_field_condition(&mut filter, field, condition)?;
            }
        }

        let sort = match params.get("orderBy").or_else(|| params.get("sort")) {
            Some(value) => parse_sort(value)?,
            None => Vec::new(),
        };

        Ok(Query {
            filter,
            limit: parse_count(params, &["limit"])?,
            offset: parse_count(params, &["offset", "skip"])?,
            sort,
        })
    }
}

fn push_condition(filter: &mut Option<Expr>, expr: Expr, or: bool) {
    *filter = Some(match filter.take() {
        None => expr,
        Some(current) if or => current.or(expr),
        Some(current) => current.and(expr),
    });
}

fn is_operator_object(condition: &Map<String, Value>) -> bool {
    !condition.is_empty() && condition.keys().all(|key| FieldOp::parse(key).is_some())
}

fn parse_field_condition(filter: &mut Option<Expr>, field: &str, condition: &Value) -> DataStoreResult<()> {
    match condition {
        Value::Object(ops) if is_operator_object(ops) => {
            for (op, value) in ops {
                if let Some((op, or)) = FieldOp::parse(op) {
                    push_condition(filter, Expr::field(field.to_string(), op, value.clone()), or);
                }
            }

            Ok(())
        }
        Value::Object(ops) if ops.keys().any(|key| key.starts_with(['=', '!', '<', '>', '|'])) => {
            Err(DataStoreError::illegal_argument(format!(
                "params.where.{field}: Unknown operator!"
            )))
        }
        _ => {
            push_condition(filter, Filter::eq(field, condition.clone()), false);
            Ok(())
        }
    }
}

fn parse_sort_key(value: &Value) -> DataStoreResult<Sort> {
    match value {
        Value::String(field) => Ok(Sort { field: field.clone(), direction: SortDirection::Asc }),
        Value::Array(pair) => match pair.as_slice() {
            [Value::String(field)] => Ok(Sort { field: field.clone(), direction: SortDirection::Asc }),
            [Value::String(field), Value::String(direction)] => Ok(Sort {
                field: field.clone(),
                direction: SortDirection::parse(direction)
                    .ok_or_else(|| DataStoreError::illegal_argument("params.orderBy: Unknown direction!"))?,
            }),
            _ => Err(DataStoreError::illegal_argument("params.orderBy: Malformed sort key!")),
        },
        _ => Err(DataStoreError::illegal_argument("params.orderBy: Must be a string or an array!")),
    }
}

fn parse_sort(value: &Value) -> DataStoreResult<Vec<Sort>> {
    match value {
        Value::Array(items) => {
            // ["field", "DESC"] is a single key, not two fields
            if let [Value::String(_), Value::String(direction)] = items.as_slice() {
                if SortDirection::parse(direction).is_some() {
                    return Ok(vec![parse_sort_key(value)?]);
                }
            }

            items.iter().map(parse_sort_key).collect()
        }
        _ => Ok(vec![parse_sort_key(value)?]),
    }
}

fn parse_count(params: &Map<String, Value>, keys: &[&str]) -> DataStoreResult<Option<usize>> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|key| params.get(*key).map(|value| (key, value)))
    else {
        return Ok(None);
    };

    let count = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    };

    count
        .map(|count| Some(count as usize))
        .ok_or_else(|| DataStoreError::illegal_argument(format!("params.{key}: Must be a non-negative integer!")))
}

/// Helper struct for constructing filter expressions.
///
/// ```ignore
/// use datastore::query::Filter;
///
/// let expr = Filter::eq("author", "Adam").and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches records where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches records where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches records where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches records where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches records where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches records where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches records where the field (string or array) contains the value.
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    /// Matches records where the field (string or array) does not contain the value.
    pub fn not_contains(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    /// Matches records where the field is any of the values.
    pub fn any_of(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    /// Matches records where the field is none of the values.
    pub fn none_of(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }

    /// Combines expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions such that any may match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key. Earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DataStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Value,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Canonical identity of a query descriptor.
///
/// Two descriptors with the same content have the same signature regardless of key
/// order. The store keys in-flight and completed fetches by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuerySignature(String);

impl QuerySignature {
    pub fn of(params: &Map<String, Value>) -> Self {
        QuerySignature(canonicalize(&Value::Object(params.clone())).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();

            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonicalize(&map[key])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        _ => value.clone(),
    }
}

/// Validates a raw query descriptor. `null` is the empty descriptor.
///
/// # Errors
///
/// Returns [`DataStoreError::IllegalArgument`] for anything but an object or `null`.
pub fn params_from_value(value: Value) -> DataStoreResult<Map<String, Value>> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        _ => Err(DataStoreError::illegal_argument("params: Must be an object!")),
    }
}
