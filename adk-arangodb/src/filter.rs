//! Structured filter expressions.
//!
//! A [`FilterExpression`] is a small boolean AST over attribute comparisons,
//! produced by an upstream query-understanding step and consumed by the
//! [`AqlTranslator`](crate::translator::AqlTranslator) and the in-memory
//! vector index. Trees are validated when they are built and are immutable
//! afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_arangodb::filter::{Comparator, FilterExpression, Operator};
//!
//! let filter = FilterExpression::operation(
//!     Operator::And,
//!     vec![
//!         FilterExpression::comparison("genre", Comparator::Eq, "drama")?,
//!         FilterExpression::comparison("year", Comparator::Gte, 1990)?,
//!     ],
//! )?;
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ArangoError, Result};

static ATTRIBUTE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("attribute path pattern is valid")
});

/// Comparison operators of the structured-query vocabulary.
///
/// Not every backend supports every comparator; translators keep their own
/// allow-list and reject the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contain,
    Like,
    In,
    Nin,
}

impl Comparator {
    /// The lowercase token used in structured queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Contain => "contain",
            Comparator::Like => "like",
            Comparator::In => "in",
            Comparator::Nin => "nin",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = ArangoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Comparator::Eq),
            "ne" => Ok(Comparator::Ne),
            "gt" => Ok(Comparator::Gt),
            "gte" => Ok(Comparator::Gte),
            "lt" => Ok(Comparator::Lt),
            "lte" => Ok(Comparator::Lte),
            "contain" => Ok(Comparator::Contain),
            "like" => Ok(Comparator::Like),
            "in" => Ok(Comparator::In),
            "nin" => Ok(Comparator::Nin),
            _ => Err(ArangoError::Validation(format!("unknown comparator '{s}'"))),
        }
    }
}

/// Logical operators of the structured-query vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    /// The lowercase token used in structured queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ArangoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            "not" => Ok(Operator::Not),
            _ => Err(ArangoError::Validation(format!("unknown operator '{s}'"))),
        }
    }
}

/// The right-hand side of a [`Comparison`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl FilterValue {
    fn to_json(&self) -> Value {
        match self {
            FilterValue::String(s) => Value::String(s.clone()),
            FilterValue::Integer(i) => Value::from(*i),
            FilterValue::Float(f) => Value::from(*f),
            FilterValue::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// `attribute <comparator> value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    attribute: String,
    comparator: Comparator,
    value: FilterValue,
}

impl Comparison {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }
}

/// An operator applied to an ordered list of operands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    operator: Operator,
    operands: Vec<FilterExpression>,
}

impl Operation {
    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operands(&self) -> &[FilterExpression] {
        &self.operands
    }
}

/// A filter expression tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterExpression {
    Comparison(Comparison),
    Operation(Operation),
}

impl FilterExpression {
    /// Build a comparison leaf.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if `attribute` is not a dotted
    /// identifier path (`a`, `a.b_c`) or `value` is a non-finite float.
    pub fn comparison(
        attribute: impl Into<String>,
        comparator: Comparator,
        value: impl Into<FilterValue>,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if !ATTRIBUTE_PATH.is_match(&attribute) {
            return Err(ArangoError::Validation(format!(
                "invalid filter attribute '{attribute}'"
            )));
        }
        let value = value.into();
        if let FilterValue::Float(f) = value {
            if !f.is_finite() {
                return Err(ArangoError::Validation(format!(
                    "non-finite value {f} for filter attribute '{attribute}'"
                )));
            }
        }
        Ok(FilterExpression::Comparison(Comparison { attribute, comparator, value }))
    }

    /// Build an operation node from its operands, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if `operands` is empty, or if a
    /// `not` operation does not have exactly one operand.
    pub fn operation(operator: Operator, operands: Vec<FilterExpression>) -> Result<Self> {
        if operands.is_empty() {
            return Err(ArangoError::Validation(format!(
                "operator '{operator}' requires at least one operand"
            )));
        }
        if operator == Operator::Not && operands.len() != 1 {
            return Err(ArangoError::Validation(format!(
                "operator 'not' takes exactly one operand, got {}",
                operands.len()
            )));
        }
        Ok(FilterExpression::Operation(Operation { operator, operands }))
    }

    /// Evaluate the expression against a metadata map using AQL comparison
    /// semantics.
    ///
    /// Missing attributes compare as `null`. Values of different types are
    /// ordered `null < bool < number < string < array < object`.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] for comparators and operators that
    /// have no evaluation rule (`contain`, `like`, `in`, `nin`, `not`).
    pub fn evaluate(&self, metadata: &Map<String, Value>) -> Result<bool> {
        match self {
            FilterExpression::Comparison(c) => {
                let actual = lookup(metadata, &c.attribute).unwrap_or(&Value::Null);
                let expected = c.value.to_json();
                let ordering = aql_compare(actual, &expected);
                match c.comparator {
                    Comparator::Eq => Ok(ordering == Ordering::Equal),
                    Comparator::Ne => Ok(ordering != Ordering::Equal),
                    Comparator::Gt => Ok(ordering == Ordering::Greater),
                    Comparator::Gte => Ok(ordering != Ordering::Less),
                    Comparator::Lt => Ok(ordering == Ordering::Less),
                    Comparator::Lte => Ok(ordering != Ordering::Greater),
                    other => Err(ArangoError::Validation(format!(
                        "comparator '{other}' cannot be evaluated"
                    ))),
                }
            }
            FilterExpression::Operation(op) => match op.operator {
                Operator::And => {
                    for operand in &op.operands {
                        if !operand.evaluate(metadata)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Operator::Or => {
                    for operand in &op.operands {
                        if operand.evaluate(metadata)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Operator::Not => Err(ArangoError::Validation(
                    "operator 'not' cannot be evaluated".to_string(),
                )),
            },
        }
    }
}

fn lookup<'a>(metadata: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = metadata.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values as AQL defines it for scalar comparisons.
fn aql_compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = aql_compare(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// A query string paired with an optional filter, as produced by a
/// query-understanding step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredQuery {
    query: String,
    filter: Option<FilterExpression>,
}

impl StructuredQuery {
    pub fn new(query: impl Into<String>, filter: Option<FilterExpression>) -> Self {
        Self { query: query.into(), filter }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter(&self) -> Option<&FilterExpression> {
        self.filter.as_ref()
    }
}
