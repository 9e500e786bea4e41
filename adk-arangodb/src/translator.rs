//! Translation of [`FilterExpression`] trees into AQL predicates.
//!
//! The output of [`AqlTranslator::translate`] is a single string that can be
//! embedded as-is into a `FILTER` clause:
//!
//! ```text
//! (doc.genre == "drama" AND doc.year >= 1990)
//! ```

use std::collections::HashMap;

use crate::error::{ArangoError, Result};
use crate::filter::{Comparator, FilterExpression, FilterValue, Operator, StructuredQuery};

/// Comparators the AQL translator accepts.
pub const ALLOWED_COMPARATORS: &[Comparator] = &[
    Comparator::Eq,
    Comparator::Ne,
    Comparator::Gte,
    Comparator::Lte,
    Comparator::Lt,
    Comparator::Gt,
];

/// Operators the AQL translator accepts.
pub const ALLOWED_OPERATORS: &[Operator] = &[Operator::And, Operator::Or];

/// Default document variable the predicate refers to.
pub const DEFAULT_DOCUMENT_ALIAS: &str = "doc";

/// Translates structured filters into AQL `FILTER` predicates.
#[derive(Debug, Clone)]
pub struct AqlTranslator {
    alias: String,
}

impl Default for AqlTranslator {
    fn default() -> Self {
        Self { alias: DEFAULT_DOCUMENT_ALIAS.to_string() }
    }
}

impl AqlTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different document variable than `doc`.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if `alias` is not a plain AQL
    /// identifier.
    pub fn with_document_alias(alias: impl Into<String>) -> Result<Self> {
        let alias = alias.into();
        let mut chars = alias.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ArangoError::Validation(format!("invalid document alias '{alias}'")));
        }
        Ok(Self { alias })
    }

    pub fn document_alias(&self) -> &str {
        &self.alias
    }

    /// Check every comparator and operator of the tree against the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] naming the first disallowed token
    /// in depth-first order.
    pub fn validate(&self, expr: &FilterExpression) -> Result<()> {
        match expr {
            FilterExpression::Comparison(c) => {
                if !ALLOWED_COMPARATORS.contains(&c.comparator()) {
                    return Err(ArangoError::Validation(format!(
                        "comparator '{}' is not allowed in AQL filters (attribute '{}')",
                        c.comparator(),
                        c.attribute()
                    )));
                }
                Ok(())
            }
            FilterExpression::Operation(op) => {
                if !ALLOWED_OPERATORS.contains(&op.operator()) {
                    return Err(ArangoError::Validation(format!(
                        "operator '{}' is not allowed in AQL filters",
                        op.operator()
                    )));
                }
                op.operands().iter().try_for_each(|operand| self.validate(operand))
            }
        }
    }

    /// Render a filter tree as an AQL predicate.
    ///
    /// The tree is validated in full before anything is rendered, so an
    /// error never comes with partial output.
    pub fn translate(&self, expr: &FilterExpression) -> Result<String> {
        self.validate(expr)?;
        let mut out = String::new();
        self.render(expr, &mut out)?;
        Ok(out)
    }

    /// Split a structured query into its query text and translator options.
    ///
    /// The options map holds a `filter` entry only when the query carries a
    /// filter; a query without one yields an empty map.
    pub fn translate_query(
        &self,
        query: &StructuredQuery,
    ) -> Result<(String, HashMap<String, String>)> {
        let mut options = HashMap::new();
        if let Some(filter) = query.filter() {
            options.insert("filter".to_string(), self.translate(filter)?);
        }
        Ok((query.query().to_string(), options))
    }

    fn render(&self, expr: &FilterExpression, out: &mut String) -> Result<()> {
        match expr {
            FilterExpression::Comparison(c) => {
                out.push_str(&self.alias);
                out.push('.');
                out.push_str(c.attribute());
                out.push(' ');
                out.push_str(comparator_symbol(c.comparator())?);
                out.push(' ');
                out.push_str(&format_literal(c.value())?);
            }
            FilterExpression::Operation(op) => {
                let symbol = operator_symbol(op.operator())?;
                out.push('(');
                for (i, operand) in op.operands().iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(symbol);
                        out.push(' ');
                    }
                    self.render(operand, out)?;
                }
                out.push(')');
            }
        }
        Ok(())
    }
}

fn comparator_symbol(comparator: Comparator) -> Result<&'static str> {
    match comparator {
        Comparator::Eq => Ok("=="),
        Comparator::Ne => Ok("!="),
        Comparator::Gte => Ok(">="),
        Comparator::Lte => Ok("<="),
        Comparator::Lt => Ok("<"),
        Comparator::Gt => Ok(">"),
        other => Err(ArangoError::Validation(format!("comparator '{other}' has no AQL symbol"))),
    }
}

fn operator_symbol(operator: Operator) -> Result<&'static str> {
    match operator {
        Operator::And => Ok("AND"),
        Operator::Or => Ok("OR"),
        other => Err(ArangoError::Validation(format!("operator '{other}' has no AQL symbol"))),
    }
}

fn format_literal(value: &FilterValue) -> Result<String> {
    match value {
        // JSON string literals are valid AQL string literals
        FilterValue::String(s) => Ok(serde_json::to_string(s)?),
        FilterValue::Integer(i) => Ok(i.to_string()),
        FilterValue::Float(f) => Ok(f.to_string()),
        FilterValue::Bool(b) => Ok(b.to_string()),
    }
}
