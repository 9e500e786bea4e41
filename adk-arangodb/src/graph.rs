//! Query executor boundary for the graph database.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// A single result row: field name → dynamically typed value, in the order
/// the database returned the fields.
pub type Row = Map<String, Value>;

/// Bind variables for a query. Keys starting with `@` bind collection names.
pub type BindVars = Map<String, Value>;

/// Executes AQL queries against a graph database.
///
/// Implementations own the connection; callers thread the executor through
/// explicitly (usually as `Arc<dyn GraphQueryExecutor>`), so tests can swap in
/// [`MockGraphExecutor`](crate::mock::MockGraphExecutor).
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::{BindVars, GraphQueryExecutor};
///
/// let mut bind_vars = BindVars::new();
/// bind_vars.insert("name".into(), "Alice".into());
/// let rows = executor
///     .execute("FOR p IN people FILTER p.name == @name RETURN p", &bind_vars)
///     .await?;
/// ```
#[async_trait]
pub trait GraphQueryExecutor: Send + Sync {
    /// Run a query and return every row of its result, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Execution`](crate::ArangoError::Execution)
    /// carrying the original cause.
    async fn execute(&self, query: &str, bind_vars: &BindVars) -> Result<Vec<Row>>;

    /// Release the underlying connection. The default does nothing.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Turn a raw query result value into a [`Row`].
///
/// Objects are kept as they are; any other value (for example the result of
/// `RETURN doc.name`) becomes `{"value": v}`.
pub fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

/// Document attributes maintained by the database itself.
pub(crate) const SYSTEM_ATTRIBUTES: &[&str] = &["_key", "_id", "_rev", "_from", "_to"];
