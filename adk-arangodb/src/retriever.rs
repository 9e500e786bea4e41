//! Keyword retrieval over a single collection.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{error, info};

use crate::document::Document;
use crate::error::{ArangoError, Result};
use crate::graph::{BindVars, GraphQueryExecutor, SYSTEM_ATTRIBUTES};

/// Returns documents whose content field contains the query as a substring.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::GraphRetriever;
///
/// let retriever = GraphRetriever::new(graph, "articles").with_limit(5);
/// let docs = retriever.retrieve("graph databases").await?;
/// ```
pub struct GraphRetriever {
    executor: Arc<dyn GraphQueryExecutor>,
    collection: String,
    content_field: String,
    limit: Option<usize>,
}

impl GraphRetriever {
    /// Search `collection`, matching against its `content` attribute.
    pub fn new(executor: Arc<dyn GraphQueryExecutor>, collection: impl Into<String>) -> Self {
        Self {
            executor,
            collection: collection.into(),
            content_field: "content".to_string(),
            limit: None,
        }
    }

    /// Match against a different attribute.
    pub fn with_content_field(mut self, field: impl Into<String>) -> Self {
        self.content_field = field.into();
        self
    }

    /// Return at most `limit` documents.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Find documents containing `query`, in the order the database returns them.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        if self.collection.is_empty() || self.content_field.is_empty() {
            return Err(ArangoError::Config(
                "retriever collection and content field must not be empty".to_string(),
            ));
        }

        let mut aql = String::from(
            "FOR doc IN @@collection\n  FILTER CONTAINS(doc[@field], @query)\n",
        );
        let mut bind_vars = BindVars::new();
        bind_vars.insert("@collection".into(), json!(self.collection));
        bind_vars.insert("field".into(), json!(self.content_field));
        bind_vars.insert("query".into(), json!(query));
        if let Some(limit) = self.limit {
            aql.push_str("  LIMIT @limit\n");
            bind_vars.insert("limit".into(), json!(limit));
        }
        aql.push_str("  RETURN doc");

        let rows = self.executor.execute(&aql, &bind_vars).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "retrieval failed");
            e
        })?;

        let documents: Vec<Document> = rows
            .into_iter()
            .map(|mut row| {
                let id = match row.get("_key") {
                    Some(Value::String(key)) => key.clone(),
                    _ => String::new(),
                };
                let text = match row.remove(&self.content_field) {
                    Some(Value::String(text)) => text,
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                row.retain(|key, _| !SYSTEM_ATTRIBUTES.contains(&key.as_str()));
                Document { id, text, metadata: row }
            })
            .collect();

        info!(collection = %self.collection, result_count = documents.len(), "retrieval completed");
        Ok(documents)
    }
}
