//! Vector index that runs its searches as AQL inside ArangoDB.
//!
//! Documents are stored as `{_key, <text_field>, <embedding_field>, ...metadata}`
//! in one collection. Scoring uses ArangoDB's `COSINE_SIMILARITY` and
//! `L2_DISTANCE` functions, or a summed element-wise product for dot product,
//! so the index needs no server-side vector index and scans the collection.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::VectorStoreConfig;
use crate::distance::DistanceStrategy;
use crate::document::VectorDocument;
use crate::error::{ArangoError, Result};
use crate::filter::FilterExpression;
use crate::graph::{BindVars, GraphQueryExecutor, Row, SYSTEM_ATTRIBUTES};
use crate::translator::AqlTranslator;
use crate::vectorstore::{VectorIndex, VectorMatch};

const BACKEND: &str = "arangodb";

/// A [`VectorIndex`] over an ArangoDB collection.
///
/// Collection and field names are always passed as bind variables; only the
/// translated filter predicate is spliced into the query text.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use adk_arangodb::{AqlVectorIndex, VectorStoreConfig};
///
/// let config = VectorStoreConfig::builder().collection_name("chunks").build()?;
/// let index = AqlVectorIndex::new(Arc::new(graph), config);
/// ```
pub struct AqlVectorIndex {
    executor: Arc<dyn GraphQueryExecutor>,
    config: VectorStoreConfig,
    translator: AqlTranslator,
}

impl AqlVectorIndex {
    /// Create an index over `config.collection_name`.
    pub fn new(executor: Arc<dyn GraphQueryExecutor>, config: VectorStoreConfig) -> Self {
        Self { executor, config, translator: AqlTranslator::new() }
    }

    /// The collection and field configuration.
    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    fn base_bind_vars(&self) -> BindVars {
        let mut bind_vars = BindVars::new();
        bind_vars.insert("@collection".into(), json!(self.config.collection_name));
        bind_vars
    }

    /// Render the search query for the configured strategy.
    fn search_query(&self, filter: Option<&str>, include_embeddings: bool) -> String {
        let score = match self.config.distance_strategy {
            DistanceStrategy::Cosine => {
                "COSINE_SIMILARITY(doc[@embedding_field], @query_embedding)"
            }
            DistanceStrategy::EuclideanDistance => {
                "L2_DISTANCE(doc[@embedding_field], @query_embedding)"
            }
            DistanceStrategy::DotProduct => {
                "SUM(FOR i IN 0..LENGTH(@query_embedding)-1 RETURN doc[@embedding_field][i] * @query_embedding[i])"
            }
        };
        let order = if self.config.distance_strategy.lower_is_closer() { "ASC" } else { "DESC" };
        let document = if include_embeddings {
            "UNSET(doc, \"_id\", \"_rev\")"
        } else {
            "UNSET(doc, \"_id\", \"_rev\", @embedding_field)"
        };

        let mut query = String::from("FOR doc IN @@collection\n");
        if let Some(predicate) = filter {
            query.push_str(&format!("  FILTER {predicate}\n"));
        }
        query.push_str(&format!("  LET score = {score}\n"));
        query.push_str(&format!("  SORT score {order}\n"));
        query.push_str("  LIMIT @k\n");
        query.push_str(&format!("  RETURN {{ document: {document}, score: score }}"));
        query
    }

    fn to_stored(&self, doc: &VectorDocument) -> Value {
        let mut stored: Map<String, Value> = doc
            .metadata
            .iter()
            .filter(|(key, _)| !SYSTEM_ATTRIBUTES.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        stored.insert("_key".into(), json!(doc.id));
        stored.insert(self.config.text_field.clone(), json!(doc.text));
        stored.insert(self.config.embedding_field.clone(), json!(doc.embedding));
        Value::Object(stored)
    }

    fn parse_row(&self, mut row: Row) -> Result<VectorMatch> {
        let score = row.get("score").and_then(Value::as_f64).ok_or_else(|| {
            self.malformed("search result has no numeric 'score'".to_string())
        })?;
        let mut stored = match row.remove("document") {
            Some(Value::Object(map)) => map,
            _ => return Err(self.malformed("search result has no 'document' object".to_string())),
        };

        let id = match stored.remove("_key") {
            Some(Value::String(key)) => key,
            _ => return Err(self.malformed("stored document has no '_key'".to_string())),
        };
        let text = match stored.remove(&self.config.text_field) {
            Some(Value::String(text)) => text,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let embedding = match stored.remove(&self.config.embedding_field) {
            Some(value) => parse_embedding(value)
                .ok_or_else(|| self.malformed(format!("document '{id}' has a non-numeric embedding")))?,
            None => Vec::new(),
        };
        stored.retain(|key, _| !SYSTEM_ATTRIBUTES.contains(&key.as_str()));

        Ok(VectorMatch { document: VectorDocument { id, text, embedding, metadata: stored }, score })
    }

    fn malformed(&self, message: String) -> ArangoError {
        ArangoError::VectorStore { backend: BACKEND.to_string(), message }
    }
}

fn parse_embedding(value: Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect(),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

#[async_trait]
impl VectorIndex for AqlVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn distance_strategy(&self) -> DistanceStrategy {
        self.config.distance_strategy
    }

    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut bind_vars = self.base_bind_vars();
        bind_vars.insert(
            "docs".into(),
            Value::Array(documents.iter().map(|doc| self.to_stored(doc)).collect()),
        );
        self.executor
            .execute(
                "FOR d IN @docs INSERT d INTO @@collection OPTIONS { overwriteMode: \"replace\" }",
                &bind_vars,
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut bind_vars = self.base_bind_vars();
        bind_vars.insert("keys".into(), json!(ids));
        self.executor
            .execute(
                "FOR key IN @keys REMOVE { _key: key } IN @@collection OPTIONS { ignoreErrors: true }",
                &bind_vars,
            )
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterExpression>,
        include_embeddings: bool,
    ) -> Result<Vec<VectorMatch>> {
        let predicate = filter.map(|f| self.translator.translate(f)).transpose()?;
        let query = self.search_query(predicate.as_deref(), include_embeddings);

        let mut bind_vars = self.base_bind_vars();
        bind_vars.insert("embedding_field".into(), json!(self.config.embedding_field));
        bind_vars.insert("query_embedding".into(), json!(embedding));
        bind_vars.insert("k".into(), json!(k));
        debug!(query = %query, k, "vector search");

        let rows = self.executor.execute(&query, &bind_vars).await?;
        rows.into_iter().map(|row| self.parse_row(row)).collect()
    }

    async fn count(&self) -> Result<usize> {
        let rows =
            self.executor.execute("RETURN LENGTH(@@collection)", &self.base_bind_vars()).await?;
        rows.first()
            .and_then(|row| row.get("value"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| self.malformed("count query returned no number".to_string()))
    }
}
