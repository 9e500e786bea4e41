//! Writing extracted knowledge graphs into ArangoDB collections.
//!
//! Each node type becomes a document collection and each relationship type
//! an edge collection. All writes replace existing documents with the same
//! `_key`, so ingesting the same graph twice leaves one copy.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::document::content_id;
use crate::error::{ArangoError, Result};
use crate::graph::{BindVars, GraphQueryExecutor, SYSTEM_ATTRIBUTES};

/// Collection holding source documents when
/// [`IngestOptions::include_source`] is set.
pub const SOURCE_COLLECTION: &str = "Document";

static COLLECTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_\-]{0,255}$").expect("collection name pattern is valid")
});

const INSERT_QUERY: &str =
    "FOR d IN @docs INSERT d INTO @@collection OPTIONS { overwriteMode: \"replace\" }";

/// A graph vertex. Stored in the collection named by `node_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self { id: id.into(), node_type: node_type.into(), properties: Map::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The `_id` this node gets in the database: `<type>/<id>`.
    pub fn document_id(&self) -> String {
        format!("{}/{}", self.node_type, self.id)
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphRelationship {
    pub source: GraphNode,
    pub target: GraphNode,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphRelationship {
    pub fn new(source: GraphNode, target: GraphNode, rel_type: impl Into<String>) -> Self {
        Self { source, target, rel_type: rel_type.into(), properties: Map::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Edge collection name: the type with spaces replaced by underscores,
    /// lowercased. `"WORKED ON"` becomes `worked_on`.
    pub fn collection(&self) -> String {
        self.rel_type.replace(' ', "_").to_lowercase()
    }

    /// Deterministic edge key over type and endpoints.
    pub fn edge_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.rel_type.as_bytes());
        hasher.update([0]);
        hasher.update(self.source.document_id().as_bytes());
        hasher.update([0]);
        hasher.update(self.target.document_id().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// The text a graph was extracted from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    pub text: String,
    /// Stored next to the text. An `id` entry becomes the document key.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Map::new() }
    }

    /// The `id` metadata entry if it is a non-empty string, otherwise the
    /// content hash of the text.
    pub fn key(&self) -> String {
        match self.metadata.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => content_id(&self.text),
        }
    }
}

/// Nodes and relationships extracted from one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
    #[serde(default)]
    pub source: Option<SourceDocument>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestOptions {
    /// Also store each document's source text in [`SOURCE_COLLECTION`].
    pub include_source: bool,
}

/// How many documents of each kind were written.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub nodes: usize,
    pub edges: usize,
    pub sources: usize,
}

/// Write graph documents through `executor`.
///
/// Node collections are written first (in name order), then edge
/// collections, then source documents, one query per collection.
///
/// # Errors
///
/// Returns [`ArangoError::Validation`] if a node or relationship type is not
/// a valid collection name, before anything is written. Executor failures
/// propagate; collections written before the failure keep their documents.
pub async fn add_graph_documents(
    executor: &dyn GraphQueryExecutor,
    documents: &[GraphDocument],
    options: IngestOptions,
) -> Result<IngestSummary> {
    let mut node_batches: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut edge_batches: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut sources = Vec::new();
    let mut summary = IngestSummary::default();

    for document in documents {
        for node in &document.nodes {
            check_collection(&node.node_type)?;
            let mut stored = without_system_attributes(&node.properties);
            stored.insert("_key".into(), json!(node.id));
            stored.insert("_type".into(), json!(node.node_type));
            node_batches.entry(node.node_type.clone()).or_default().push(Value::Object(stored));
            summary.nodes += 1;
        }

        for rel in &document.relationships {
            let collection = rel.collection();
            check_collection(&collection)?;
            check_collection(&rel.source.node_type)?;
            check_collection(&rel.target.node_type)?;
            let mut stored = without_system_attributes(&rel.properties);
            stored.insert("_key".into(), json!(rel.edge_key()));
            stored.insert("_from".into(), json!(rel.source.document_id()));
            stored.insert("_to".into(), json!(rel.target.document_id()));
            edge_batches.entry(collection).or_default().push(Value::Object(stored));
            summary.edges += 1;
        }

        if options.include_source {
            if let Some(source) = &document.source {
                let mut stored = without_system_attributes(&source.metadata);
                stored.insert("_key".into(), json!(source.key()));
                stored.insert("text".into(), json!(source.text));
                sources.push(Value::Object(stored));
                summary.sources += 1;
            }
        }
    }

    for (collection, docs) in node_batches.into_iter().chain(edge_batches) {
        insert_batch(executor, &collection, docs).await?;
    }
    if !sources.is_empty() {
        insert_batch(executor, SOURCE_COLLECTION, sources).await?;
    }

    info!(nodes = summary.nodes, edges = summary.edges, sources = summary.sources, "ingested documents");
    Ok(summary)
}

async fn insert_batch(
    executor: &dyn GraphQueryExecutor,
    collection: &str,
    docs: Vec<Value>,
) -> Result<()> {
    debug!(collection, count = docs.len(), "writing batch");
    let mut bind_vars = BindVars::new();
    bind_vars.insert("@collection".into(), json!(collection));
    bind_vars.insert("docs".into(), Value::Array(docs));
    executor.execute(INSERT_QUERY, &bind_vars).await.map_err(|e| {
        error!(collection, error = %e, "graph ingestion failed");
        e
    })?;
    Ok(())
}

pub(crate) fn is_collection_name(name: &str) -> bool {
    COLLECTION_NAME.is_match(name)
}

fn check_collection(name: &str) -> Result<()> {
    if !is_collection_name(name) {
        return Err(ArangoError::Validation(format!("invalid collection name '{name}'")));
    }
    Ok(())
}

fn without_system_attributes(properties: &Map<String, Value>) -> Map<String, Value> {
    properties
        .iter()
        .filter(|(key, _)| !SYSTEM_ATTRIBUTES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
