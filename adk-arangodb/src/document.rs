//! Data types for stored vectors and retrieved documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A document as returned by retrieval: text and metadata, no embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier (the `_key` of the stored document).
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Remaining attributes of the stored document.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A document stored in a vector collection, embedding included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorDocument {
    /// Unique identifier. Writing a document with an existing id replaces it.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// The vector embedding of `text`.
    pub embedding: Vec<f32>,
    /// Key-value metadata stored next to the text.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorDocument {
    /// Create a document whose id is the content hash of `text`.
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        let text = text.into();
        Self { id: content_id(&text), text, embedding, metadata: Map::new() }
    }

    /// Replace the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Drop the embedding, keeping id, text and metadata.
    pub fn into_document(self) -> Document {
        Document { id: self.id, text: self.text, metadata: self.metadata }
    }
}

/// A retrieved [`Document`] paired with its score under the store's
/// [`DistanceStrategy`](crate::DistanceStrategy).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

/// Content-addressed id: the hex SHA-256 digest of `text`.
pub fn content_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
