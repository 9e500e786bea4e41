//! Error types for the `adk-arangodb` crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed cause carried by [`ArangoError::Execution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A stage of the graph QA pipeline that calls out to a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The language model turns the question into an AQL query.
    GenerateQuery,
    /// The generated query runs against the graph database.
    Execute,
    /// The language model turns the retrieved rows into an answer.
    Synthesize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::GenerateQuery => "generate_query",
            Stage::Execute => "execute",
            Stage::Synthesize => "synthesize",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in graph QA, filter translation and vector retrieval.
#[derive(Debug, Error)]
pub enum ArangoError {
    /// A filter, query or argument was rejected before any I/O took place.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A model lacks a capability the requested configuration depends on.
    #[error("Capability error ({model}): {message}")]
    Capability {
        /// The model missing the capability.
        model: String,
        /// A description of the missing capability.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The query executor failed. The original cause is kept as the source.
    #[error("Execution error: {message}")]
    Execution {
        /// A description of the failure.
        message: String,
        /// The underlying cause, when one exists.
        #[source]
        source: Option<BoxError>,
    },

    /// A language model call failed.
    #[error("Model error ({model}): {message}")]
    Model {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in a vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A boundary call did not finish within the configured stage timeout.
    #[error("{stage} stage timed out after {timeout_ms}ms")]
    Timeout {
        /// The stage that timed out.
        stage: Stage,
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArangoError {
    /// Build an [`ArangoError::Execution`] without an underlying cause.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution { message: message.into(), source: None }
    }

    /// Build an [`ArangoError::Execution`] wrapping the original cause.
    pub fn execution_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Execution { message: message.into(), source: Some(source.into()) }
    }
}

/// A convenience result type for this crate.
pub type Result<T> = std::result::Result<T, ArangoError>;
