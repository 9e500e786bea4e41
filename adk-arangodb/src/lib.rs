//! # adk-arangodb
//!
//! ArangoDB retrieval for ADK agents: graph question answering, AQL filter
//! translation and vector similarity search.
//!
//! ## Overview
//!
//! - [`AqlTranslator`] - compiles a [`FilterExpression`] into an AQL predicate
//! - [`GraphQaPipeline`] - question → generated AQL → rows → answer
//! - [`VectorStore`] - embedding search with maximal marginal relevance
//! - [`add_graph_documents`] - writes extracted knowledge graphs
//! - [`GraphRetriever`] - keyword lookup over one collection
//! - [`ArangoGraph`] - HTTP executor (feature `arangodb`)
//! - [`mock`] - scripted model and executor doubles for tests
//!
//! ## Quick Start
//!
//! ### Filter translation
//!
//! ```rust
//! use adk_arangodb::{AqlTranslator, Comparator, FilterExpression, Operator};
//!
//! let filter = FilterExpression::operation(
//!     Operator::And,
//!     vec![
//!         FilterExpression::comparison("year", Comparator::Gte, 2020).unwrap(),
//!         FilterExpression::comparison("genre", Comparator::Eq, "drama").unwrap(),
//!     ],
//! )
//! .unwrap();
//!
//! let aql = AqlTranslator::new().translate(&filter).unwrap();
//! assert_eq!(aql, r#"(doc.year >= 2020 AND doc.genre == "drama")"#);
//! ```
//!
//! ### Graph QA
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_arangodb::{ArangoConfig, ArangoGraph, GraphQaPipeline};
//!
//! let graph = ArangoGraph::connect(ArangoConfig::from_env()).await?;
//! let pipeline = GraphQaPipeline::builder()
//!     .graph(Arc::new(graph))
//!     .llm(model)
//!     .schema(schema_text)
//!     .build()?;
//! let output = pipeline.invoke("Which developers worked on project X?").await?;
//! ```
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `arangodb` | [`ArangoGraph`] over the ArangoDB REST API |
//! | `full` | everything |

pub mod aql_index;
#[cfg(feature = "arangodb")]
pub mod client;
pub mod config;
pub mod distance;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod graph;
pub mod ingest;
pub mod inmemory;
pub mod llm;
pub mod mmr;
pub mod mock;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod translator;
pub mod vectorstore;

pub use aql_index::AqlVectorIndex;
#[cfg(feature = "arangodb")]
pub use client::ArangoGraph;
pub use config::{ArangoConfig, QaConfig, QaConfigBuilder, VectorStoreConfig, VectorStoreConfigBuilder};
pub use distance::DistanceStrategy;
pub use document::{Document, ScoredDocument, VectorDocument, content_id};
pub use embedding::EmbeddingProvider;
pub use error::{ArangoError, Result, Stage};
pub use filter::{
    Comparator, Comparison, FilterExpression, FilterValue, Operation, Operator, StructuredQuery,
};
pub use graph::{BindVars, GraphQueryExecutor, Row, into_row};
pub use ingest::{
    GraphDocument, GraphNode, GraphRelationship, IngestOptions, IngestSummary, SourceDocument,
    add_graph_documents,
};
pub use inmemory::InMemoryVectorIndex;
pub use llm::{LanguageModel, Message, ToolCall, ToolCalling, ToolDefinition};
pub use mmr::maximal_marginal_relevance;
pub use pipeline::{
    GraphQaPipeline, GraphQaPipelineBuilder, IntermediateStep, QaAnswer, QaInputs, QaOutput,
};
pub use prompt::PromptTemplate;
pub use retriever::GraphRetriever;
pub use translator::AqlTranslator;
pub use vectorstore::{VectorIndex, VectorMatch, VectorStore, VectorStoreBuilder};
