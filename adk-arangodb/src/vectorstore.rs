//! Vector similarity search with maximal-marginal-relevance re-ranking.
//!
//! [`VectorStore`] embeds texts through an [`EmbeddingProvider`] and keeps
//! them in a [`VectorIndex`] backend. Two backends ship with the crate:
//! [`InMemoryVectorIndex`](crate::InMemoryVectorIndex), an exact scan, and
//! [`AqlVectorIndex`](crate::AqlVectorIndex), which pushes the search into
//! ArangoDB through a [`GraphQueryExecutor`](crate::GraphQueryExecutor).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_arangodb::{DistanceStrategy, InMemoryVectorIndex, VectorStore};
//!
//! let store = VectorStore::builder()
//!     .embedding_provider(Arc::new(my_embedder))
//!     .index(Arc::new(InMemoryVectorIndex::new(384, DistanceStrategy::Cosine)))
//!     .build()?;
//!
//! store.add_texts(&["Alice wrote the parser", "Bob wrote the planner"], None, None).await?;
//! let hits = store.similarity_search("who wrote the parser?", 4, None).await?;
//! let diverse = store.max_marginal_relevance_search("parser", 2, 20, 0.5, None).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::distance::DistanceStrategy;
use crate::document::{Document, ScoredDocument, VectorDocument, content_id};
use crate::embedding::EmbeddingProvider;
use crate::error::{ArangoError, Result};
use crate::filter::FilterExpression;
use crate::mmr::maximal_marginal_relevance;
use crate::translator::AqlTranslator;

/// A candidate returned by a [`VectorIndex`] search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// The stored document. `embedding` is empty unless it was requested.
    pub document: VectorDocument,
    /// Score under the index's [`DistanceStrategy`].
    pub score: f64,
}

/// A storage backend for vector documents with nearest-neighbor search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// The metric this index ranks by.
    fn distance_strategy(&self) -> DistanceStrategy;

    /// Insert documents, replacing any stored document with the same id.
    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()>;

    /// Remove documents by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[&str]) -> Result<()>;

    /// Return up to `k` documents closest to `embedding` that satisfy
    /// `filter`, closest first.
    ///
    /// When `include_embeddings` is false the returned documents carry an
    /// empty embedding.
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterExpression>,
        include_embeddings: bool,
    ) -> Result<Vec<VectorMatch>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;
}

/// Embedding-based retrieval over a [`VectorIndex`].
///
/// Construct one via [`VectorStore::builder()`].
pub struct VectorStore {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    translator: AqlTranslator,
}

impl VectorStore {
    /// Create a new [`VectorStoreBuilder`].
    pub fn builder() -> VectorStoreBuilder {
        VectorStoreBuilder::default()
    }

    /// Build a store and add `texts` to it in one step.
    pub async fn from_texts(
        texts: &[&str],
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        metadatas: Option<Vec<Map<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> Result<Self> {
        let store = Self::builder().embedding_provider(embedding_provider).index(index).build()?;
        store.add_texts(texts, metadatas, ids).await?;
        Ok(store)
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the index backend.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed and store texts. Returns the ids in input order.
    ///
    /// Missing ids default to the content hash of each text, so adding the
    /// same text twice overwrites rather than duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if `metadatas` or `ids` do not
    /// match `texts` in length, and propagates embedding and index failures.
    pub async fn add_texts(
        &self,
        texts: &[&str],
        metadatas: Option<Vec<Map<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.embedding_provider.embed_documents(texts).await.map_err(|e| {
            error!(error = %e, "embedding failed while adding texts");
            e
        })?;
        self.add_embeddings(texts, embeddings, metadatas, ids).await
    }

    /// Store texts with precomputed embeddings. Returns the ids in input order.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if the argument lengths disagree or
    /// an embedding does not have the provider's dimensionality or holds a
    /// non-finite component.
    pub async fn add_embeddings(
        &self,
        texts: &[&str],
        embeddings: Vec<Vec<f32>>,
        metadatas: Option<Vec<Map<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>> {
        check_len("embeddings", embeddings.len(), texts.len())?;
        if let Some(m) = &metadatas {
            check_len("metadatas", m.len(), texts.len())?;
        }
        if let Some(ids) = &ids {
            check_len("ids", ids.len(), texts.len())?;
        }
        for embedding in &embeddings {
            self.check_embedding(embedding)?;
        }

        let ids: Vec<String> =
            ids.unwrap_or_else(|| texts.iter().map(|text| content_id(text)).collect());
        let mut metadatas = metadatas.unwrap_or_default().into_iter();

        let documents: Vec<VectorDocument> = texts
            .iter()
            .zip(embeddings)
            .zip(ids.iter())
            .map(|((text, embedding), id)| VectorDocument {
                id: id.clone(),
                text: (*text).to_string(),
                embedding,
                metadata: metadatas.next().unwrap_or_default(),
            })
            .collect();

        self.index.upsert(&documents).await.map_err(|e| {
            error!(backend = self.index.backend(), error = %e, "upsert failed");
            e
        })?;

        info!(backend = self.index.backend(), count = documents.len(), "added documents");
        Ok(ids)
    }

    /// Remove documents by id.
    pub async fn delete(&self, ids: &[&str]) -> Result<()> {
        self.index.delete(ids).await
    }

    /// Embed `query` and return the `k` closest documents with their scores.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<ScoredDocument>> {
        let embedding = self.embed_query(query).await?;
        self.similarity_search_by_vector(&embedding, k, filter).await
    }

    /// Return the `k` documents closest to `embedding` with their scores.
    ///
    /// Results are ordered closest first: descending similarity for cosine
    /// and dot product, ascending distance for Euclidean.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] for a filter outside the AQL
    /// allow-list or an embedding of the wrong dimensionality, before the
    /// index is touched.
    pub async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<ScoredDocument>> {
        self.check_query(embedding, filter)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let matches = self.index.search(embedding, k, filter, false).await.map_err(|e| {
            error!(backend = self.index.backend(), error = %e, "vector search failed");
            e
        })?;

        let results: Vec<ScoredDocument> = matches
            .into_iter()
            .map(|m| ScoredDocument { document: m.document.into_document(), score: m.score })
            .collect();

        info!(result_count = results.len(), "similarity search completed");
        Ok(results)
    }

    /// Embed `query` and run [`max_marginal_relevance_search_by_vector`](Self::max_marginal_relevance_search_by_vector).
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda_mult: f64,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<Document>> {
        let embedding = self.embed_query(query).await?;
        self.max_marginal_relevance_search_by_vector(&embedding, k, fetch_k, lambda_mult, filter)
            .await
    }

    /// Fetch `fetch_k` candidates and greedily pick `k` of them, trading
    /// relevance against redundancy with `lambda_mult` (1.0 = relevance only,
    /// 0.0 = diversity only).
    ///
    /// Returned documents never carry embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if `fetch_k < k`, `lambda_mult`
    /// is outside `[0, 1]`, or the filter or embedding is invalid.
    pub async fn max_marginal_relevance_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f64,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<Document>> {
        if fetch_k < k {
            return Err(ArangoError::Validation(format!(
                "fetch_k ({fetch_k}) must be at least k ({k})"
            )));
        }
        if !(0.0..=1.0).contains(&lambda_mult) {
            return Err(ArangoError::Validation(format!(
                "lambda_mult ({lambda_mult}) must be between 0 and 1"
            )));
        }
        self.check_query(embedding, filter)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let fetched = self.index.search(embedding, fetch_k, filter, true).await.map_err(|e| {
            error!(backend = self.index.backend(), error = %e, "vector search failed");
            e
        })?;

        let mut seen = HashSet::new();
        let candidates: Vec<VectorDocument> = fetched
            .into_iter()
            .map(|m| m.document)
            .filter(|doc| seen.insert(doc.id.clone()))
            .collect();

        let vectors: Vec<&[f32]> = candidates.iter().map(|d| d.embedding.as_slice()).collect();
        let selected = maximal_marginal_relevance(
            embedding,
            &vectors,
            self.index.distance_strategy(),
            lambda_mult,
            k,
        );
        debug!(candidates = candidates.len(), selected = ?selected, lambda_mult, "mmr selection");

        let mut slots: Vec<Option<VectorDocument>> = candidates.into_iter().map(Some).collect();
        let results: Vec<Document> = selected
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .map(VectorDocument::into_document)
            .collect();

        info!(result_count = results.len(), "max marginal relevance search completed");
        Ok(results)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedding_provider.embed_query(query).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            e
        })
    }

    fn check_query(&self, embedding: &[f32], filter: Option<&FilterExpression>) -> Result<()> {
        self.check_embedding(embedding)?;
        if let Some(filter) = filter {
            self.translator.validate(filter)?;
        }
        Ok(())
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.embedding_provider.dimensions();
        if embedding.len() != expected {
            return Err(ArangoError::Validation(format!(
                "embedding has {} dimensions, expected {expected}",
                embedding.len()
            )));
        }
        if let Some(position) = embedding.iter().position(|x| !x.is_finite()) {
            return Err(ArangoError::Validation(format!(
                "embedding component {position} is not finite"
            )));
        }
        Ok(())
    }
}

fn check_len(label: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(ArangoError::Validation(format!(
            "{label} has {actual} entries but {expected} texts were given"
        )));
    }
    Ok(())
}

/// Builder for constructing a [`VectorStore`].
///
/// Both the embedding provider and the index are required.
#[derive(Default)]
pub struct VectorStoreBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl VectorStoreBuilder {
    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the index backend.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the [`VectorStore`].
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Config`] if a required field is missing.
    pub fn build(self) -> Result<VectorStore> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| ArangoError::Config("embedding_provider is required".to_string()))?;
        let index =
            self.index.ok_or_else(|| ArangoError::Config("index is required".to_string()))?;
        Ok(VectorStore { embedding_provider, index, translator: AqlTranslator::new() })
    }
}
