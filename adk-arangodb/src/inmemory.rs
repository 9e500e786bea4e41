//! In-memory vector index with exact nearest-neighbor search.
//!
//! [`InMemoryVectorIndex`] keeps documents in insertion order behind a
//! `tokio::sync::RwLock` and scores every one of them on each query. Suited
//! to tests, development, and collections small enough to scan.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::distance::DistanceStrategy;
use crate::document::VectorDocument;
use crate::error::{ArangoError, Result};
use crate::filter::FilterExpression;
use crate::vectorstore::{VectorIndex, VectorMatch};

const BACKEND: &str = "in_memory";

#[derive(Debug, Default)]
struct Entries {
    documents: Vec<VectorDocument>,
    positions: HashMap<String, usize>,
}

/// An exact-scan [`VectorIndex`] held in process memory.
///
/// Every stored embedding must have the dimensionality fixed at
/// construction and only finite components. Filters are evaluated against each document's metadata.
/// Documents with equal scores come back in insertion order.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::{DistanceStrategy, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(3, DistanceStrategy::Cosine);
/// index.upsert(&[VectorDocument::new("hello", vec![1.0, 0.0, 0.0])]).await?;
/// assert_eq!(index.count().await?, 1);
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimensions: usize,
    strategy: DistanceStrategy,
    entries: RwLock<Entries>,
}

impl InMemoryVectorIndex {
    /// Create an empty index for vectors of `dimensions` components.
    pub fn new(dimensions: usize, strategy: DistanceStrategy) -> Self {
        Self { dimensions, strategy, entries: RwLock::new(Entries::default()) }
    }

    /// Dimensionality every stored vector must have.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(ArangoError::VectorStore {
                backend: BACKEND.to_string(),
                message: format!(
                    "document '{id}' has {} dimensions, index expects {}",
                    embedding.len(),
                    self.dimensions
                ),
            });
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(ArangoError::VectorStore {
                backend: BACKEND.to_string(),
                message: format!("document '{id}' has a non-finite embedding component"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn distance_strategy(&self) -> DistanceStrategy {
        self.strategy
    }

    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()> {
        for doc in documents {
            self.check_embedding(&doc.id, &doc.embedding)?;
        }
        let mut entries = self.entries.write().await;
        for doc in documents {
            match entries.positions.get(&doc.id) {
                Some(&pos) => entries.documents[pos] = doc.clone(),
                None => {
                    let pos = entries.documents.len();
                    entries.positions.insert(doc.id.clone(), pos);
                    entries.documents.push(doc.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[&str]) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.documents.len();
        entries.documents.retain(|doc| !ids.contains(&doc.id.as_str()));
        if entries.documents.len() != before {
            let positions =
                entries.documents.iter().enumerate().map(|(i, doc)| (doc.id.clone(), i)).collect();
            entries.positions = positions;
        }
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterExpression>,
        include_embeddings: bool,
    ) -> Result<Vec<VectorMatch>> {
        self.check_embedding("<query>", embedding)?;
        let entries = self.entries.read().await;

        let mut scored = Vec::new();
        for doc in &entries.documents {
            if let Some(filter) = filter {
                if !filter.evaluate(&doc.metadata)? {
                    continue;
                }
            }
            scored.push((doc, self.strategy.score(&doc.embedding, embedding)));
        }

        // stable, so equal scores keep insertion order
        scored.sort_by(|a, b| self.strategy.compare_scores(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(doc, score)| {
                let mut document = doc.clone();
                if !include_embeddings {
                    document.embedding = Vec::new();
                }
                VectorMatch { document, score }
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::filter::Comparator;

    fn doc(id: &str, embedding: Vec<f32>) -> VectorDocument {
        VectorDocument::new(id, embedding).with_id(id)
    }

    #[tokio::test]
    async fn upsert_replaces_existing_ids() {
        let index = InMemoryVectorIndex::new(2, DistanceStrategy::Cosine);
        index.upsert(&[doc("a", vec![1.0, 0.0]), doc("b", vec![0.0, 1.0])]).await.unwrap();
        index.upsert(&[doc("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        let hits = index.search(&[0.0, 1.0], 2, None, true).await.unwrap();
        // both now score 1.0; insertion order breaks the tie
        assert_eq!(hits[0].document.id, "a");
        assert_eq!(hits[0].document.embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn delete_ignores_unknown_ids() {
        let index = InMemoryVectorIndex::new(2, DistanceStrategy::Cosine);
        index.upsert(&[doc("a", vec![1.0, 0.0]), doc("b", vec![0.0, 1.0])]).await.unwrap();
        index.delete(&["a", "missing"]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        index.upsert(&[doc("b", vec![1.0, 1.0])]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions() {
        let index = InMemoryVectorIndex::new(3, DistanceStrategy::Cosine);
        let err = index.upsert(&[doc("a", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, ArangoError::VectorStore { .. }));
        assert!(index.search(&[1.0, 0.0], 1, None, false).await.is_err());
    }

    #[tokio::test]
    async fn rejects_non_finite_components() {
        let index = InMemoryVectorIndex::new(2, DistanceStrategy::Cosine);
        let err = index.upsert(&[doc("broken", vec![f32::NAN, 0.0])]).await.unwrap_err();
        assert!(matches!(err, ArangoError::VectorStore { ref message, .. } if message.contains("non-finite")));
        assert!(index.upsert(&[doc("huge", vec![f32::INFINITY, 0.0])]).await.is_err());
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&[f32::NAN, 0.0], 1, None, false).await.is_err());
    }

    #[tokio::test]
    async fn euclidean_orders_ascending() {
        let index = InMemoryVectorIndex::new(1, DistanceStrategy::EuclideanDistance);
        index
            .upsert(&[doc("far", vec![9.0]), doc("near", vec![1.0]), doc("mid", vec![4.0])])
            .await
            .unwrap();
        let hits = index.search(&[0.0], 3, None, false).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, ["near", "mid", "far"]);
        assert!(hits.iter().all(|h| h.document.embedding.is_empty()));
        assert_eq!(hits[0].score, 1.0);
    }

    #[tokio::test]
    async fn filter_applies_to_metadata() {
        let index = InMemoryVectorIndex::new(1, DistanceStrategy::DotProduct);
        let mut tagged = doc("tagged", vec![1.0]);
        tagged.metadata.insert("year".into(), json!(2024));
        index.upsert(&[tagged, doc("plain", vec![2.0])]).await.unwrap();

        let filter = FilterExpression::comparison("year", Comparator::Gte, 2020).unwrap();
        let hits = index.search(&[1.0], 5, Some(&filter), false).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "tagged");
    }
}
