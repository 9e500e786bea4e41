//! Embedding providers for the vector store.
//!
//! Queries and stored documents go through separate methods because many
//! embedding models encode them differently (asymmetric retrieval models
//! prefix one side with an instruction, for instance).

use async_trait::async_trait;

use crate::error::Result;

/// Turns questions and document texts into vectors of a fixed size.
///
/// Only [`embed_query`](EmbeddingProvider::embed_query) is required. The
/// default [`embed_documents`](EmbeddingProvider::embed_documents) reuses it
/// for each text in turn, which suits symmetric models.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::EmbeddingProvider;
///
/// let query = provider.embed_query("Which developers worked on project X?").await?;
/// let docs = provider.embed_documents(&["Alice worked on X", "Bob worked on X"]).await?;
/// assert_eq!(query.len(), provider.dimensions());
/// assert_eq!(docs.len(), 2);
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed texts for storage, one vector per text in input order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_query(text).await?);
        }
        Ok(embeddings)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;
}
