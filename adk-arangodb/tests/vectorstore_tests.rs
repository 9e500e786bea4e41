//! Tests for the vector store over the in-memory and AQL indexes.

use std::collections::HashMap;
use std::sync::Arc;

use adk_arangodb::mock::MockGraphExecutor;
use adk_arangodb::{
    AqlVectorIndex, ArangoError, Comparator, DistanceStrategy, EmbeddingProvider,
    FilterExpression, InMemoryVectorIndex, Result, VectorIndex, VectorStore, VectorStoreConfig,
    content_id, into_row,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

/// Embeds a fixed vocabulary of texts.
struct TableEmbedder {
    table: HashMap<&'static str, Vec<f32>>,
}

impl TableEmbedder {
    fn new(entries: &[(&'static str, [f32; 2])]) -> Self {
        Self { table: entries.iter().map(|(text, v)| (*text, v.to_vec())).collect() }
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.table.get(text).cloned().ok_or_else(|| ArangoError::Embedding {
            provider: "table".into(),
            message: format!("unknown text '{text}'"),
        })
    }

    fn dimensions(&self) -> usize {
        2
    }
}

fn embedder() -> Arc<TableEmbedder> {
    Arc::new(TableEmbedder::new(&[
        ("graph databases", [1.0, 0.0]),
        ("graph stores", [0.999, 0.01]),
        ("cooking pasta", [0.0, 1.0]),
        ("mixed topics", [0.7, 0.7]),
        ("query", [1.0, 0.0]),
    ]))
}

fn memory_store() -> (VectorStore, Arc<InMemoryVectorIndex>) {
    let index = Arc::new(InMemoryVectorIndex::new(2, DistanceStrategy::Cosine));
    let store =
        VectorStore::builder().embedding_provider(embedder()).index(index.clone()).build().unwrap();
    (store, index)
}

fn metadata(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test]
async fn default_ids_make_adds_idempotent() {
    let (store, index) = memory_store();

    let ids = store.add_texts(&["graph databases", "cooking pasta"], None, None).await.unwrap();
    assert_eq!(ids, [content_id("graph databases"), content_id("cooking pasta")]);

    store.add_texts(&["graph databases"], None, None).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 2);
}

#[tokio::test]
async fn explicit_ids_overwrite_previous_documents() {
    let (store, index) = memory_store();
    let ids = vec!["a".to_string()];

    store.add_texts(&["graph databases"], None, Some(ids.clone())).await.unwrap();
    store.add_texts(&["cooking pasta"], None, Some(ids)).await.unwrap();

    assert_eq!(index.count().await.unwrap(), 1);
    let hits = store.similarity_search("query", 1, None).await.unwrap();
    assert_eq!(hits[0].document.text, "cooking pasta");
}

#[tokio::test]
async fn mismatched_lengths_are_rejected() {
    let (store, _) = memory_store();

    let err = store
        .add_texts(&["graph databases", "cooking pasta"], Some(vec![Map::new()]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ArangoError::Validation(_)));

    let err = store
        .add_embeddings(&["graph databases"], vec![vec![1.0, 0.0, 0.0]], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ArangoError::Validation(_)));
}

#[tokio::test]
async fn non_finite_embeddings_are_rejected() {
    let (store, index) = memory_store();
    store.add_embeddings(&["exact"], vec![vec![1.0, 0.0]], None, None).await.unwrap();

    for broken in [vec![f32::NAN, 0.0], vec![f32::INFINITY, 0.0], vec![0.0, f32::NEG_INFINITY]] {
        let err = store.add_embeddings(&["broken"], vec![broken.clone()], None, None).await.unwrap_err();
        assert!(matches!(err, ArangoError::Validation(ref m) if m.contains("not finite")));

        let err = store.similarity_search_by_vector(&broken, 1, None).await.unwrap_err();
        assert!(matches!(err, ArangoError::Validation(_)));
        let err =
            store.max_marginal_relevance_search_by_vector(&broken, 1, 1, 0.5, None).await.unwrap_err();
        assert!(matches!(err, ArangoError::Validation(_)));
    }
    assert_eq!(index.count().await.unwrap(), 1);

    let hits = store.similarity_search_by_vector(&[1.0, 0.0], 1, None).await.unwrap();
    assert_eq!(hits[0].document.text, "exact");
    let picked = store.max_marginal_relevance_search_by_vector(&[1.0, 0.0], 1, 1, 0.5, None).await.unwrap();
    assert_eq!(picked[0].text, "exact");
}

#[tokio::test]
async fn similarity_search_orders_by_score() {
    let (store, _) = memory_store();
    store
        .add_texts(&["cooking pasta", "mixed topics", "graph databases"], None, None)
        .await
        .unwrap();

    let hits = store.similarity_search("query", 2, None).await.unwrap();

    let texts: Vec<&str> = hits.iter().map(|h| h.document.text.as_str()).collect();
    assert_eq!(texts, ["graph databases", "mixed topics"]);
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn similarity_search_applies_metadata_filter() {
    let (store, _) = memory_store();
    store
        .add_texts(
            &["graph databases", "mixed topics"],
            Some(vec![metadata(json!({"year": 2019})), metadata(json!({"year": 2024}))]),
            None,
        )
        .await
        .unwrap();

    let filter = FilterExpression::comparison("year", Comparator::Gt, 2020).unwrap();
    let hits = store.similarity_search("query", 5, Some(&filter)).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.text, "mixed topics");
    assert_eq!(hits[0].document.metadata.get("year"), Some(&json!(2024)));
}

#[tokio::test]
async fn mmr_prefers_diverse_results() {
    let (store, _) = memory_store();
    store
        .add_texts(&["graph databases", "graph stores", "mixed topics"], None, None)
        .await
        .unwrap();

    let plain = store.similarity_search("query", 2, None).await.unwrap();
    let plain: Vec<&str> = plain.iter().map(|h| h.document.text.as_str()).collect();
    assert_eq!(plain, ["graph databases", "graph stores"]);

    let diverse = store.max_marginal_relevance_search("query", 2, 3, 0.3, None).await.unwrap();
    let texts: Vec<&str> = diverse.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, ["graph databases", "mixed topics"]);
    assert_ne!(diverse[0].id, diverse[1].id);
}

#[tokio::test]
async fn mmr_with_lambda_one_matches_top_k() {
    let (store, _) = memory_store();
    store
        .add_texts(&["cooking pasta", "graph stores", "mixed topics", "graph databases"], None, None)
        .await
        .unwrap();

    let top = store.similarity_search("query", 3, None).await.unwrap();
    let mmr = store.max_marginal_relevance_search("query", 3, 4, 1.0, None).await.unwrap();

    let top_ids: Vec<&str> = top.iter().map(|h| h.document.id.as_str()).collect();
    let mmr_ids: Vec<&str> = mmr.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(top_ids, mmr_ids);
}

#[tokio::test]
async fn mmr_rejects_bad_parameters() {
    let (store, _) = memory_store();

    let err = store.max_marginal_relevance_search("query", 5, 2, 0.5, None).await.unwrap_err();
    assert!(matches!(err, ArangoError::Validation(ref m) if m.contains("fetch_k")));

    let err = store.max_marginal_relevance_search("query", 2, 5, 1.5, None).await.unwrap_err();
    assert!(matches!(err, ArangoError::Validation(ref m) if m.contains("lambda_mult")));
}

#[tokio::test]
async fn unknown_query_text_surfaces_embedding_error() {
    let (store, _) = memory_store();
    let err = store.similarity_search("unheard of", 1, None).await.unwrap_err();
    assert!(matches!(err, ArangoError::Embedding { .. }));
}

#[tokio::test]
async fn aql_index_writes_documents_with_replace() {
    let graph = Arc::new(MockGraphExecutor::new());
    let index = Arc::new(AqlVectorIndex::new(graph.clone(), VectorStoreConfig::default()));
    let store = VectorStore::builder().embedding_provider(embedder()).index(index).build().unwrap();

    store
        .add_texts(&["graph databases"], Some(vec![metadata(json!({"lang": "en"}))]), Some(vec!["g1".into()]))
        .await
        .unwrap();

    let calls = graph.calls();
    assert_eq!(calls.len(), 1);
    let (query, bind_vars) = &calls[0];
    assert!(query.contains("INSERT d INTO @@collection"));
    assert!(query.contains("overwriteMode: \"replace\""));
    assert_eq!(bind_vars["@collection"], json!("documents"));
    assert_eq!(
        bind_vars["docs"],
        json!([{"lang": "en", "_key": "g1", "text": "graph databases", "embedding": [1.0, 0.0]}])
    );
}

#[tokio::test]
async fn aql_index_searches_with_bound_parameters() {
    let graph = Arc::new(MockGraphExecutor::new().with_handler(|query, _| {
        if query.contains("COSINE_SIMILARITY") {
            Ok(vec![into_row(json!({
                "document": {"_key": "g1", "text": "graph databases", "lang": "en"},
                "score": 0.98
            }))])
        } else {
            Ok(Vec::new())
        }
    }));
    let config = VectorStoreConfig::builder().collection_name("chunks").build().unwrap();
    let index = Arc::new(AqlVectorIndex::new(graph.clone(), config));
    let store = VectorStore::builder().embedding_provider(embedder()).index(index).build().unwrap();

    let filter = FilterExpression::comparison("lang", Comparator::Eq, "en").unwrap();
    let hits = store.similarity_search("query", 4, Some(&filter)).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.id, "g1");
    assert_eq!(hits[0].document.metadata.get("lang"), Some(&json!("en")));
    assert_eq!(hits[0].score, 0.98);

    let (query, bind_vars) = &graph.calls()[0];
    assert!(query.contains("FILTER doc.lang == \"en\""));
    assert!(query.contains("SORT score DESC"));
    assert_eq!(bind_vars["@collection"], json!("chunks"));
    assert_eq!(bind_vars["k"], json!(4));
    assert_eq!(bind_vars["query_embedding"], json!([1.0, 0.0]));
}

#[tokio::test]
async fn aql_index_mmr_decodes_stored_embeddings() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(vec![
        into_row(json!({
            "document": {"_key": "g1", "text": "graph databases", "embedding": [1.0, 0.0]},
            "score": 1.0
        })),
        into_row(json!({
            "document": {"_key": "g2", "text": "graph stores", "embedding": [0.999, 0.01]},
            "score": 0.99995
        })),
        into_row(json!({
            "document": {"_key": "m1", "text": "mixed topics", "embedding": [0.7, 0.7], "lang": "en"},
            "score": 0.7071
        })),
    ]));
    let index = Arc::new(AqlVectorIndex::new(graph.clone(), VectorStoreConfig::default()));
    let store = VectorStore::builder().embedding_provider(embedder()).index(index).build().unwrap();

    let diverse = store.max_marginal_relevance_search("query", 2, 3, 0.3, None).await.unwrap();

    let ids: Vec<&str> = diverse.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["g1", "m1"]);
    assert_eq!(diverse[1].text, "mixed topics");
    assert_eq!(diverse[1].metadata.get("lang"), Some(&json!("en")));
    assert!(diverse.iter().all(|d| !d.metadata.contains_key("embedding")));

    let (query, bind_vars) = &graph.calls()[0];
    assert!(query.contains("RETURN { document: UNSET(doc, \"_id\", \"_rev\"), score: score }"));
    assert_eq!(bind_vars["k"], json!(3));
}

#[tokio::test]
async fn disallowed_filter_fails_before_any_query() {
    let graph = Arc::new(MockGraphExecutor::new());
    let index = Arc::new(AqlVectorIndex::new(graph.clone(), VectorStoreConfig::default()));
    let store = VectorStore::builder().embedding_provider(embedder()).index(index).build().unwrap();

    let filter = FilterExpression::comparison("tags", Comparator::Contain, "graph").unwrap();
    let err = store.similarity_search("query", 4, Some(&filter)).await.unwrap_err();

    assert!(matches!(err, ArangoError::Validation(ref m) if m.contains("contain")));
    assert_eq!(graph.call_count(), 0);
}

#[tokio::test]
async fn aql_index_counts_documents() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(vec![into_row(json!(3))]));
    let index = AqlVectorIndex::new(graph.clone(), VectorStoreConfig::default());

    assert_eq!(index.count().await.unwrap(), 3);
    assert_eq!(graph.calls()[0].0, "RETURN LENGTH(@@collection)");
}

#[tokio::test]
async fn builder_requires_provider_and_index() {
    let missing = VectorStore::builder().embedding_provider(embedder()).build();
    assert!(matches!(missing, Err(ArangoError::Config(_))));
}
