//! Integration tests for the TiDB retriever and indexer.
//!
//! The `#[ignore]` tests require a running TiDB instance with vector search
//! and TLS enabled (TiDB Cloud Serverless works). Connection parameters are
//! read from the `TIDB_*` environment variables:
//!
//! ```bash
//! TIDB_HOST=... TIDB_USER=... TIDB_PASSWORD=... cargo test -p synaptic-tidb -- --ignored
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use synaptic_tidb::{
    document_id, tidb, DistanceMethod, Document, Embeddings, EmbeddingsEmbedder, Indexer,
    Retriever, SynapticError, TiDbClient, TiDbConnectParams, TiDbIndexer, TiDbIndexerOptions,
    TiDbParams, TiDbRetrieverOptions,
};

// ---------------------------------------------------------------------------
// Fake embeddings for integration tests
// ---------------------------------------------------------------------------

/// Reads the vector straight out of the text: `"label|x,y,z"` embeds to
/// `[x, y, z]`. Makes expected rankings easy to write down.
struct LiteralEmbeddings;

fn vector_of(text: &str) -> Result<Vec<f32>, SynapticError> {
    let (_, coords) = text
        .split_once('|')
        .ok_or_else(|| SynapticError::Embedding(format!("no coordinates in '{text}'")))?;
    coords
        .split(',')
        .map(|c| {
            c.trim()
                .parse::<f32>()
                .map_err(|e| SynapticError::Embedding(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl Embeddings for LiteralEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SynapticError> {
        texts.iter().map(|t| vector_of(t)).collect()
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SynapticError> {
        vector_of(text)
    }
}

fn params(table: &str) -> TiDbParams {
    TiDbParams::new(table, Arc::new(EmbeddingsEmbedder::new(Arc::new(LiteralEmbeddings))))
}

// ---------------------------------------------------------------------------
// Unit tests (no database required)
// ---------------------------------------------------------------------------

#[test]
fn plugin_names_follow_table_names() {
    let plugin = tidb(vec![params("Articles")]).unwrap();
    assert_eq!(plugin.retrievers()[0].name(), "tidb/Articles");
    assert_eq!(plugin.indexers()[0].name(), "tidb/Articles");
    assert_eq!(plugin.indexers()[0].schema().name(), "articles");
}

#[test]
fn identical_documents_share_an_id() {
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), json!("faq"));
    let a = Document::with_metadata("x", "hello|1,0", metadata.clone());
    let b = Document::with_metadata("y", "hello|1,0", metadata);
    assert_eq!(document_id(&a).unwrap(), document_id(&b).unwrap());
}

#[tokio::test]
async fn empty_batch_needs_no_database() {
    // Points at a port nothing listens on; an early return never connects.
    let indexer = TiDbIndexer::new(
        params("docs").with_client_params(TiDbConnectParams::new("127.0.0.1").with_port(1)),
    )
    .unwrap();
    indexer
        .index(Vec::new(), &TiDbIndexerOptions::new("tenant"))
        .await
        .unwrap();
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let indexer = TiDbIndexer::new(
        params("docs").with_client_params(TiDbConnectParams::new("127.0.0.1").with_port(1)),
    )
    .unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        indexer.index(vec![Document::new("", "a|1,0")], &TiDbIndexerOptions::new("tenant")),
    )
    .await
    .expect("indexing kept retrying the connection");

    match result {
        Err(SynapticError::Connection(msg)) => assert!(msg.contains("127.0.0.1:1"), "{msg}"),
        other => panic!("expected a connection error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Integration tests (require a live TiDB instance)
// ---------------------------------------------------------------------------

/// Helper: drop `table` so each test starts fresh, and return env params.
async fn fresh_table(table: &str) -> TiDbConnectParams {
    let connect = TiDbConnectParams::from_env().expect("TIDB_* variables are invalid");
    let mut client = TiDbClient::connect(&connect)
        .await
        .expect("failed to connect to TiDB");
    sqlx::query(&format!("DROP TABLE IF EXISTS `{table}`"))
        .execute(client.connection())
        .await
        .expect("failed to drop test table");
    connect
}

async fn row_count(connect: &TiDbConnectParams, table: &str) -> i64 {
    let mut client = TiDbClient::connect(connect).await.unwrap();
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM `{table}`"))
        .fetch_one(client.connection())
        .await
        .unwrap();
    count
}

fn texts(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.content.as_str()).collect()
}

#[tokio::test]
#[ignore]
async fn test_reindexing_is_idempotent() {
    let connect = fresh_table("test_idempotent").await;
    let plugin = tidb(vec![params("test_idempotent").with_client_params(connect.clone())]).unwrap();
    let indexer = plugin.indexer("tidb/test_idempotent").unwrap();
    let options = TiDbIndexerOptions::new("A");

    let doc = Document::new("", "same|1,2,3");
    indexer.index(vec![doc.clone()], &options).await.unwrap();
    indexer.index(vec![doc], &options).await.unwrap();

    assert_eq!(row_count(&connect, "test_idempotent").await, 1);
}

#[tokio::test]
#[ignore]
async fn test_failed_batch_stores_nothing() {
    let connect = fresh_table("test_all_or_nothing").await;
    let plugin = tidb(vec![params("test_all_or_nothing").with_client_params(connect.clone())]).unwrap();
    let indexer = plugin.indexer("tidb/test_all_or_nothing").unwrap();

    // 1001 rows span two INSERT chunks; TiDB rejects the NaN in the last one.
    let mut docs: Vec<Document> = (0..1000)
        .map(|i| Document::new("", format!("ok{i}|{i},1")))
        .collect();
    docs.push(Document::new("", "bad|NaN,1"));

    let err = indexer
        .index(docs, &TiDbIndexerOptions::new("A"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynapticError::Indexing(_)), "{err}");
    assert_eq!(row_count(&connect, "test_all_or_nothing").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_identical_content_in_another_tenant_is_rejected() {
    let connect = fresh_table("test_cross_tenant").await;
    let plugin = tidb(vec![params("test_cross_tenant").with_client_params(connect.clone())]).unwrap();
    let indexer = plugin.indexer("tidb/test_cross_tenant").unwrap();
    let retriever = plugin.retriever("tidb/test_cross_tenant").unwrap();
    let doc = Document::new("", "shared|1,0");

    indexer
        .index(vec![doc.clone()], &TiDbIndexerOptions::new("A"))
        .await
        .unwrap();
    let err = indexer
        .index(
            vec![Document::new("", "own|0,1"), doc.clone()],
            &TiDbIndexerOptions::new("B"),
        )
        .await
        .unwrap_err();
    match err {
        SynapticError::Indexing(msg) => assert!(msg.contains(&document_id(&doc).unwrap()), "{msg}"),
        other => panic!("expected an indexing error, got {other:?}"),
    }

    assert_eq!(row_count(&connect, "test_cross_tenant").await, 1);
    let a = retriever
        .retrieve_documents(&Document::from_text("q|1,0"), &TiDbRetrieverOptions::new("A"))
        .await
        .unwrap();
    assert_eq!(texts(&a), vec!["shared|1,0"]);
    let b = retriever
        .retrieve_documents(&Document::from_text("q|1,0"), &TiDbRetrieverOptions::new("B"))
        .await
        .unwrap();
    assert!(b.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_tenant_isolation() {
    let connect = fresh_table("test_tenants").await;
    let plugin = tidb(vec![params("test_tenants").with_client_params(connect)]).unwrap();
    let indexer = plugin.indexer("tidb/test_tenants").unwrap();
    let retriever = plugin.retriever("tidb/test_tenants").unwrap();

    indexer
        .index(
            vec![Document::new("", "a1|1,0"), Document::new("", "a2|0,1")],
            &TiDbIndexerOptions::new("A"),
        )
        .await
        .unwrap();
    indexer
        .index(
            vec![Document::new("", "b1|1,0.1"), Document::new("", "b2|0.9,0")],
            &TiDbIndexerOptions::new("B"),
        )
        .await
        .unwrap();

    for method in DistanceMethod::ALL {
        for k in [1, 2, 10] {
            let options = TiDbRetrieverOptions::new("A")
                .with_k(k)
                .with_distance_method(method);
            let docs = retriever
                .retrieve_documents(&Document::from_text("q|1,0"), &options)
                .await
                .unwrap();
            assert!(
                docs.iter().all(|d| d.content.starts_with("a")),
                "{method} k={k} leaked: {:?}",
                texts(&docs)
            );
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_ranking_order_and_k() {
    let connect = fresh_table("test_ranking").await;
    let plugin = tidb(vec![params("test_ranking").with_client_params(connect)]).unwrap();
    let indexer = plugin.indexer("tidb/test_ranking").unwrap();
    let retriever = plugin.retriever("tidb/test_ranking").unwrap();

    let docs = ["p4|4,0", "p1|1,0", "p3|3,0", "p0|0.5,0", "p2|2,0"]
        .into_iter()
        .map(|t| Document::new("", t))
        .collect();
    indexer.index(docs, &TiDbIndexerOptions::new("A")).await.unwrap();

    let query = Document::from_text("q|0,0");
    let options = TiDbRetrieverOptions::new("A").with_distance_method(DistanceMethod::L2);

    let response = retriever.query(&query, &options).await.unwrap();
    assert_eq!(response.ids.len(), 5);
    assert!(response.distances.windows(2).all(|w| w[0] <= w[1]));

    let top2 = retriever
        .retrieve_documents(&query, &options.clone().with_k(2))
        .await
        .unwrap();
    assert_eq!(texts(&top2), vec!["p0|0.5,0", "p1|1,0"]);
}

#[tokio::test]
#[ignore]
async fn test_default_distance_is_cosine() {
    let connect = fresh_table("test_default_method").await;
    let plugin = tidb(vec![params("test_default_method").with_client_params(connect)]).unwrap();
    let indexer = plugin.indexer("tidb/test_default_method").unwrap();
    let retriever = plugin.retriever("tidb/test_default_method").unwrap();

    let docs = ["x|1,0", "y|0,1", "xy|1,1", "far|-1,-1"]
        .into_iter()
        .map(|t| Document::new("", t))
        .collect();
    indexer.index(docs, &TiDbIndexerOptions::new("A")).await.unwrap();

    let query = Document::from_text("q|2,1");
    let implicit = retriever
        .query(&query, &TiDbRetrieverOptions::new("A"))
        .await
        .unwrap();
    let explicit = retriever
        .query(
            &query,
            &TiDbRetrieverOptions::new("A").with_distance_method(DistanceMethod::Cosine),
        )
        .await
        .unwrap();
    assert_eq!(implicit, explicit);
}

#[tokio::test]
#[ignore]
async fn test_stored_embeddings_round_trip() {
    let connect = fresh_table("test_round_trip").await;
    let plugin = tidb(vec![params("test_round_trip").with_client_params(connect)]).unwrap();
    plugin
        .indexer("tidb/test_round_trip")
        .unwrap()
        .index(vec![Document::new("", "v|0.1,0.25,-3")], &TiDbIndexerOptions::new("A"))
        .await
        .unwrap();

    let response = plugin
        .retriever("tidb/test_round_trip")
        .unwrap()
        .query(&Document::from_text("q|0.1,0.25,-3"), &TiDbRetrieverOptions::new("A"))
        .await
        .unwrap();
    let stored = &response.embeddings[0];
    for (got, want) in stored.iter().zip([0.1f32, 0.25, -3.0]) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[tokio::test]
#[ignore]
async fn test_scoped_adapters() {
    let connect = fresh_table("test_scoped").await;
    let plugin = tidb(vec![params("test_scoped").with_client_params(connect)]).unwrap();

    let indexer = plugin
        .indexer("tidb/test_scoped")
        .unwrap()
        .scoped(TiDbIndexerOptions::new("A"));
    indexer
        .index(vec![Document::new("", "one|1,0"), Document::new("", "two|0,1")])
        .await
        .unwrap();

    let retriever = plugin
        .retriever("tidb/test_scoped")
        .unwrap()
        .scoped(TiDbRetrieverOptions::new("A").with_k(2));
    let docs = retriever.retrieve("q|1,0", 1).await.unwrap();
    assert_eq!(texts(&docs), vec!["one|1,0"]);
}
