use std::sync::Arc;

use async_trait::async_trait;
use synaptic_tidb::{
    tidb, DistanceMethod, Document, Embeddings, EmbeddingsEmbedder, SynapticError,
    TiDbConnectParams, TiDbIndexerOptions, TiDbParams, TiDbRetrieverOptions,
};
use tracing_subscriber::EnvFilter;

const DIMS: usize = 32;

/// Bag-of-bytes embeddings: good enough to rank by shared vocabulary.
struct ByteEmbeddings;

fn embed(text: &str) -> Vec<f32> {
    let mut vec = vec![0.0f32; DIMS];
    for word in text.split_whitespace() {
        for (i, byte) in word.to_ascii_lowercase().bytes().enumerate() {
            vec[(byte as usize + i) % DIMS] += 1.0;
        }
    }
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}

#[async_trait]
impl Embeddings for ByteEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SynapticError> {
        Ok(texts.iter().map(|t| embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SynapticError> {
        Ok(embed(text))
    }
}

#[tokio::main]
async fn main() -> Result<(), SynapticError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let connection = TiDbConnectParams::from_env()?;
    let embedder = Arc::new(EmbeddingsEmbedder::new(Arc::new(ByteEmbeddings)));
    let plugin = tidb(vec![TiDbParams::new("RagDemo", embedder).with_client_params(connection)])?;

    let indexer = plugin
        .indexer("tidb/RagDemo")
        .ok_or_else(|| SynapticError::Config("indexer not registered".to_string()))?;
    let retriever = plugin
        .retriever("tidb/RagDemo")
        .ok_or_else(|| SynapticError::Config("retriever not registered".to_string()))?;

    // --- Index ---
    println!("=== Indexing ===");
    let docs = vec![
        Document::new("", "Rust is a systems programming language focused on safety and speed."),
        Document::new("", "TiDB is a distributed SQL database compatible with MySQL."),
        Document::new("", "Vector search ranks rows by distance between embeddings."),
    ];
    indexer.index(docs, &TiDbIndexerOptions::new("demo")).await?;
    println!("Indexed 3 documents for tenant 'demo'");

    // --- Retrieve with each distance method ---
    for method in DistanceMethod::ALL {
        println!("\n=== {method} ===");
        let options = TiDbRetrieverOptions::new("demo")
            .with_k(2)
            .with_distance_method(method);
        let results = retriever
            .retrieve_documents(&Document::from_text("MySQL compatible database"), &options)
            .await?;
        for (i, doc) in results.iter().enumerate() {
            println!("  {i}: \"{}\"", doc.content);
        }
    }

    println!("\nTiDB RAG demo completed successfully!");
    Ok(())
}
