use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the Synaptic framework with variants covering all subsystems.
#[derive(Debug, Error)]
pub enum SynapticError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("indexing error: {0}")]
    Indexing(String),
    #[error("query error: {0}")]
    Query(String),
}

// ---------------------------------------------------------------------------
// Embeddings trait
// ---------------------------------------------------------------------------

/// Trait for embedding text into vectors.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts (for batch document embedding).
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SynapticError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SynapticError>;
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document with content and metadata, used throughout the retrieval pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Create a document that only carries text, as returned by retrievers.
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(String::new(), content)
    }

    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    /// Text content of the document.
    pub fn text(&self) -> &str {
        &self.content
    }
}

// ---------------------------------------------------------------------------
// Retriever / Indexer traits (implementations live in the integration crates)
// ---------------------------------------------------------------------------

/// Trait for retrieving relevant documents given a query string.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, SynapticError>;
}

/// Trait for persisting documents so a matching [`Retriever`] can find them later.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn index(&self, docs: Vec<Document>) -> Result<(), SynapticError>;
}
