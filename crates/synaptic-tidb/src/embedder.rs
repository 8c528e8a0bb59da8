use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use synaptic_core::{Document, Embeddings, SynapticError};

/// Anything that can turn a document into a vector.
///
/// `options` are the per-registration embedder options, passed unchanged on
/// every call. Errors are surfaced to the caller as-is.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, content: &Document, options: Option<&Value>) -> Result<Vec<f32>, SynapticError>;
}

/// Adapts a [`synaptic_core::Embeddings`] provider to [`Embedder`].
///
/// The provider embeds the document text through `embed_query`; embedder
/// options are ignored since `Embeddings` carries its own configuration.
#[derive(Clone)]
pub struct EmbeddingsEmbedder {
    inner: Arc<dyn Embeddings>,
}

impl EmbeddingsEmbedder {
    pub fn new(inner: Arc<dyn Embeddings>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Embedder for EmbeddingsEmbedder {
    async fn embed(&self, content: &Document, _options: Option<&Value>) -> Result<Vec<f32>, SynapticError> {
        self.inner.embed_query(content.text()).await
    }
}

impl From<Arc<dyn Embeddings>> for EmbeddingsEmbedder {
    fn from(inner: Arc<dyn Embeddings>) -> Self {
        Self::new(inner)
    }
}
