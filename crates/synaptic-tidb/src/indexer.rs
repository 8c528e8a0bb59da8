use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use synaptic_core::{Document, Indexer, SynapticError};

use crate::client::{EmbeddingRecord, TiDbClient};
use crate::config::{TiDbIndexerOptions, TiDbParams};
use crate::connection::resolve_params;
use crate::embedder::Embedder;
use crate::plugin::action_name;
use crate::schema::TableSchema;
use crate::vector::Vector;

/// Embeds documents and upserts them into a TiDB table.
#[derive(Debug, Clone)]
pub struct TiDbIndexer {
    name: String,
    schema: TableSchema,
    params: Arc<TiDbParams>,
}

impl TiDbIndexer {
    pub fn new(params: TiDbParams) -> Result<Self, SynapticError> {
        Ok(Self {
            name: action_name(&params.table_name),
            schema: TableSchema::embeddings(&params.table_name)?,
            params: Arc::new(params),
        })
    }

    /// Registered name, `tidb/<tableName>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Embed `docs` and store them under `options.identifier_id`.
    ///
    /// Ids are content hashes, so re-indexing an unchanged document
    /// overwrites its row instead of adding another. The batch lands in one
    /// transaction: on error no document of the batch is stored.
    pub async fn index(
        &self,
        docs: Vec<Document>,
        options: &TiDbIndexerOptions,
    ) -> Result<(), SynapticError> {
        options.validate()?;
        if docs.is_empty() {
            return Ok(());
        }

        let connect_params = resolve_params(self.params.client_params.as_ref()).await?;
        let mut client = TiDbClient::connect(&connect_params).await?;
        client.sync(&self.schema).await?;

        let embeddings = embed_all(
            self.params.embedder.as_ref(),
            &docs,
            self.params.embedder_options.as_ref(),
        )
        .await?;

        let records = docs
            .iter()
            .zip(embeddings)
            .map(|(doc, embedding)| {
                Ok(EmbeddingRecord {
                    id: document_id(doc)?,
                    identifier_id: options.identifier_id.clone(),
                    text: Some(doc.text().to_string()),
                    embedding: Vector::from(embedding),
                })
            })
            .collect::<Result<Vec<_>, SynapticError>>()?;

        client.insert_records(&self.schema, &records).await?;
        tracing::debug!(indexer = %self.name, documents = records.len(), "tidb: batch indexed");
        Ok(())
    }

    /// Bind tenant options, yielding a [`synaptic_core::Indexer`].
    pub fn scoped(&self, options: TiDbIndexerOptions) -> ScopedTiDbIndexer {
        ScopedTiDbIndexer {
            indexer: self.clone(),
            options,
        }
    }
}

/// A [`TiDbIndexer`] bound to a single tenant.
#[derive(Debug, Clone)]
pub struct ScopedTiDbIndexer {
    indexer: TiDbIndexer,
    options: TiDbIndexerOptions,
}

#[async_trait]
impl Indexer for ScopedTiDbIndexer {
    async fn index(&self, docs: Vec<Document>) -> Result<(), SynapticError> {
        self.indexer.index(docs, &self.options).await
    }
}

/// Embed every document concurrently. Results keep the input order.
pub(crate) async fn embed_all(
    embedder: &dyn Embedder,
    docs: &[Document],
    options: Option<&Value>,
) -> Result<Vec<Vec<f32>>, SynapticError> {
    try_join_all(docs.iter().map(|doc| embedder.embed(doc, options))).await
}

#[derive(Serialize)]
struct CanonicalDocument<'a> {
    content: &'a str,
    metadata: BTreeMap<&'a str, &'a Value>,
}

/// Content-addressed id: hex MD5 of the document's canonical JSON (content
/// plus metadata with sorted keys). The caller-assigned `id` is not hashed.
pub fn document_id(doc: &Document) -> Result<String, SynapticError> {
    let canonical = CanonicalDocument {
        content: &doc.content,
        metadata: doc.metadata.iter().map(|(k, v)| (k.as_str(), v)).collect(),
    };
    let json = serde_json::to_vec(&canonical)
        .map_err(|e| SynapticError::Indexing(format!("failed to serialize document: {e}")))?;
    Ok(hex::encode(Md5::digest(&json)))
}
