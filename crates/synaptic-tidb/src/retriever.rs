use std::sync::Arc;

use async_trait::async_trait;
use synaptic_core::{Document, Retriever, SynapticError};

use crate::client::{QueryParams, QueryResponse, TiDbClient};
use crate::config::{TiDbParams, TiDbRetrieverOptions};
use crate::connection::resolve_params;
use crate::plugin::action_name;
use crate::schema::TableSchema;

/// Nearest-neighbour retrieval over a TiDB table, scoped to one tenant per
/// call.
#[derive(Debug, Clone)]
pub struct TiDbRetriever {
    name: String,
    schema: TableSchema,
    params: Arc<TiDbParams>,
}

impl TiDbRetriever {
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

    /// Return the tenant's documents closest to `query`, nearest first.
    ///
    /// Only the stored text comes back; ids, embeddings and distances are
    /// dropped. Use [`query`](Self::query) to keep them.
    pub async fn retrieve_documents(
        &self,
        query: &Document,
        options: &TiDbRetrieverOptions,
    ) -> Result<Vec<Document>, SynapticError> {
        let response = self.query(query, options).await?;
        Ok(into_documents(response))
    }

    /// Like [`retrieve_documents`](Self::retrieve_documents), returning the
    /// full result columns.
    pub async fn query(
        &self,
        query: &Document,
        options: &TiDbRetrieverOptions,
    ) -> Result<QueryResponse, SynapticError> {
        options.validate()?;

        let embedding = self
            .params
            .embedder
            .embed(query, self.params.embedder_options.as_ref())
            .await?;

        let connect_params = resolve_params(self.params.client_params.as_ref()).await?;
        let mut client = TiDbClient::connect(&connect_params).await?;

        client
            .query(
                &self.schema,
                QueryParams {
                    query_embedding: embedding,
                    identifier_id: options.identifier_id.clone(),
                    n_results: options.k,
                    distance_method: options.distance_method(),
                },
            )
            .await
    }

    /// Bind tenant options, yielding a [`synaptic_core::Retriever`].
    pub fn scoped(&self, options: TiDbRetrieverOptions) -> ScopedTiDbRetriever {
        ScopedTiDbRetriever {
            retriever: self.clone(),
            options,
        }
    }
}

/// A [`TiDbRetriever`] bound to a single tenant and ranking setup.
///
/// A positive `top_k` passed to [`Retriever::retrieve`] overrides the bound
/// `k`; zero keeps it.
#[derive(Debug, Clone)]
pub struct ScopedTiDbRetriever {
    retriever: TiDbRetriever,
    options: TiDbRetrieverOptions,
}

#[async_trait]
impl Retriever for ScopedTiDbRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, SynapticError> {
        let mut options = self.options.clone();
        if top_k > 0 {
            options.k = Some(top_k);
        }
        self.retriever
            .retrieve_documents(&Document::from_text(query), &options)
            .await
    }
}

/// Null text becomes an empty document.
fn into_documents(response: QueryResponse) -> Vec<Document> {
    response
        .documents
        .into_iter()
        .map(|text| Document::from_text(text.unwrap_or_default()))
        .collect()
}
