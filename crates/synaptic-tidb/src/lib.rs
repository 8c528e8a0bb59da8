//! TiDB vector search integration for the Synaptic framework.
//!
//! This crate provides a [`TiDbIndexer`] that embeds documents and upserts
//! them into a TiDB table with a `VECTOR` column, and a [`TiDbRetriever`]
//! that answers nearest-neighbour queries with one of TiDB's vector distance
//! functions. Every row belongs to a tenant (`identifierId`) and every query
//! is filtered to one tenant.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use synaptic_tidb::{
//!     tidb, DistanceMethod, Document, Embedder, TiDbConnectParams, TiDbIndexerOptions,
//!     TiDbParams, TiDbRetrieverOptions,
//! };
//!
//! # async fn example(embedder: Arc<dyn Embedder>) -> Result<(), Box<dyn std::error::Error>> {
//! let connection = TiDbConnectParams::new("gateway01.us-west-2.prod.aws.tidbcloud.com")
//!     .with_user("app.root")
//!     .with_password("secret");
//! let plugin = tidb(vec![
//!     TiDbParams::new("articles", embedder).with_client_params(connection),
//! ])?;
//!
//! let indexer = plugin.indexer("tidb/articles").unwrap();
//! indexer
//!     .index(vec![Document::new("", "TiDB speaks MySQL")], &TiDbIndexerOptions::new("tenant-a"))
//!     .await?;
//!
//! let retriever = plugin.retriever("tidb/articles").unwrap();
//! let docs = retriever
//!     .retrieve_documents(
//!         &Document::from_text("MySQL compatible databases"),
//!         &TiDbRetrieverOptions::new("tenant-a")
//!             .with_k(3)
//!             .with_distance_method(DistanceMethod::L2),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connection;
mod distance;
mod embedder;
mod indexer;
mod plugin;
mod retriever;
mod schema;
mod vector;

pub use client::{EmbeddingRecord, InsertParams, QueryParams, QueryResponse, TiDbClient};
pub use config::{TiDbIndexerOptions, TiDbParams, TiDbRetrieverOptions};
pub use connection::{connect, ClientParams, TiDbConnectParams};
pub use distance::DistanceMethod;
pub use embedder::{Embedder, EmbeddingsEmbedder};
pub use indexer::{document_id, ScopedTiDbIndexer, TiDbIndexer};
pub use plugin::{tidb, tidb_indexer_ref, tidb_retriever_ref, ActionRef, TiDbPlugin, PLUGIN_NAMESPACE};
pub use retriever::{ScopedTiDbRetriever, TiDbRetriever};
pub use schema::{
    register_column_type, register_vector_type, registered_column_type, ColumnDef, ColumnType,
    TableSchema, VECTOR_TYPE_KEY,
};
pub use vector::{to_literal, Vector};

// Re-export core traits/types for convenience.
pub use synaptic_core::{Document, Embeddings, Indexer, Retriever, SynapticError};
