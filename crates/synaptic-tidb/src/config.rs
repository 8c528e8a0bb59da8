use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use synaptic_core::SynapticError;

use crate::connection::ClientParams;
use crate::distance::DistanceMethod;
use crate::embedder::Embedder;

// ---------------------------------------------------------------------------
// TiDbParams
// ---------------------------------------------------------------------------

/// Everything needed to serve one logical collection: where the database
/// is, which table holds the collection, and how to embed content.
#[derive(Clone)]
pub struct TiDbParams {
    /// Connection parameters; local defaults are used when `None`.
    pub client_params: Option<ClientParams>,
    /// Logical collection name. The backing table is its lower-cased form.
    pub table_name: String,
    pub embedder: Arc<dyn Embedder>,
    /// Passed to the embedder on every call.
    pub embedder_options: Option<Value>,
}

impl TiDbParams {
    pub fn new(table_name: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            client_params: None,
            table_name: table_name.into(),
            embedder,
            embedder_options: None,
        }
    }

    pub fn with_client_params(mut self, params: impl Into<ClientParams>) -> Self {
        self.client_params = Some(params.into());
        self
    }

    pub fn with_embedder_options(mut self, options: Value) -> Self {
        self.embedder_options = Some(options);
        self
    }
}

impl fmt::Debug for TiDbParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiDbParams")
            .field("client_params", &self.client_params)
            .field("table_name", &self.table_name)
            .field("embedder_options", &self.embedder_options)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Call options
// ---------------------------------------------------------------------------

/// Options for a single retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiDbRetrieverOptions {
    /// Maximum number of documents. `None` returns every document of the
    /// tenant, nearest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    /// Tenant to search within.
    pub identifier_id: String,
    /// Ranking function; cosine distance when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_method: Option<DistanceMethod>,
}

impl TiDbRetrieverOptions {
    pub fn new(identifier_id: impl Into<String>) -> Self {
        Self {
            k: None,
            identifier_id: identifier_id.into(),
            distance_method: None,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_distance_method(mut self, method: DistanceMethod) -> Self {
        self.distance_method = Some(method);
        self
    }

    /// Parse options passed by a host as JSON.
    pub fn from_value(value: Value) -> Result<Self, SynapticError> {
        let options: Self = parse_options(value)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), SynapticError> {
        require_identifier(&self.identifier_id)
    }

    pub fn distance_method(&self) -> DistanceMethod {
        self.distance_method.unwrap_or_default()
    }
}

/// Options for a single indexing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiDbIndexerOptions {
    /// Tenant that owns the indexed documents.
    pub identifier_id: String,
}

impl TiDbIndexerOptions {
    pub fn new(identifier_id: impl Into<String>) -> Self {
        Self {
            identifier_id: identifier_id.into(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, SynapticError> {
        let options: Self = parse_options(value)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), SynapticError> {
        require_identifier(&self.identifier_id)
    }
}

fn parse_options<T: DeserializeOwned>(value: Value) -> Result<T, SynapticError> {
    serde_json::from_value(value).map_err(|e| SynapticError::Validation(format!("invalid options: {e}")))
}

fn require_identifier(identifier_id: &str) -> Result<(), SynapticError> {
    if identifier_id.is_empty() {
        return Err(SynapticError::Validation(
            "identifierId must not be empty".to_string(),
        ));
    }
    Ok(())
}
