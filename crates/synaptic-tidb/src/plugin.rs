use synaptic_core::SynapticError;

use crate::config::TiDbParams;
use crate::indexer::TiDbIndexer;
use crate::retriever::TiDbRetriever;

/// Namespace prefix of every action this plugin registers.
pub const PLUGIN_NAMESPACE: &str = "tidb";

/// `tidb/<tableName>`, the name retrievers and indexers register under.
pub(crate) fn action_name(table_name: &str) -> String {
    format!("{PLUGIN_NAMESPACE}/{table_name}")
}

/// One retriever and one indexer per configured collection.
#[derive(Debug, Clone)]
pub struct TiDbPlugin {
    retrievers: Vec<TiDbRetriever>,
    indexers: Vec<TiDbIndexer>,
}

impl TiDbPlugin {
    pub fn name(&self) -> &'static str {
        PLUGIN_NAMESPACE
    }

    pub fn retrievers(&self) -> &[TiDbRetriever] {
        &self.retrievers
    }

    pub fn indexers(&self) -> &[TiDbIndexer] {
        &self.indexers
    }

    /// Look up a retriever by its `tidb/<tableName>` name.
    pub fn retriever(&self, name: &str) -> Option<&TiDbRetriever> {
        self.retrievers.iter().find(|r| r.name() == name)
    }

    /// Look up an indexer by its `tidb/<tableName>` name.
    pub fn indexer(&self, name: &str) -> Option<&TiDbIndexer> {
        self.indexers.iter().find(|i| i.name() == name)
    }
}

/// Build the plugin from a list of collection configs.
///
/// Fails on the first invalid table name.
pub fn tidb(params: Vec<TiDbParams>) -> Result<TiDbPlugin, SynapticError> {
    let mut retrievers = Vec::with_capacity(params.len());
    let mut indexers = Vec::with_capacity(params.len());
    for p in params {
        retrievers.push(TiDbRetriever::new(p.clone())?);
        indexers.push(TiDbIndexer::new(p)?);
    }
    tracing::debug!(collections = retrievers.len(), "tidb: plugin configured");
    Ok(TiDbPlugin {
        retrievers,
        indexers,
    })
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Name and display label of a registered action, resolvable without
/// building the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub name: String,
    pub label: String,
}

impl ActionRef {
    fn for_table(table_name: &str, display_name: Option<&str>) -> Self {
        Self {
            name: action_name(table_name),
            label: display_name
                .map(str::to_string)
                .unwrap_or_else(|| format!("TiDB - {table_name}")),
        }
    }
}

pub fn tidb_retriever_ref(table_name: &str, display_name: Option<&str>) -> ActionRef {
    ActionRef::for_table(table_name, display_name)
}

pub fn tidb_indexer_ref(table_name: &str, display_name: Option<&str>) -> ActionRef {
    ActionRef::for_table(table_name, display_name)
}
