use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use sqlx::MySqlConnection;
use synaptic_core::SynapticError;

/// Registry key of the custom vector column type.
pub const VECTOR_TYPE_KEY: &str = "VectorType";

static CUSTOM_TYPES: LazyLock<RwLock<HashMap<&'static str, &'static str>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register a custom column type under `key`, rendered as `sql_type` in DDL.
///
/// Re-registering a key overwrites the previous entry.
pub fn register_column_type(key: &'static str, sql_type: &'static str) {
    let mut types = CUSTOM_TYPES.write().unwrap_or_else(|e| e.into_inner());
    types.insert(key, sql_type);
}

/// Register the `VECTOR` column type. Safe to call any number of times.
pub fn register_vector_type() {
    register_column_type(VECTOR_TYPE_KEY, "VECTOR");
}

/// Look up the SQL type of a registered custom column type.
pub fn registered_column_type(key: &str) -> Option<&'static str> {
    let types = CUSTOM_TYPES.read().unwrap_or_else(|e| e.into_inner());
    types.get(key).copied()
}

// ---------------------------------------------------------------------------
// Column and table descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `VARCHAR(255)`.
    String,
    Text,
    DateTime,
    /// A type added through [`register_column_type`], looked up by key.
    Custom(&'static str),
}

impl ColumnType {
    fn sql(self) -> Result<&'static str, SynapticError> {
        match self {
            ColumnType::String => Ok("VARCHAR(255)"),
            ColumnType::Text => Ok("TEXT"),
            ColumnType::DateTime => Ok("DATETIME"),
            ColumnType::Custom(key) => registered_column_type(key).ok_or_else(|| {
                SynapticError::Schema(format!("column type '{key}' is not registered"))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    const fn new(name: &'static str, ty: ColumnType, nullable: bool, primary_key: bool) -> Self {
        Self {
            name,
            ty,
            nullable,
            primary_key,
        }
    }
}

/// Columns of an embeddings table.
pub const EMBEDDING_COLUMNS: [ColumnDef; 6] = [
    ColumnDef::new("id", ColumnType::String, false, true),
    ColumnDef::new("identifierId", ColumnType::String, false, false),
    ColumnDef::new("text", ColumnType::Text, true, false),
    ColumnDef::new("embedding", ColumnType::Custom(VECTOR_TYPE_KEY), false, false),
    ColumnDef::new("createdAt", ColumnType::DateTime, false, false),
    ColumnDef::new("updatedAt", ColumnType::DateTime, false, false),
];

/// Descriptor of the table backing one logical collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Schema of the embeddings table for `collection`. The table name is
    /// the lower-cased collection name.
    pub fn embeddings(collection: &str) -> Result<Self, SynapticError> {
        let name = collection.to_lowercase();
        validate_table_name(&name)?;
        Ok(Self {
            name,
            columns: EMBEDDING_COLUMNS.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Backtick-quoted table name, safe to interpolate into SQL.
    pub fn quoted_name(&self) -> String {
        format!("`{}`", self.name)
    }

    /// Render the idempotent `CREATE TABLE IF NOT EXISTS` statement.
    pub fn create_table_sql(&self) -> Result<String, SynapticError> {
        let mut defs = Vec::with_capacity(self.columns.len() + 1);
        for column in &self.columns {
            let null = if column.nullable { "" } else { " NOT NULL" };
            defs.push(format!("`{}` {}{}", column.name, column.ty.sql()?, null));
        }

        let keys: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| format!("`{}`", c.name))
            .collect();
        if !keys.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quoted_name(),
            defs.join(", ")
        ))
    }

    /// Create the table when it does not exist yet.
    pub async fn sync(&self, conn: &mut MySqlConnection) -> Result<(), SynapticError> {
        let sql = self.create_table_sql()?;
        sqlx::query(&sql)
            .execute(conn)
            .await
            .map_err(|e| SynapticError::Schema(format!("failed to create table {}: {e}", self.name)))?;
        tracing::debug!(table = %self.name, "tidb: table synced");
        Ok(())
    }
}

/// Validate that a table name is safe to interpolate into SQL.
///
/// Allows alphanumeric ASCII characters and underscores, up to the MySQL
/// identifier limit of 64 characters.
fn validate_table_name(name: &str) -> Result<(), SynapticError> {
    if name.is_empty() {
        return Err(SynapticError::Validation(
            "table name must not be empty".to_string(),
        ));
    }
    if name.len() > 64 {
        return Err(SynapticError::Validation(format!(
            "table name '{name}' exceeds 64 characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SynapticError::Validation(format!(
            "invalid table name '{name}': only alphanumeric and underscore characters are allowed",
        )));
    }
    Ok(())
}
