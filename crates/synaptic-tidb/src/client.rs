use std::collections::HashMap;
use std::fmt;

use sqlx::{Connection, MySql, MySqlConnection, QueryBuilder};
use synaptic_core::SynapticError;

use crate::connection::{connect, TiDbConnectParams};
use crate::distance::DistanceMethod;
use crate::schema::TableSchema;
use crate::vector::Vector;

/// Rows per `INSERT` statement; four bound parameters each keeps a chunk far
/// below the 65535 placeholder limit of the MySQL protocol.
const INSERT_CHUNK_ROWS: usize = 1000;

/// One row of an embeddings table.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub identifier_id: String,
    pub text: Option<String>,
    pub embedding: Vector,
}

/// Parallel columns for a bulk insert under a single tenant.
#[derive(Debug, Clone, Default)]
pub struct InsertParams {
    pub identifier_id: String,
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<Option<String>>,
}

impl InsertParams {
    fn into_records(self) -> Result<Vec<EmbeddingRecord>, SynapticError> {
        let n = self.ids.len();
        if self.embeddings.len() != n || self.documents.len() != n {
            return Err(SynapticError::Validation(format!(
                "insert columns differ in length: {} ids, {} embeddings, {} documents",
                n,
                self.embeddings.len(),
                self.documents.len()
            )));
        }

        Ok(self
            .ids
            .into_iter()
            .zip(self.embeddings)
            .zip(self.documents)
            .map(|((id, embedding), text)| EmbeddingRecord {
                id,
                identifier_id: self.identifier_id.clone(),
                text,
                embedding: Vector::from(embedding),
            })
            .collect())
    }
}

/// A nearest-neighbour query within one tenant.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub query_embedding: Vec<f32>,
    pub identifier_id: String,
    /// Maximum number of rows. `None` returns every row of the tenant.
    pub n_results: Option<usize>,
    pub distance_method: DistanceMethod,
}

/// Query results as parallel columns, nearest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<Option<String>>,
    pub distances: Vec<f64>,
}

/// Thin client over one authenticated TiDB connection.
pub struct TiDbClient {
    conn: MySqlConnection,
}

impl fmt::Debug for TiDbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiDbClient").finish_non_exhaustive()
    }
}

impl TiDbClient {
    pub fn new(conn: MySqlConnection) -> Self {
        Self { conn }
    }

    /// Connect with `params`, registering the vector column type.
    pub async fn connect(params: &TiDbConnectParams) -> Result<Self, SynapticError> {
        Ok(Self::new(connect(params).await?))
    }

    /// Return the underlying connection.
    pub fn connection(&mut self) -> &mut MySqlConnection {
        &mut self.conn
    }

    /// Create the table behind `schema` if it is missing.
    pub async fn sync(&mut self, schema: &TableSchema) -> Result<(), SynapticError> {
        schema.sync(&mut self.conn).await
    }

    /// Upsert a batch of records in a single transaction.
    ///
    /// Either every row is written or none is. Re-writing a row owned by the
    /// same tenant replaces its text, embedding and `updatedAt`; a row owned
    /// by another tenant fails the whole batch.
    pub async fn add(&mut self, schema: &TableSchema, params: InsertParams) -> Result<(), SynapticError> {
        let records = params.into_records()?;
        self.insert_records(schema, &records).await
    }

    pub async fn insert_records(
        &mut self,
        schema: &TableSchema,
        records: &[EmbeddingRecord],
    ) -> Result<(), SynapticError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| SynapticError::Indexing(format!("failed to begin transaction: {e}")))?;

        let mut existing = Vec::new();
        for chunk in records.chunks(INSERT_CHUNK_ROWS) {
            let rows: Vec<(String, String)> = owner_builder(schema, chunk)
                .build_query_as()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| SynapticError::Indexing(format!("ownership check failed: {e}")))?;
            existing.extend(rows);
        }
        let foreign = foreign_owned_ids(records, &existing);
        if !foreign.is_empty() {
            return Err(SynapticError::Indexing(format!(
                "duplicate entry for primary key: ids already owned by another identifierId: {}",
                foreign.join(", ")
            )));
        }

        for chunk in records.chunks(INSERT_CHUNK_ROWS) {
            let mut builder = insert_builder(schema, chunk);
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| SynapticError::Indexing(format!("bulk insert failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| SynapticError::Indexing(format!("failed to commit bulk insert: {e}")))?;

        tracing::debug!(table = %schema.name(), rows = records.len(), "tidb: records upserted");
        Ok(())
    }

    /// Rank the tenant's rows by distance to the query embedding.
    pub async fn query(
        &mut self,
        schema: &TableSchema,
        params: QueryParams,
    ) -> Result<QueryResponse, SynapticError> {
        let sql = query_sql(schema, params.distance_method, params.n_results.is_some());

        let mut query = sqlx::query_as::<_, (String, Option<String>, Vector, f64)>(&sql)
            .bind(Vector::from(params.query_embedding))
            .bind(params.identifier_id);
        if let Some(limit) = params.n_results {
            query = query.bind(limit as u64);
        }

        let rows = query
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| SynapticError::Query(format!("similarity search failed: {e}")))?;

        tracing::debug!(
            table = %schema.name(),
            method = %params.distance_method,
            rows = rows.len(),
            "tidb: similarity search"
        );

        let mut response = QueryResponse::default();
        for (id, text, embedding, distance) in rows {
            response.ids.push(id);
            response.documents.push(text);
            response.embeddings.push(embedding.into_inner());
            response.distances.push(distance);
        }
        Ok(response)
    }
}

/// `SELECT id, identifierId` of the rows that already hold ids from `chunk`.
fn owner_builder<'a>(schema: &TableSchema, chunk: &'a [EmbeddingRecord]) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT `id`, `identifierId` FROM {} WHERE `id` IN (",
        schema.quoted_name()
    ));
    let mut ids = builder.separated(", ");
    for record in chunk {
        ids.push_bind(&record.id);
    }
    ids.push_unseparated(")");
    builder
}

/// Ids in `records` whose stored row belongs to a different tenant.
fn foreign_owned_ids(records: &[EmbeddingRecord], existing: &[(String, String)]) -> Vec<String> {
    let owners: HashMap<&str, &str> = existing
        .iter()
        .map(|(id, owner)| (id.as_str(), owner.as_str()))
        .collect();
    let mut foreign: Vec<String> = records
        .iter()
        .filter(|r| owners.get(r.id.as_str()).is_some_and(|owner| *owner != r.identifier_id))
        .map(|r| r.id.clone())
        .collect();
    foreign.sort();
    foreign.dedup();
    foreign
}

fn insert_builder<'a>(schema: &TableSchema, chunk: &'a [EmbeddingRecord]) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} (`id`, `identifierId`, `text`, `embedding`, `createdAt`, `updatedAt`) ",
        schema.quoted_name()
    ));
    builder.push_values(chunk, |mut row, record| {
        row.push_bind(&record.id)
            .push_bind(&record.identifier_id)
            .push_bind(&record.text)
            .push_bind(&record.embedding)
            .push("NOW()")
            .push("NOW()");
    });
    builder.push(
        " ON DUPLICATE KEY UPDATE `text` = VALUES(`text`), \
         `embedding` = VALUES(`embedding`), `updatedAt` = VALUES(`updatedAt`)",
    );
    builder
}

/// Ranking query. Placeholders: query vector, tenant, then the limit when
/// `limited` is set.
fn query_sql(schema: &TableSchema, method: DistanceMethod, limited: bool) -> String {
    let mut sql = format!(
        "SELECT `id`, `text`, VEC_AS_TEXT(`embedding`) AS `embedding`, \
         {func}(`embedding`, ?) AS `distance` \
         FROM {table} WHERE `identifierId` = ? ORDER BY `distance` ASC",
        func = method.function_name(),
        table = schema.quoted_name(),
    );
    if limited {
        sql.push_str(" LIMIT ?");
    }
    sql
}
