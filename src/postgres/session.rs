use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::conventions::{PostgresConventions, DATA_COLUMN, ID_COLUMN};
use super::query::PostgresQuery;
use crate::adapter::DocumentConventions;
use crate::error::{Result, StoreError};
use crate::id::decompose_id;
use crate::metadata::MetadataTable;
use crate::model::Document;
use crate::query::DocumentQuery;
use crate::session::{group_by_collection, tabulate, DocumentSession};

pub(crate) const BACKEND: &str = "postgres";

/// SQLSTATE for a missing table.
const UNDEFINED_TABLE: &str = "42P01";

/// Quoted table name for a collection.
pub(crate) fn table(collection: &str) -> String {
    format!("\"{}\"", collection.replace('"', "\"\""))
}

pub(crate) fn create_table_sql(collection: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY, {} JSONB NOT NULL)",
        table(collection),
        ID_COLUMN,
        DATA_COLUMN
    )
}

/// SQLSTATE for a duplicate primary key.
const UNIQUE_VIOLATION: &str = "23505";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Reads of a collection that was never bootstrapped find nothing.
pub(crate) fn is_undefined_table(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(UNDEFINED_TABLE)
}

/// The statement a store issues once the existence check has answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WritePlan {
    Update,
    Insert,
    /// The collection's table is missing: create it, then insert.
    CreateTableThenInsert,
}

/// Decide how to store a document from the outcome of the existence check.
/// Errors other than a missing table are handed back untouched.
fn plan_write<E>(
    existence: std::result::Result<bool, E>,
    code: impl Fn(&E) -> Option<String>,
) -> std::result::Result<WritePlan, E> {
    match existence {
        Ok(true) => Ok(WritePlan::Update),
        Ok(false) => Ok(WritePlan::Insert),
        Err(err) if code(&err).as_deref() == Some(UNDEFINED_TABLE) => {
            Ok(WritePlan::CreateTableThenInsert)
        }
        Err(err) => Err(err),
    }
}

/// A duplicate key on insert means a concurrent writer created the row
/// between the existence check and the insert; its version stands.
fn lost_insert_race(code: Option<&str>) -> bool {
    code == Some(UNIQUE_VIOLATION)
}

pub struct PostgresSession {
    pool: PgPool,
    conventions: PostgresConventions,
    metadata: MetadataTable,
}

impl PostgresSession {
    pub(crate) fn new(pool: PgPool, metadata: MetadataTable) -> Self {
        Self {
            pool,
            conventions: PostgresConventions,
            metadata,
        }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn instantiate(&self, row: PgRow) -> Result<Document> {
        let id: String = row
            .try_get(ID_COLUMN)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let data: Value = row
            .try_get(DATA_COLUMN)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;

        let (document, metadata) = self.conventions.instantiate(self.conventions.row(id, data))?;
        self.metadata.record(document.id(), metadata)?;
        Ok(document)
    }

    async fn exists(&self, collection: &str, id: &str) -> std::result::Result<bool, sqlx::Error> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            table(collection),
            ID_COLUMN
        );
        sqlx::query_scalar(&sql).bind(id).fetch_one(&self.pool).await
    }

    async fn insert(&self, collection: &str, id: &str, data: &Value) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ($1, $2)",
            table(collection),
            ID_COLUMN,
            DATA_COLUMN
        );
        match sqlx::query(&sql).bind(id).bind(data).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(err) if lost_insert_race(sqlstate(&err).as_deref()) => {
                debug!(
                    backend = BACKEND,
                    id,
                    "duplicate key on insert, another writer won"
                );
                Ok(())
            }
            Err(err) => Err(StoreError::driver(BACKEND, "store", id, err)),
        }
    }

    async fn update(&self, collection: &str, id: &str, data: &Value) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET {} = $2 WHERE {} = $1",
            table(collection),
            DATA_COLUMN,
            ID_COLUMN
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::driver(BACKEND, "store", id, e))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentSession for PostgresSession {
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>> {
        let (collection, _) = decompose_id(id)?;
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} = $1",
            ID_COLUMN,
            DATA_COLUMN,
            table(&collection),
            ID_COLUMN
        );

        match sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await {
            Ok(row) => row.map(|row| self.instantiate(row)).transpose(),
            Err(err) if is_undefined_table(&err) => Ok(None),
            Err(err) => Err(StoreError::driver(BACKEND, "load", id, err)),
        }
    }

    async fn load_documents(&mut self, ids: &[String]) -> Result<Vec<Option<Document>>> {
        let mut found = Vec::with_capacity(ids.len());
        for (collection, wanted) in group_by_collection(ids)? {
            let sql = format!(
                "SELECT {}, {} FROM {} WHERE {} = ANY($1)",
                ID_COLUMN,
                DATA_COLUMN,
                table(&collection),
                ID_COLUMN
            );

            let rows = match sqlx::query(&sql).bind(wanted).fetch_all(&self.pool).await {
                Ok(rows) => rows,
                Err(err) if is_undefined_table(&err) => Vec::new(),
                Err(err) => return Err(StoreError::driver(BACKEND, "load_many", &collection, err)),
            };
            for row in rows {
                found.push(self.instantiate(row)?);
            }
        }

        Ok(tabulate(ids, found))
    }

    async fn store_document(&mut self, document: Document) -> Result<()> {
        let id = document.id();
        let collection = document.collection();
        let data = Value::Object(document.data().clone());

        let plan = plan_write(self.exists(collection, id).await, sqlstate)
            .map_err(|err| StoreError::driver(BACKEND, "store", id, err))?;

        match plan {
            WritePlan::Update => self.update(collection, id, &data).await,
            WritePlan::Insert => self.insert(collection, id, &data).await,
            WritePlan::CreateTableThenInsert => {
                sqlx::query(&create_table_sql(collection))
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::driver(BACKEND, "store", id, e))?;
                info!(backend = BACKEND, collection, "created 1 table(s)");
                self.insert(collection, id, &data).await
            }
        }
    }

    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_> {
        Box::new(PostgresQuery::new(self, collection))
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}
