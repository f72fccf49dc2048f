use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::{debug, error, info};

use super::conventions::PostgresConventions;
use super::session::{create_table_sql, PostgresSession, BACKEND};
use crate::adapter::{BackendKind, DatabaseAdapter, DocumentConventions};
use crate::config::{Connection, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::metadata::MetadataTable;
use crate::session::DocumentSession;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgreSQL adapter, one `(id TEXT PRIMARY KEY, data JSONB)` table per
/// collection. Needs host, port, database, username and password; a
/// certificate, when given, is the root CA for `verify-full` TLS.
pub struct PostgresAdapter {
    connection: Connection,
    collections: Vec<String>,
    pool: Option<PgPool>,
    conventions: PostgresConventions,
    metadata: MetadataTable,
}

impl PostgresAdapter {
    pub fn try_create(config: &DatabaseConfig) -> Option<Self> {
        let connection = config.connection(BackendKind::Postgres, true)?;
        Some(Self::new(connection, config.collections.clone()))
    }

    /// `collections` are the tables created at setup.
    pub fn new(connection: Connection, collections: Vec<String>) -> Self {
        Self {
            connection,
            collections,
            pool: None,
            conventions: PostgresConventions,
            metadata: MetadataTable::new(),
        }
    }

    fn options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.connection.host)
            .port(self.connection.port)
            .database(&self.connection.database)
            .application_name(env!("CARGO_PKG_NAME"));

        if let Some(credentials) = &self.connection.credentials {
            options = options
                .username(&credentials.username)
                .password(&credentials.password);
        }

        if let Some(path) = &self.connection.certificate {
            options = options
                .ssl_mode(PgSslMode::VerifyFull)
                .ssl_root_cert(path);
        }

        options
    }

    /// Create the configured tables that do not exist yet.
    async fn bootstrap(&self, pool: &PgPool) -> Result<usize> {
        let connection_error = |e: sqlx::Error| StoreError::Connection {
            backend: BACKEND,
            message: e.to_string(),
        };

        let existing: HashSet<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = current_schema()",
        )
        .fetch_all(pool)
        .await
        .map_err(connection_error)?
        .into_iter()
        .collect();

        let mut created = 0;
        for collection in &self.collections {
            if existing.contains(collection) {
                continue;
            }
            sqlx::query(&create_table_sql(collection))
                .execute(pool)
                .await
                .map_err(connection_error)?;
            debug!(backend = BACKEND, collection = %collection, "created table");
            created += 1;
        }
        Ok(created)
    }

    async fn connect(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(self.options())
            .await
            .map_err(|e| StoreError::Connection {
                backend: BACKEND,
                message: e.to_string(),
            })?;

        let created = self.bootstrap(&pool).await?;
        info!(
            backend = BACKEND,
            database = %self.connection.database,
            created,
            "created {} table(s)",
            created
        );
        Ok(pool)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn setup(&mut self) -> Result<()> {
        match self.connect().await {
            Ok(pool) => {
                self.pool = Some(pool);
                Ok(())
            }
            Err(err) => {
                error!(backend = BACKEND, error = %err, "setup failed");
                Err(err)
            }
        }
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            debug!(backend = BACKEND, "pool closed");
        }
        Ok(())
    }

    fn conventions(&self) -> &dyn DocumentConventions {
        &self.conventions
    }

    fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    fn open_session(&self) -> Result<Box<dyn DocumentSession>> {
        let pool = self.pool.clone().ok_or(StoreError::Connection {
            backend: BACKEND,
            message: "adapter is not set up".into(),
        })?;
        Ok(Box::new(PostgresSession::new(pool, self.metadata.clone())))
    }
}
