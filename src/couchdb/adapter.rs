use async_trait::async_trait;
use tracing::{error, info};

use super::client::{CouchClient, BACKEND};
use super::conventions::CouchConventions;
use super::session::CouchSession;
use crate::adapter::{BackendKind, DatabaseAdapter, DocumentConventions};
use crate::config::{Connection, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::metadata::MetadataTable;
use crate::session::DocumentSession;

/// CouchDB adapter. Needs host, port, database, username and password; a
/// certificate, when given, is trusted as the server's CA.
pub struct CouchAdapter {
    connection: Connection,
    client: Option<CouchClient>,
    conventions: CouchConventions,
    metadata: MetadataTable,
}

impl CouchAdapter {
    pub fn try_create(config: &DatabaseConfig) -> Option<Self> {
        let connection = config.connection(BackendKind::CouchDb, true)?;
        Some(Self::new(connection))
    }

    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            client: None,
            conventions: CouchConventions,
            metadata: MetadataTable::new(),
        }
    }

    async fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(path) = &self.connection.certificate {
            let pem = tokio::fs::read(path).await.map_err(|e| StoreError::Connection {
                backend: BACKEND,
                message: format!("reading certificate {}: {}", path.display(), e),
            })?;
            let certificate =
                reqwest::Certificate::from_pem(&pem).map_err(|e| StoreError::Connection {
                    backend: BACKEND,
                    message: format!("parsing certificate {}: {}", path.display(), e),
                })?;
            builder = builder.add_root_certificate(certificate);
        }
        builder.build().map_err(|e| StoreError::Connection {
            backend: BACKEND,
            message: e.to_string(),
        })
    }

    async fn connect(&self) -> Result<CouchClient> {
        let client = CouchClient::new(
            self.http_client().await?,
            &self.connection.http_base(),
            &self.connection.database,
            self.connection.credentials.clone(),
        )?;

        let created = usize::from(client.ensure_database().await?);
        info!(
            backend = BACKEND,
            database = %self.connection.database,
            created,
            "created {} database(s)",
            created
        );
        Ok(client)
    }
}

#[async_trait]
impl DatabaseAdapter for CouchAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::CouchDb
    }

    async fn setup(&mut self) -> Result<()> {
        match self.connect().await {
            Ok(client) => {
                self.client = Some(client);
                Ok(())
            }
            Err(err) => {
                error!(backend = BACKEND, error = %err, "setup failed");
                Err(err)
            }
        }
    }

    async fn teardown(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }

    fn conventions(&self) -> &dyn DocumentConventions {
        &self.conventions
    }

    fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    fn open_session(&self) -> Result<Box<dyn DocumentSession>> {
        let client = self.client.clone().ok_or(StoreError::Connection {
            backend: BACKEND,
            message: "adapter is not set up".into(),
        })?;
        Ok(Box::new(CouchSession::new(client, self.metadata.clone())))
    }
}
