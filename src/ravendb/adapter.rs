use async_trait::async_trait;
use tracing::{error, info};

use super::client::{RavenClient, BACKEND};
use super::conventions::RavenConventions;
use super::session::RavenSession;
use crate::adapter::{BackendKind, DatabaseAdapter, DocumentConventions};
use crate::config::{Connection, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::metadata::MetadataTable;
use crate::session::DocumentSession;

/// RavenDB adapter. Needs host, port and database. A certificate, when
/// given, is a PEM client identity (certificate and private key) and
/// switches the connection to https.
pub struct RavenAdapter {
    connection: Connection,
    client: Option<RavenClient>,
    conventions: RavenConventions,
    metadata: MetadataTable,
}

impl RavenAdapter {
    pub fn try_create(config: &DatabaseConfig) -> Option<Self> {
        let connection = config.connection(BackendKind::RavenDb, false)?;
        Some(Self::new(connection))
    }

    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            client: None,
            conventions: RavenConventions,
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
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| StoreError::Connection {
                backend: BACKEND,
                message: format!("parsing client identity {}: {}", path.display(), e),
            })?;
            builder = builder.identity(identity);
        }
        builder.build().map_err(|e| StoreError::Connection {
            backend: BACKEND,
            message: e.to_string(),
        })
    }

    async fn connect(&self) -> Result<RavenClient> {
        let client = RavenClient::new(
            self.http_client().await?,
            &self.connection.http_base(),
            &self.connection.database,
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
impl DatabaseAdapter for RavenAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::RavenDb
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
        Ok(Box::new(RavenSession::new(client, self.metadata.clone())))
    }
}
