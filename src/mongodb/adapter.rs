use async_trait::async_trait;
use bson::doc;
use ::mongodb::options::{ClientOptions, Credential, ServerAddress, Tls, TlsOptions};
use ::mongodb::Client;
use tracing::{debug, error, info};

use super::conventions::MongoConventions;
use super::session::{MongoSession, BACKEND};
use crate::adapter::{BackendKind, DatabaseAdapter, DocumentConventions};
use crate::config::{Connection, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::metadata::MetadataTable;
use crate::session::DocumentSession;

/// MongoDB adapter. Needs host, port, database, username and password; a
/// certificate, when given, enables TLS with it as the CA file.
pub struct MongoAdapter {
    connection: Connection,
    client: Option<Client>,
    conventions: MongoConventions,
    metadata: MetadataTable,
}

impl MongoAdapter {
    pub fn try_create(config: &DatabaseConfig) -> Option<Self> {
        let connection = config.connection(BackendKind::MongoDb, true)?;
        Some(Self::new(connection))
    }

    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            client: None,
            conventions: MongoConventions,
            metadata: MetadataTable::new(),
        }
    }

    fn options(&self) -> ClientOptions {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: self.connection.host.clone(),
            port: Some(self.connection.port),
        }];
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        if let Some(credentials) = &self.connection.credentials {
            options.credential = Some(
                Credential::builder()
                    .username(credentials.username.clone())
                    .password(credentials.password.clone())
                    .build(),
            );
        }

        if let Some(path) = &self.connection.certificate {
            options.tls = Some(Tls::Enabled(
                TlsOptions::builder().ca_file_path(path.clone()).build(),
            ));
        }

        options
    }

    async fn connect(&self) -> Result<Client> {
        let connection_error = |e: ::mongodb::error::Error| StoreError::Connection {
            backend: BACKEND,
            message: e.to_string(),
        };

        let client = Client::with_options(self.options()).map_err(connection_error)?;
        // The driver connects lazily; ping so a bad server fails setup.
        client
            .database(&self.connection.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;

        info!(
            backend = BACKEND,
            host = %self.connection.host,
            database = %self.connection.database,
            "connected"
        );
        Ok(client)
    }
}

#[async_trait]
impl DatabaseAdapter for MongoAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDb
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
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!(backend = BACKEND, "client shut down");
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
        let client = self.client.as_ref().ok_or(StoreError::Connection {
            backend: BACKEND,
            message: "adapter is not set up".into(),
        })?;
        let database = client.database(&self.connection.database);
        Ok(Box::new(MongoSession::new(database, self.metadata.clone())))
    }
}
