//! DatabaseAdapter - connection lifecycle and session factory per backend.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::memory::MemoryAdapter;
use crate::metadata::{BackendMetadata, MetadataTable};
use crate::model::Document;
use crate::session::DocumentSession;

/// The backend-native shape of a document, as JSON.
///
/// Only adapters and their conventions ever see one.
pub type RawDocument = Map<String, Value>;

/// Which physical store an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    CouchDb,
    MongoDb,
    RavenDb,
    Postgres,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::CouchDb => "couchdb",
            BackendKind::MongoDb => "mongodb",
            BackendKind::RavenDb => "ravendb",
            BackendKind::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps raw backend documents onto [`Document`]s and back.
///
/// The only place backend field names (`_id`, `_rev`, `@metadata`, ...)
/// are known.
pub trait DocumentConventions: Send + Sync {
    /// Recover the document and its backend metadata from a raw document.
    fn instantiate(&self, raw: RawDocument) -> Result<(Document, Option<BackendMetadata>)>;

    /// Build the raw document written for `document`.
    fn to_raw(&self, document: &Document, metadata: Option<&BackendMetadata>) -> RawDocument;
}

/// Connection lifecycle and session factory for one backend.
///
/// Constructed by the backend's `try_create`, connected with [`setup`],
/// shared by every session until [`teardown`].
///
/// [`setup`]: DatabaseAdapter::setup
/// [`teardown`]: DatabaseAdapter::teardown
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Connect and create any missing databases or tables.
    async fn setup(&mut self) -> Result<()>;

    /// Release the connection.
    async fn teardown(&mut self) -> Result<()>;

    fn conventions(&self) -> &dyn DocumentConventions;

    /// Backend metadata recorded for loaded and stored documents.
    fn metadata(&self) -> &MetadataTable;

    /// A fresh unit of work bound to the live connection.
    fn open_session(&self) -> Result<Box<dyn DocumentSession>>;
}

/// Pick the first configured backend, falling back to memory.
///
/// Backends are tried in the order CouchDB, MongoDB, RavenDB, PostgreSQL.
pub fn select_adapter(config: &DatabaseConfig) -> Box<dyn DatabaseAdapter> {
    #[cfg(feature = "couchdb")]
    if let Some(adapter) = crate::couchdb::CouchAdapter::try_create(config) {
        return Box::new(adapter);
    }

    #[cfg(feature = "mongodb")]
    if let Some(adapter) = crate::mongodb::MongoAdapter::try_create(config) {
        return Box::new(adapter);
    }

    #[cfg(feature = "ravendb")]
    if let Some(adapter) = crate::ravendb::RavenAdapter::try_create(config) {
        return Box::new(adapter);
    }

    #[cfg(feature = "postgres")]
    if let Some(adapter) = crate::postgres::PostgresAdapter::try_create(config) {
        return Box::new(adapter);
    }

    info!("no database backend configured, using in-memory store");
    Box::new(MemoryAdapter::new())
}
