//! MemoryAdapter - BTreeMap-backed document storage.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::conventions::{MemoryConventions, VERSION_FIELD};
use super::session::MemorySession;
use crate::adapter::{BackendKind, DatabaseAdapter, DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::metadata::MetadataTable;
use crate::session::DocumentSession;

/// Internal stored representation of a document.
struct StoredDocument {
    bytes: Vec<u8>,
    version: u64,
}

/// Shared document storage keyed by full id. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub(crate) struct MemoryStorage {
    documents: Arc<RwLock<BTreeMap<String, StoredDocument>>>,
}

impl MemoryStorage {
    fn decode(stored: &StoredDocument) -> Result<RawDocument> {
        let mut raw: RawDocument = serde_json::from_slice(&stored.bytes)?;
        raw.insert(VERSION_FIELD.to_string(), Value::from(stored.version));
        Ok(raw)
    }

    pub(crate) fn get(&self, id: &str) -> Result<Option<RawDocument>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::LockPoisoned("memory read"))?;

        documents.get(id).map(Self::decode).transpose()
    }

    /// Every raw document whose id starts with `prefix`, in id order.
    pub(crate) fn scan(&self, prefix: &str) -> Result<Vec<RawDocument>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::LockPoisoned("memory scan"))?;

        documents
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(_, stored)| Self::decode(stored))
            .collect()
    }

    /// Insert or replace, returning the new version.
    pub(crate) fn put(&self, id: &str, raw: &RawDocument) -> Result<u64> {
        let bytes = serde_json::to_vec(raw)?;

        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::LockPoisoned("memory write"))?;

        let new_version = documents.get(id).map(|s| s.version + 1).unwrap_or(1);

        documents.insert(
            id.to_string(),
            StoredDocument {
                bytes,
                version: new_version,
            },
        );

        Ok(new_version)
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }
}

/// In-memory adapter. Always available, needs no configuration.
///
/// Clones share storage, so a test can keep a handle after handing the
/// adapter to a store.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    storage: MemoryStorage,
    conventions: MemoryConventions,
    metadata: MetadataTable,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all collections.
    pub fn document_count(&self) -> usize {
        self.storage.len()
    }
}

#[async_trait]
impl DatabaseAdapter for MemoryAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn setup(&mut self) -> Result<()> {
        debug!(backend = "memory", "in-memory store ready");
        Ok(())
    }

    async fn teardown(&mut self) -> Result<()> {
        debug!(backend = "memory", "in-memory store released");
        Ok(())
    }

    fn conventions(&self) -> &dyn DocumentConventions {
        &self.conventions
    }

    fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    fn open_session(&self) -> Result<Box<dyn DocumentSession>> {
        Ok(Box::new(MemorySession::new(
            self.storage.clone(),
            self.metadata.clone(),
        )))
    }
}
