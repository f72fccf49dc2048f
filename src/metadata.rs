//! Backend metadata kept beside models instead of inside them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, StoreError};

/// Opaque per-document bookkeeping a backend attaches to stored documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMetadata {
    /// Optimistic-concurrency revision token (CouchDB `_rev`).
    Revision(String),
    /// Managed-session change vector (RavenDB `@change-vector`).
    ChangeVector(String),
}

impl BackendMetadata {
    pub fn token(&self) -> &str {
        match self {
            BackendMetadata::Revision(token) | BackendMetadata::ChangeVector(token) => token,
        }
    }
}

/// Side table of backend metadata keyed by full document id.
///
/// Owned by an adapter and shared with its sessions. Clone-friendly via Arc.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    entries: Arc<RwLock<HashMap<String, BackendMetadata>>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Result<Option<BackendMetadata>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned("metadata read"))?;
        Ok(entries.get(id).cloned())
    }

    /// Record metadata for `id`. `None` clears any previous entry.
    pub fn record(&self, id: &str, metadata: Option<BackendMetadata>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("metadata write"))?;
        match metadata {
            Some(metadata) => {
                entries.insert(id.to_string(), metadata);
            }
            None => {
                entries.remove(id);
            }
        }
        Ok(())
    }

    pub fn forget(&self, id: &str) -> Result<()> {
        self.record(id, None)
    }

    pub fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("metadata clear"))?;
        entries.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
