//! DocumentCache - process-wide cache of typed models keyed by full id.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, StoreError};
use crate::id::matches_partial_id;
use crate::model::Model;

type Entry = Arc<dyn Any + Send + Sync>;

/// Holds `Arc<M>` per id so every reader shares one instance.
#[derive(Clone, Default)]
pub struct DocumentCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<M: Model>(&self, id: &str) -> Result<Option<Arc<M>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned("cache read"))?;

        Ok(entries
            .get(id)
            .and_then(|entry| Arc::clone(entry).downcast::<M>().ok()))
    }

    pub fn insert<M: Model>(&self, id: String, model: Arc<M>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("cache write"))?;
        entries.insert(id, model);
        Ok(())
    }

    /// Remove an entry. Returns true if it was cached.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("cache write"))?;
        Ok(entries.remove(id).is_some())
    }

    /// Every cached `M` whose id is covered by `partial`, in id order.
    pub fn matching<M: Model>(&self, partial: &str) -> Result<Vec<Arc<M>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned("cache read"))?;

        let mut matching: Vec<(&String, Arc<M>)> = entries
            .iter()
            .filter(|(id, _)| matches_partial_id(id, partial))
            .filter_map(|(id, entry)| {
                Arc::clone(entry)
                    .downcast::<M>()
                    .ok()
                    .map(|model| (id, model))
            })
            .collect();
        matching.sort_by(|a, b| a.0.cmp(b.0));

        Ok(matching.into_iter().map(|(_, model)| model).collect())
    }

    pub fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("cache clear"))?;
        entries.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
