use async_trait::async_trait;

use super::adapter::MemoryStorage;
use super::conventions::MemoryConventions;
use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::Result;
use crate::id::{decompose_id, COLLECTION_SEPARATOR};
use crate::metadata::{BackendMetadata, MetadataTable};
use crate::model::Document;
use crate::query::{matches_all, DocumentQuery, Filter};
use crate::session::{check_ids, tabulate, DocumentSession};

pub struct MemorySession {
    storage: MemoryStorage,
    metadata: MetadataTable,
    conventions: MemoryConventions,
}

impl MemorySession {
    pub(crate) fn new(storage: MemoryStorage, metadata: MetadataTable) -> Self {
        Self {
            storage,
            metadata,
            conventions: MemoryConventions,
        }
    }

    fn instantiate(&self, raw: RawDocument) -> Result<Document> {
        let (document, metadata) = self.conventions.instantiate(raw)?;
        self.metadata.record(document.id(), metadata)?;
        Ok(document)
    }
}

#[async_trait]
impl DocumentSession for MemorySession {
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>> {
        decompose_id(id)?;
        match self.storage.get(id)? {
            Some(raw) => Ok(Some(self.instantiate(raw)?)),
            None => Ok(None),
        }
    }

    async fn load_documents(&mut self, ids: &[String]) -> Result<Vec<Option<Document>>> {
        check_ids(ids)?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(raw) = self.storage.get(id)? {
                found.push(self.instantiate(raw)?);
            }
        }
        Ok(tabulate(ids, found))
    }

    async fn store_document(&mut self, document: Document) -> Result<()> {
        let raw = self.conventions.to_raw(&document, None);
        let version = self.storage.put(document.id(), &raw)?;
        self.metadata.record(
            document.id(),
            Some(BackendMetadata::Revision(version.to_string())),
        )
    }

    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_> {
        Box::new(MemoryQuery {
            session: self,
            collection: collection.to_string(),
            filters: Vec::new(),
        })
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Full scan of one collection, filtered client-side.
pub struct MemoryQuery<'s> {
    session: &'s MemorySession,
    collection: String,
    filters: Vec<Filter>,
}

#[async_trait]
impl DocumentQuery for MemoryQuery<'_> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    async fn execute(self: Box<Self>) -> Result<Vec<Document>> {
        let prefix = format!("{}{}", self.collection, COLLECTION_SEPARATOR);
        let mut results = Vec::new();

        for raw in self.session.storage.scan(&prefix)? {
            let document = self.session.instantiate(raw)?;
            if matches_all(&self.filters, &document) {
                results.push(document);
            }
        }

        Ok(results)
    }
}
