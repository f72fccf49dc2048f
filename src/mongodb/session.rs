use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use ::mongodb::{Collection, Database};

use super::conventions::{MongoConventions, ID_FIELD};
use super::query::MongoQuery;
use crate::adapter::DocumentConventions;
use crate::error::{Result, StoreError};
use crate::id::decompose_id;
use crate::metadata::MetadataTable;
use crate::model::Document;
use crate::query::DocumentQuery;
use crate::session::{group_by_collection, tabulate, DocumentSession};

pub(crate) const BACKEND: &str = "mongodb";

pub struct MongoSession {
    database: Database,
    conventions: MongoConventions,
    metadata: MetadataTable,
}

impl MongoSession {
    pub(crate) fn new(database: Database, metadata: MetadataTable) -> Self {
        Self {
            database,
            conventions: MongoConventions,
            metadata,
        }
    }

    pub(crate) fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.database.collection(name)
    }

    pub(crate) fn instantiate(&self, stored: bson::Document) -> Result<Document> {
        let raw = self.conventions.from_bson(stored);
        let (document, metadata) = self.conventions.instantiate(raw)?;
        self.metadata.record(document.id(), metadata)?;
        Ok(document)
    }
}

/// Filter and replacement for an upserting `replace_one`: the filter matches
/// on `_id` alone and the replacement carries the same `_id`, so a store
/// either inserts the document or replaces it whole.
pub(crate) fn upsert(
    conventions: &MongoConventions,
    document: &Document,
) -> Result<(bson::Document, bson::Document)> {
    let replacement = conventions.to_bson(&conventions.to_raw(document, None))?;
    Ok((doc! { ID_FIELD: document.id() }, replacement))
}

#[async_trait]
impl DocumentSession for MongoSession {
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>> {
        let (collection, _) = decompose_id(id)?;
        let stored = self
            .collection(&collection)
            .find_one(doc! { ID_FIELD: id })
            .await
            .map_err(|e| StoreError::driver(BACKEND, "load", id, e))?;

        stored.map(|stored| self.instantiate(stored)).transpose()
    }

    async fn load_documents(&mut self, ids: &[String]) -> Result<Vec<Option<Document>>> {
        let mut found = Vec::with_capacity(ids.len());
        for (collection, wanted) in group_by_collection(ids)? {
            let cursor = self
                .collection(&collection)
                .find(doc! { ID_FIELD: { "$in": wanted } })
                .await
                .map_err(|e| StoreError::driver(BACKEND, "load_many", &collection, e))?;
            let stored: Vec<bson::Document> = cursor
                .try_collect()
                .await
                .map_err(|e| StoreError::driver(BACKEND, "load_many", &collection, e))?;

            for document in stored {
                found.push(self.instantiate(document)?);
            }
        }

        Ok(tabulate(ids, found))
    }

    async fn store_document(&mut self, document: Document) -> Result<()> {
        let id = document.id().to_string();
        let (filter, replacement) = upsert(&self.conventions, &document)?;

        self.collection(document.collection())
            .replace_one(filter, replacement)
            .upsert(true)
            .await
            .map_err(|e| StoreError::driver(BACKEND, "store", &id, e))?;
        Ok(())
    }

    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_> {
        Box::new(MongoQuery::new(self, collection))
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}
