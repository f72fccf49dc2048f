use async_trait::async_trait;
use tracing::debug;

use super::client::{CouchClient, PutOutcome, BACKEND};
use super::conventions::CouchConventions;
use super::query::CouchQuery;
use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::Result;
use crate::id::decompose_id;
use crate::metadata::{BackendMetadata, MetadataTable};
use crate::model::Document;
use crate::query::DocumentQuery;
use crate::session::{check_ids, tabulate, DocumentSession};

pub struct CouchSession {
    pub(crate) client: CouchClient,
    conventions: CouchConventions,
    metadata: MetadataTable,
}

impl CouchSession {
    pub(crate) fn new(client: CouchClient, metadata: MetadataTable) -> Self {
        Self {
            client,
            conventions: CouchConventions,
            metadata,
        }
    }

    pub(crate) fn instantiate(&self, raw: RawDocument) -> Result<Document> {
        let (document, metadata) = self.conventions.instantiate(raw)?;
        self.metadata.record(document.id(), metadata)?;
        Ok(document)
    }
}

#[async_trait]
impl DocumentSession for CouchSession {
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>> {
        decompose_id(id)?;
        match self.client.get(id).await? {
            Some(raw) => Ok(Some(self.instantiate(raw)?)),
            None => Ok(None),
        }
    }

    async fn load_documents(&mut self, ids: &[String]) -> Result<Vec<Option<Document>>> {
        check_ids(ids)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .client
            .all_docs(ids)
            .await?
            .into_iter()
            .map(|raw| self.instantiate(raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(tabulate(ids, found))
    }

    async fn store_document(&mut self, document: Document) -> Result<()> {
        let id = document.id().to_string();

        // Writes must name the current revision of an existing document.
        let revision = self
            .client
            .revision(&id)
            .await?
            .map(BackendMetadata::Revision);
        let raw = self.conventions.to_raw(&document, revision.as_ref());

        match self.client.put(&id, &raw).await? {
            PutOutcome::Written(revision) => self
                .metadata
                .record(&id, Some(BackendMetadata::Revision(revision))),
            PutOutcome::Conflict => {
                debug!(
                    backend = BACKEND,
                    id = %id,
                    database = self.client.database(),
                    "revision conflict on store, another writer won"
                );
                Ok(())
            }
        }
    }

    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_> {
        Box::new(CouchQuery::new(self, collection))
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}
