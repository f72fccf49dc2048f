use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use super::client::{PutCommand, RavenClient, BACKEND};
use super::conventions::RavenConventions;
use super::query::RavenQuery;
use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::id::{decompose_id, PART_SEPARATOR};
use crate::metadata::{BackendMetadata, MetadataTable};
use crate::model::Document;
use crate::query::DocumentQuery;
use crate::session::{check_ids, tabulate, DocumentSession};

/// RavenDB reads an id ending in the part separator as a request for a
/// server-assigned identity and would store the document under another id.
fn check_storable(id: &str) -> Result<()> {
    if id.ends_with(PART_SEPARATOR) {
        return Err(StoreError::malformed(
            id,
            "ravendb cannot store an id whose last part is empty",
        ));
    }
    Ok(())
}

/// Managed session: stored documents are tracked until [`save_changes`]
/// sends them as one batch.
///
/// [`save_changes`]: RavenSession::save_changes
pub struct RavenSession {
    pub(crate) client: RavenClient,
    conventions: RavenConventions,
    metadata: MetadataTable,
    pending: BTreeMap<String, Document>,
}

impl RavenSession {
    pub(crate) fn new(client: RavenClient, metadata: MetadataTable) -> Self {
        Self {
            client,
            conventions: RavenConventions,
            metadata,
            pending: BTreeMap::new(),
        }
    }

    pub(crate) fn instantiate(&self, raw: RawDocument) -> Result<Document> {
        let (document, metadata) = self.conventions.instantiate(raw)?;
        self.metadata.record(document.id(), metadata)?;
        Ok(document)
    }

    /// Track a document for the next flush. A later registration of the same
    /// id replaces the earlier one.
    pub fn register(&mut self, document: Document) -> Result<()> {
        check_storable(document.id())?;
        self.pending.insert(document.id().to_string(), document);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Flush every tracked document in one batch.
    pub async fn save_changes(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let commands = self
            .pending
            .values()
            .map(|document| PutCommand {
                id: document.id(),
                document: self.conventions.to_raw(document, None),
            })
            .collect();
        let written = self.client.bulk_put(commands).await?;

        for result in &written {
            self.metadata.record(
                &result.id,
                result.change_vector.clone().map(BackendMetadata::ChangeVector),
            )?;
        }
        debug!(
            backend = BACKEND,
            database = self.client.database(),
            count = written.len(),
            "saved changes"
        );

        self.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl DocumentSession for RavenSession {
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>> {
        decompose_id(id)?;
        let ids = [id.to_string()];
        match self.client.get(&ids).await?.into_iter().next().flatten() {
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
            .get(ids)
            .await?
            .into_iter()
            .flatten()
            .map(|raw| self.instantiate(raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(tabulate(ids, found))
    }

    async fn store_document(&mut self, document: Document) -> Result<()> {
        self.register(document)?;
        self.save_changes().await
    }

    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_> {
        Box::new(RavenQuery::new(self, collection))
    }

    async fn dispose(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            debug!(
                backend = BACKEND,
                count = self.pending.len(),
                "discarding unsaved documents"
            );
        }
        self.pending.clear();
        Ok(())
    }
}
