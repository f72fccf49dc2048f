//! DocumentSession - the unit of work every backend provides.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::Result;
use crate::id::decompose_id;
use crate::model::{Document, Model};
use crate::query::{DocumentQuery, Query};

/// A unit of work bound to one backend connection.
///
/// Sessions are used sequentially: each call completes before the next is
/// issued. Methods that would collide with the typed [`SessionExt`] accessors
/// carry a `_document` suffix.
#[async_trait]
pub trait DocumentSession: Send {
    /// Load one document. A missing document is `Ok(None)`.
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>>;

    /// Load many documents at once.
    ///
    /// The result has one slot per input id, in input order, `None` where
    /// the id does not exist. Implementations build it with [`tabulate`].
    async fn load_documents(&mut self, ids: &[String]) -> Result<Vec<Option<Document>>>;

    /// Persist a document, inserting or replacing it.
    async fn store_document(&mut self, document: Document) -> Result<()>;

    /// Start a query over one collection.
    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_>;

    /// Release session-scoped resources. Called exactly once per session.
    async fn dispose(&mut self) -> Result<()>;
}

/// Re-index documents fetched in bulk against the requested ids.
///
/// Backends return bulk reads as sparse maps, row sets or ordered arrays with
/// gaps; callers zip `ids` with the result positionally, so every backend
/// funnels through here. Repeated ids receive the same document.
pub fn tabulate(
    ids: &[String],
    found: impl IntoIterator<Item = Document>,
) -> Vec<Option<Document>> {
    let by_id: HashMap<String, Document> = found
        .into_iter()
        .map(|document| (document.id().to_string(), document))
        .collect();

    ids.iter().map(|id| by_id.get(id).cloned()).collect()
}

/// Reject the first malformed id. Every backend checks ids before its first
/// round trip, so a bad id fails the same way everywhere.
pub(crate) fn check_ids(ids: &[String]) -> Result<()> {
    ids.iter().try_for_each(|id| decompose_id(id).map(drop))
}

/// Split ids into one batch per collection for backends that read a table or
/// collection at a time. Duplicates are kept; [`tabulate`] restores the
/// caller's order afterwards.
pub(crate) fn group_by_collection(ids: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut by_collection: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in ids {
        let (collection, _) = decompose_id(id)?;
        by_collection.entry(collection).or_default().push(id.clone());
    }
    Ok(by_collection)
}

/// Typed model access on any session.
#[async_trait]
pub trait SessionExt: DocumentSession {
    /// Load a model by full id.
    async fn load<M: Model>(&mut self, id: &str) -> Result<Option<M>> {
        match self.load_document(id).await? {
            Some(document) => Ok(Some(document.into_model()?)),
            None => Ok(None),
        }
    }

    /// Load a model by its identifier data.
    async fn load_by<M: Model>(&mut self, identifier: &M::Identifier) -> Result<Option<M>> {
        let id = M::id_for(identifier)?;
        self.load::<M>(&id).await
    }

    /// Load many models, one slot per id in input order.
    async fn load_many<M: Model>(&mut self, ids: &[String]) -> Result<Vec<Option<M>>> {
        self.load_documents(ids)
            .await?
            .into_iter()
            .map(|slot| slot.map(Document::into_model).transpose())
            .collect()
    }

    /// Persist a model.
    async fn store<M: Model>(&mut self, model: &M) -> Result<()> {
        let document = Document::from_model(model)?;
        self.store_document(document).await
    }

    /// Query the model's collection.
    fn query<M: Model>(&self) -> Query<'_, M> {
        Query::new(self.query_collection(M::COLLECTION))
    }
}

impl<S: DocumentSession + ?Sized> SessionExt for S {}
