//! DatabaseStore - the facade application code talks to.
//!
//! ## Example
//!
//! ```ignore
//! use polystore::{DatabaseConfig, DatabaseStore, SessionExt};
//!
//! let config = DatabaseConfig::load(None)?.with_model::<Warning>();
//! let store = DatabaseStore::from_config(&config).await?;
//!
//! let warnings = store
//!     .with_session(|session| Box::pin(async move {
//!         session.query::<Warning>().where_equals("guildId", "1").execute().await
//!     }))
//!     .await?;
//!
//! store.shutdown().await?;
//! ```

mod cache;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{lazy, BoxFuture};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::adapter::{select_adapter, BackendKind, DatabaseAdapter, RawDocument};
use crate::config::DatabaseConfig;
use crate::error::{Result, StoreError};
use crate::id::build_partial_id;
use crate::model::{Document, Model};
use crate::session::{DocumentSession, SessionExt};

pub use cache::DocumentCache;

/// Future returned by a [`DatabaseStore::with_session`] callback.
pub type SessionFuture<'s, T> = BoxFuture<'s, Result<T>>;

/// Scoped sessions over the active adapter plus a read-through model cache.
pub struct DatabaseStore {
    adapter: Box<dyn DatabaseAdapter>,
    cache: DocumentCache,
}

impl DatabaseStore {
    /// Set up `adapter` and wrap it.
    pub async fn connect(mut adapter: Box<dyn DatabaseAdapter>) -> Result<Self> {
        adapter.setup().await?;
        info!(backend = adapter.kind().as_str(), "document store connected");
        Ok(Self {
            adapter,
            cache: DocumentCache::new(),
        })
    }

    /// Select the configured backend (or memory) and connect to it.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(select_adapter(config)).await
    }

    /// Tear the adapter down and drop every cached model.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cache.clear()?;
        self.adapter.metadata().clear()?;
        self.adapter.teardown().await?;
        info!(backend = self.adapter.kind().as_str(), "document store shut down");
        Ok(())
    }

    pub fn backend(&self) -> BackendKind {
        self.adapter.kind()
    }

    pub fn adapter(&self) -> &dyn DatabaseAdapter {
        self.adapter.as_ref()
    }

    /// Open a session, run `callback` with it, and dispose it on every exit
    /// path: success, error, or panic.
    ///
    /// ```ignore
    /// let warning = store
    ///     .with_session(|session| Box::pin(async move {
    ///         session.load::<Warning>(&id).await
    ///     }))
    ///     .await?;
    /// ```
    pub async fn with_session<T, F>(&self, callback: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut dyn DocumentSession) -> SessionFuture<'s, T>,
    {
        let mut session = self.adapter.open_session()?;
        debug!(backend = self.adapter.kind().as_str(), "session opened");

        // Building the future runs inside the guard too, so a callback that
        // panics before returning one still reaches dispose.
        let outcome = AssertUnwindSafe(lazy(|_| callback(session.as_mut())).flatten())
            .catch_unwind()
            .await;

        let disposed = session.dispose().await;
        debug!(backend = self.adapter.kind().as_str(), "session disposed");

        match outcome {
            Ok(Ok(value)) => disposed.map(|_| value),
            Ok(Err(err)) => {
                if let Err(dispose_err) = disposed {
                    warn!(error = %dispose_err, "session dispose failed after error");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(dispose_err) = disposed {
                    error!(error = %dispose_err, "session dispose failed after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Instantiate a model from a raw document through the adapter's
    /// conventions.
    pub fn instantiate_model<M: Model>(&self, raw: RawDocument) -> Result<M> {
        let (document, metadata) = self.adapter.conventions().instantiate(raw)?;
        self.adapter.metadata().record(document.id(), metadata)?;
        document.into_model()
    }

    /// Cache a model under its full id, replacing any previous entry.
    pub fn cache_document<M: Model>(&self, model: Arc<M>) -> Result<Arc<M>> {
        let id = model.id()?;
        self.cache.insert(id, Arc::clone(&model))?;
        Ok(model)
    }

    /// Stop tracking a model: drop it from the cache and forget its backend
    /// metadata. The stored document is left in place.
    pub fn unload_document<M: Model>(&self, model: &M) -> Result<bool> {
        let id = model.id()?;
        self.adapter.metadata().forget(&id)?;
        self.cache.remove(&id)
    }

    /// Cached model by full id, without touching the backend.
    pub fn cached<M: Model>(&self, id: &str) -> Result<Option<Arc<M>>> {
        self.cache.get::<M>(id)
    }

    /// Cached models whose identifier starts with `leading_parts`.
    pub fn cached_by_partial_id<M: Model, S: AsRef<str>>(
        &self,
        leading_parts: &[S],
    ) -> Result<Vec<Arc<M>>> {
        let partial = build_partial_id(M::COLLECTION, leading_parts)?;
        self.cache.matching::<M>(&partial)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cached model, or load it and cache the result.
    pub async fn get<M: Model>(&self, identifier: &M::Identifier) -> Result<Option<Arc<M>>> {
        let id = M::id_for(identifier)?;
        if let Some(model) = self.cache.get::<M>(&id)? {
            return Ok(Some(model));
        }

        let fetch_id = id.clone();
        let loaded = self
            .with_session(|session| Box::pin(async move { session.load::<M>(&fetch_id).await }))
            .await?;

        match loaded {
            Some(model) => Ok(Some(self.cache_document(Arc::new(model))?)),
            None => Ok(None),
        }
    }

    /// Models for many ids, one slot per id in input order. Cached models are
    /// served from the cache; the rest are loaded in one batch.
    pub async fn get_many<M: Model>(&self, ids: &[String]) -> Result<Vec<Option<Arc<M>>>> {
        let mut slots = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            let cached = self.cache.get::<M>(id)?;
            if cached.is_none() {
                missing.push(id.clone());
            }
            slots.push(cached);
        }

        if missing.is_empty() {
            return Ok(slots);
        }

        let fetch_ids = missing.clone();
        let loaded = self
            .with_session(|session| {
                Box::pin(async move { session.load_many::<M>(&fetch_ids).await })
            })
            .await?;

        let mut fetched = HashMap::new();
        for (id, model) in missing.into_iter().zip(loaded) {
            if let Some(model) = model {
                let model = Arc::new(model);
                self.cache.insert(id.clone(), Arc::clone(&model))?;
                fetched.insert(id, model);
            }
        }

        Ok(ids
            .iter()
            .zip(slots)
            .map(|(id, slot)| slot.or_else(|| fetched.get(id).cloned()))
            .collect())
    }

    /// Uncached -> cache-checked -> found, fetched or created -> cached.
    ///
    /// `create` builds the model when the backend has no document for
    /// `identifier`; it is stored before being cached.
    pub async fn get_or_create<M, F>(&self, identifier: &M::Identifier, create: F) -> Result<Arc<M>>
    where
        M: Model,
        F: FnOnce(&M::Identifier) -> M,
    {
        let id = M::id_for(identifier)?;

        if let Some(model) = self.cache.get::<M>(&id)? {
            debug!(id = %id, "cache hit");
            return Ok(model);
        }

        if let Some(model) = self.get::<M>(identifier).await? {
            debug!(id = %id, "fetched from backend");
            return Ok(model);
        }

        let model = create(identifier);
        if model.id()? != id {
            return Err(StoreError::malformed(
                model.id()?,
                format!("created model does not match requested id {}", id),
            ));
        }

        let to_store = model.clone();
        self.with_session(|session| Box::pin(async move { session.store(&to_store).await }))
            .await?;
        debug!(id = %id, "created");

        self.cache_document(Arc::new(model))
    }

    /// Store a model and refresh its cache entry.
    ///
    /// Backends that swallow a lost write race (a CouchDB revision conflict,
    /// a PostgreSQL duplicate key) still report success, so the cache then
    /// holds this model while the database keeps the winner's version.
    /// [`unload_document`](Self::unload_document) forces the next
    /// [`get`](Self::get) back to the database.
    pub async fn save<M: Model>(&self, model: M) -> Result<Arc<M>> {
        let document = Document::from_model(&model)?;
        self.with_session(|session| Box::pin(async move { session.store_document(document).await }))
            .await?;
        self.cache_document(Arc::new(model))
    }
}
