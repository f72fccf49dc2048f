//! Shared test domain: the `Warning` model and an instrumented adapter.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use polystore::{
    BackendKind, DatabaseAdapter, Document, DocumentConventions, DocumentQuery,
    DocumentSession, MemoryAdapter, MetadataTable, Model, Result,
};
use serde::{Deserialize, Serialize};

/// A moderation warning, identified by guild, author, target and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[model(collection = "Warnings")]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    #[model(id)]
    pub guild_id: String,
    #[model(id)]
    pub author_id: String,
    #[model(id)]
    pub target_id: String,
    #[model(id)]
    pub created_at: u64,
    pub reason: String,
}

impl Warning {
    pub fn new(guild: &str, author: &str, target: &str, created_at: u64, reason: &str) -> Self {
        Self {
            guild_id: guild.into(),
            author_id: author.into(),
            target_id: target.into(),
            created_at,
            reason: reason.into(),
        }
    }
}

/// The canonical example warning.
pub fn guild_warning() -> Warning {
    Warning::new("guild1", "author1", "target1", 1000, "spamming the general channel")
}

/// A model with a single `id` field and the default collection name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Call counts shared between a [`CountingAdapter`] and the test.
#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub disposed: AtomicUsize,
    pub loads: AtomicUsize,
    pub stores: AtomicUsize,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

/// Memory adapter that counts session lifecycle and backend round trips.
#[derive(Clone, Default)]
pub struct CountingAdapter {
    pub inner: MemoryAdapter,
    pub counters: Arc<Counters>,
}

impl CountingAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseAdapter for CountingAdapter {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn setup(&mut self) -> Result<()> {
        self.inner.setup().await
    }

    async fn teardown(&mut self) -> Result<()> {
        self.inner.teardown().await
    }

    fn conventions(&self) -> &dyn DocumentConventions {
        self.inner.conventions()
    }

    fn metadata(&self) -> &MetadataTable {
        self.inner.metadata()
    }

    fn open_session(&self) -> Result<Box<dyn DocumentSession>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            inner: self.inner.open_session()?,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct CountingSession {
    inner: Box<dyn DocumentSession>,
    counters: Arc<Counters>,
}

#[async_trait]
impl DocumentSession for CountingSession {
    async fn load_document(&mut self, id: &str) -> Result<Option<Document>> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_document(id).await
    }

    async fn load_documents(&mut self, ids: &[String]) -> Result<Vec<Option<Document>>> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_documents(ids).await
    }

    async fn store_document(&mut self, document: Document) -> Result<()> {
        self.counters.stores.fetch_add(1, Ordering::SeqCst);
        self.inner.store_document(document).await
    }

    fn query_collection(&self, collection: &str) -> Box<dyn DocumentQuery + '_> {
        self.inner.query_collection(collection)
    }

    async fn dispose(&mut self) -> Result<()> {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        self.inner.dispose().await
    }
}
