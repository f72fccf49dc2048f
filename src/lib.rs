//! Polyglot document store.
//!
//! One session/query contract over several physical databases:
//!
//! - CouchDB: revision-tracked HTTP documents (`couchdb` feature)
//! - MongoDB: native upsert over the wire protocol (`mongodb` feature)
//! - RavenDB: managed sessions with explicit save-changes (`ravendb` feature)
//! - PostgreSQL: table per collection, exists-then-insert-or-replace
//!   (`postgres` feature)
//! - an in-memory reference backend, used when nothing is configured
//!
//! Application code sees [`DatabaseStore::with_session`] and its own
//! [`Model`] types; everything backend-specific stays behind
//! [`DatabaseAdapter`].

extern crate self as polystore;

mod adapter;
mod config;
mod error;
pub mod id;
mod memory;
mod metadata;
mod model;
mod query;
mod session;
mod store;

#[cfg(feature = "couchdb")]
pub mod couchdb;
#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "ravendb")]
pub mod ravendb;

pub use adapter::{select_adapter, BackendKind, DatabaseAdapter, DocumentConventions, RawDocument};
pub use config::{Connection, ConnectionConfig, Credentials, DatabaseConfig};
pub use error::{Result, StoreError};
pub use id::{build_id, build_partial_id, decompose_id};
pub use memory::{MemoryAdapter, MemoryConventions, MemoryQuery, MemorySession};
pub use metadata::{BackendMetadata, MetadataTable};
pub use model::{Document, IdentifierData, Model};
pub use query::{matches_all, DocumentQuery, Filter, Query, ID_PROPERTY};
pub use session::{tabulate, DocumentSession, SessionExt};
pub use store::{DatabaseStore, DocumentCache, SessionFuture};

// Derive macro for `Model`
pub use polystore_macros::Model;

// Re-exported so callers can build regex filters without a direct dependency
pub use regex::Regex;
