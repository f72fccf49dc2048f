//! CouchDB backend: revision-tracked documents over HTTP.
//!
//! Documents are keyed by their full id. Every write reads the current
//! revision first; a 409 means another writer got there first and is
//! logged and ignored.

mod adapter;
mod client;
mod conventions;
mod query;
mod session;

pub use adapter::CouchAdapter;
pub use conventions::CouchConventions;
pub use query::CouchQuery;
pub use session::CouchSession;
