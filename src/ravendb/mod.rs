//! RavenDB backend over its REST API.
//!
//! Sessions track stored documents and flush them with one `bulk_docs`
//! batch; queries are RQL with `regex()` for pattern filters.

mod adapter;
mod client;
mod conventions;
mod query;
mod session;

pub use adapter::RavenAdapter;
pub use conventions::RavenConventions;
pub use query::RavenQuery;
pub use session::RavenSession;
