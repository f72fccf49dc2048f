//! MongoDB backend: one collection per model collection, `_id` = full id.
//!
//! Writes are a single upserting `replace_one`; equality and regex filters
//! both run server-side.

mod adapter;
mod conventions;
mod query;
mod session;

pub use adapter::MongoAdapter;
pub use conventions::MongoConventions;
pub use query::MongoQuery;
pub use session::MongoSession;
