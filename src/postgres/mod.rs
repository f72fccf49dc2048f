//! PostgreSQL backend on sqlx.
//!
//! Each collection is a table of `(id, data jsonb)` rows. Stores check for an
//! existing row, then insert or update.

mod adapter;
mod conventions;
mod query;
mod session;

pub use adapter::PostgresAdapter;
pub use conventions::PostgresConventions;
pub use query::PostgresQuery;
pub use session::PostgresSession;
