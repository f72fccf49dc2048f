//! In-memory reference backend for testing and development.
//!
//! Also the fallback when no database is configured. Regex filters run
//! client-side over the whole collection.

mod adapter;
mod conventions;
mod session;

pub use adapter::MemoryAdapter;
pub use conventions::MemoryConventions;
pub use session::{MemoryQuery, MemorySession};
