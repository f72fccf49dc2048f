//! Models - typed documents with composite identifiers.
//!
//! A model names its collection and the ordered fields that identify it.
//! Everything else it serializes is plain document data.
//!
//! ## Example
//!
//! ```ignore
//! use polystore::{Model, SessionExt};
//!
//! #[derive(Serialize, Deserialize, Clone, Model)]
//! #[model(collection = "Warnings")]
//! #[serde(rename_all = "camelCase")]
//! struct Warning {
//!     #[model(id)]
//!     pub guild_id: String,
//!     #[model(id)]
//!     pub target_id: String,
//!     pub reason: String,
//! }
//!
//! store.with_session(|session| Box::pin(async move {
//!     session.store(&warning).await?;
//!     session.load::<Warning>("Warnings/guild1|target1").await
//! })).await?;
//! ```

mod document;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;
use crate::id::build_id;

pub use document::Document;

/// The identifying fields of a model, detached from any instance.
///
/// `#[derive(Model)]` emits one of these per model (`WarningId` for
/// `Warning`) so call sites can address a document before loading it.
pub trait IdentifierData {
    /// Identifier parts in order.
    fn id_parts(&self) -> Vec<String>;
}

impl IdentifierData for Vec<String> {
    fn id_parts(&self) -> Vec<String> {
        self.clone()
    }
}

/// Trait for types that can be persisted as documents.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection name for this model type (e.g., "Warnings", "Users").
    /// Maps to a table in SQL, a collection in MongoDB, an id prefix in CouchDB.
    const COLLECTION: &'static str;

    /// The identifying fields of this model.
    type Identifier: IdentifierData + Send + Sync;

    /// Returns the identifying fields of this instance.
    fn identifier(&self) -> Self::Identifier;

    /// Identifier parts of this instance, in order.
    fn id_parts(&self) -> Vec<String> {
        self.identifier().id_parts()
    }

    /// Full identifier of this instance.
    fn id(&self) -> Result<String> {
        build_id(Self::COLLECTION, &self.id_parts())
    }

    /// Full identifier for a model of this type, without an instance.
    fn id_for(identifier: &Self::Identifier) -> Result<String> {
        build_id(Self::COLLECTION, &identifier.id_parts())
    }
}
