use serde_json::Value;

use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::metadata::BackendMetadata;
use crate::model::Document;

pub(crate) const ID_FIELD: &str = "@id";
pub(crate) const VERSION_FIELD: &str = "@version";

/// Raw documents carry `@id` and a store-assigned `@version`, surfaced as a
/// revision token.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryConventions;

impl DocumentConventions for MemoryConventions {
    fn instantiate(&self, mut raw: RawDocument) -> Result<(Document, Option<BackendMetadata>)> {
        let id = match raw.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            _ => {
                return Err(StoreError::InvalidDocument(format!(
                    "memory document without string {}",
                    ID_FIELD
                )))
            }
        };
        let metadata = raw
            .remove(VERSION_FIELD)
            .and_then(|version| version.as_u64())
            .map(|version| BackendMetadata::Revision(version.to_string()));

        Ok((Document::from_id(&id, raw)?, metadata))
    }

    fn to_raw(&self, document: &Document, _metadata: Option<&BackendMetadata>) -> RawDocument {
        let mut raw = document.data().clone();
        raw.insert(ID_FIELD.to_string(), Value::String(document.id().to_string()));
        raw
    }
}
