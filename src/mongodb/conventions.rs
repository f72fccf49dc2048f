use bson::Bson;
use serde_json::Value;

use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::metadata::BackendMetadata;
use crate::model::Document;

pub(crate) const ID_FIELD: &str = "_id";

/// `_id` holds the full id. MongoDB keeps no revision, so there is never
/// any metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConventions;

impl MongoConventions {
    /// BSON read from the driver, as relaxed extended JSON.
    pub(crate) fn from_bson(&self, document: bson::Document) -> RawDocument {
        match Bson::Document(document).into_relaxed_extjson() {
            Value::Object(raw) => raw,
            _ => RawDocument::new(),
        }
    }

    /// The BSON written for a raw document.
    pub(crate) fn to_bson(&self, raw: &RawDocument) -> Result<bson::Document> {
        bson::to_document(raw).map_err(|e| StoreError::InvalidDocument(e.to_string()))
    }
}

impl DocumentConventions for MongoConventions {
    fn instantiate(&self, mut raw: RawDocument) -> Result<(Document, Option<BackendMetadata>)> {
        let id = match raw.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            _ => {
                return Err(StoreError::InvalidDocument(format!(
                    "mongodb document without string {}",
                    ID_FIELD
                )))
            }
        };
        Ok((Document::from_id(&id, raw)?, None))
    }

    fn to_raw(&self, document: &Document, _metadata: Option<&BackendMetadata>) -> RawDocument {
        let mut raw = document.data().clone();
        raw.insert(ID_FIELD.to_string(), Value::String(document.id().to_string()));
        raw
    }
}
