use serde_json::{json, Value};

use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::metadata::BackendMetadata;
use crate::model::Document;

pub(crate) const METADATA_FIELD: &str = "@metadata";
const ID_KEY: &str = "@id";
const COLLECTION_KEY: &str = "@collection";
const CHANGE_VECTOR_KEY: &str = "@change-vector";

/// The full id and change vector live in `@metadata`, which never reaches
/// model data. Writes tag the document with its `@collection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RavenConventions;

impl DocumentConventions for RavenConventions {
    fn instantiate(&self, mut raw: RawDocument) -> Result<(Document, Option<BackendMetadata>)> {
        let metadata = match raw.remove(METADATA_FIELD) {
            Some(Value::Object(metadata)) => metadata,
            _ => {
                return Err(StoreError::InvalidDocument(format!(
                    "ravendb document without {}",
                    METADATA_FIELD
                )))
            }
        };

        let id = metadata
            .get(ID_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::InvalidDocument(format!("ravendb document without {}", ID_KEY))
            })?;
        let change_vector = metadata
            .get(CHANGE_VECTOR_KEY)
            .and_then(Value::as_str)
            .map(|token| BackendMetadata::ChangeVector(token.to_string()));

        Ok((Document::from_id(id, raw)?, change_vector))
    }

    fn to_raw(&self, document: &Document, _metadata: Option<&BackendMetadata>) -> RawDocument {
        let mut raw = document.data().clone();
        raw.insert(
            METADATA_FIELD.to_string(),
            json!({ COLLECTION_KEY: document.collection() }),
        );
        raw
    }
}
