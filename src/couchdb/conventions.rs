use serde_json::Value;

use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::metadata::BackendMetadata;
use crate::model::Document;

pub(crate) const ID_FIELD: &str = "_id";
pub(crate) const REV_FIELD: &str = "_rev";

/// `_id` holds the full id, `_rev` the revision. Every other `_` field is
/// reserved by CouchDB and never reaches model data.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouchConventions;

impl DocumentConventions for CouchConventions {
    fn instantiate(&self, raw: RawDocument) -> Result<(Document, Option<BackendMetadata>)> {
        let mut id = None;
        let mut revision = None;
        let mut data = RawDocument::new();

        for (key, value) in raw {
            match key.as_str() {
                ID_FIELD => id = value.as_str().map(str::to_string),
                REV_FIELD => revision = value.as_str().map(str::to_string),
                reserved if reserved.starts_with('_') => {}
                _ => {
                    data.insert(key, value);
                }
            }
        }

        let id = id.ok_or_else(|| {
            StoreError::InvalidDocument(format!("couchdb document without string {}", ID_FIELD))
        })?;

        Ok((
            Document::from_id(&id, data)?,
            revision.map(BackendMetadata::Revision),
        ))
    }

    fn to_raw(&self, document: &Document, metadata: Option<&BackendMetadata>) -> RawDocument {
        let mut raw = document.data().clone();
        raw.insert(ID_FIELD.to_string(), Value::String(document.id().to_string()));
        if let Some(BackendMetadata::Revision(revision)) = metadata {
            raw.insert(REV_FIELD.to_string(), Value::String(revision.clone()));
        }
        raw
    }
}
