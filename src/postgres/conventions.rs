use serde_json::{json, Value};

use crate::adapter::{DocumentConventions, RawDocument};
use crate::error::{Result, StoreError};
use crate::metadata::BackendMetadata;
use crate::model::Document;

pub(crate) const ID_COLUMN: &str = "id";
pub(crate) const DATA_COLUMN: &str = "data";

/// A row is `{ "id": <full id>, "data": <jsonb object> }`; each collection is
/// its own table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConventions;

impl PostgresConventions {
    pub(crate) fn row(&self, id: String, data: Value) -> RawDocument {
        let mut raw = RawDocument::new();
        raw.insert(ID_COLUMN.to_string(), Value::String(id));
        raw.insert(DATA_COLUMN.to_string(), data);
        raw
    }
}

impl DocumentConventions for PostgresConventions {
    fn instantiate(&self, mut raw: RawDocument) -> Result<(Document, Option<BackendMetadata>)> {
        let id = match raw.remove(ID_COLUMN) {
            Some(Value::String(id)) => id,
            _ => {
                return Err(StoreError::InvalidDocument(format!(
                    "postgres row without text {} column",
                    ID_COLUMN
                )))
            }
        };
        let data = match raw.remove(DATA_COLUMN) {
            Some(Value::Object(data)) => data,
            other => {
                return Err(StoreError::InvalidDocument(format!(
                    "postgres row {} has non-object {}: {:?}",
                    id, DATA_COLUMN, other
                )))
            }
        };
        Ok((Document::from_id(&id, data)?, None))
    }

    fn to_raw(&self, document: &Document, _metadata: Option<&BackendMetadata>) -> RawDocument {
        self.row(
            document.id().to_string(),
            json!(document.data()),
        )
    }
}
