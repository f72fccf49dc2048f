//! Document - the backend-neutral form of a model.

use serde_json::{Map, Value};

use super::Model;
use crate::error::{Result, StoreError};
use crate::id::{build_id, decompose_id};

/// A model with its type erased: collection, identifier parts and data.
///
/// This is what sessions and conventions exchange. Backend fields such as
/// `_id`, `_rev` or `@metadata` never appear in `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    collection: String,
    id_parts: Vec<String>,
    data: Map<String, Value>,
}

impl Document {
    /// Build a document, validating its identifier.
    pub fn new(
        collection: impl Into<String>,
        id_parts: Vec<String>,
        data: Map<String, Value>,
    ) -> Result<Self> {
        let collection = collection.into();
        let id = build_id(&collection, &id_parts)?;
        Ok(Self {
            id,
            collection,
            id_parts,
            data,
        })
    }

    /// Build a document from its full identifier.
    pub fn from_id(id: &str, data: Map<String, Value>) -> Result<Self> {
        let (collection, id_parts) = decompose_id(id)?;
        Ok(Self {
            id: id.to_string(),
            collection,
            id_parts,
            data,
        })
    }

    /// Serialize a model into a document.
    pub fn from_model<M: Model>(model: &M) -> Result<Self> {
        let id_parts = model.id_parts();
        match serde_json::to_value(model)? {
            Value::Object(data) => Self::new(M::COLLECTION, id_parts, data),
            other => Err(StoreError::InvalidDocument(format!(
                "model in {} serialized to {} instead of an object",
                M::COLLECTION,
                kind_of(&other)
            ))),
        }
    }

    /// Deserialize this document into a model of its collection.
    pub fn into_model<M: Model>(self) -> Result<M> {
        if self.collection != M::COLLECTION {
            return Err(StoreError::CollectionMismatch {
                id: self.id,
                expected: M::COLLECTION.to_string(),
                actual: self.collection,
            });
        }
        Ok(serde_json::from_value(Value::Object(self.data))?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id_parts(&self) -> &[String] {
        &self.id_parts
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    /// Value of a queryable property. `"id"` is the full identifier.
    pub fn property(&self, property: &str) -> Option<Value> {
        if property == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.data.get(property).cloned()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
