use async_trait::async_trait;
use bson::{doc, Bson};
use futures::TryStreamExt;

use super::conventions::ID_FIELD;
use super::session::{MongoSession, BACKEND};
use crate::error::{Result, StoreError};
use crate::model::Document;
use crate::query::{DocumentQuery, Filter};

/// `find` over one MongoDB collection. Both filter kinds run server-side.
pub struct MongoQuery<'s> {
    session: &'s MongoSession,
    collection: String,
    filters: Vec<Filter>,
}

impl<'s> MongoQuery<'s> {
    pub(crate) fn new(session: &'s MongoSession, collection: &str) -> Self {
        Self {
            session,
            collection: collection.to_string(),
            filters: Vec::new(),
        }
    }
}

/// Filters as a `$and` of single-field clauses.
pub(crate) fn filter_document(filters: &[Filter]) -> Result<bson::Document> {
    if filters.is_empty() {
        return Ok(doc! {});
    }

    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        let field = if filter.targets_id() {
            ID_FIELD
        } else {
            filter.property()
        };

        let condition = match filter {
            Filter::Equals { value, .. } => {
                let value = bson::to_bson(value)
                    .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
                doc! { "$eq": value }
            }
            Filter::Regex { pattern, .. } => doc! { "$regex": pattern.as_str() },
        };

        let mut clause = bson::Document::new();
        clause.insert(field, condition);
        clauses.push(Bson::Document(clause));
    }

    Ok(doc! { "$and": clauses })
}

#[async_trait]
impl DocumentQuery for MongoQuery<'_> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    async fn execute(self: Box<Self>) -> Result<Vec<Document>> {
        let filter = filter_document(&self.filters)?;
        let cursor = self
            .session
            .collection(&self.collection)
            .find(filter)
            .await
            .map_err(|e| StoreError::driver(BACKEND, "query", &self.collection, e))?;
        let found: Vec<bson::Document> = cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "query", &self.collection, e))?;

        found
            .into_iter()
            .map(|stored| self.session.instantiate(stored))
            .collect()
    }
}
