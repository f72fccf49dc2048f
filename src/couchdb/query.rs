use async_trait::async_trait;
use serde_json::{json, Value};

use super::conventions::ID_FIELD;
use super::session::CouchSession;
use crate::error::Result;
use crate::id::COLLECTION_SEPARATOR;
use crate::model::Document;
use crate::query::{DocumentQuery, Filter};

/// Mango `_find` query. Regex filters run server-side with `$regex`.
pub struct CouchQuery<'s> {
    session: &'s CouchSession,
    collection: String,
    filters: Vec<Filter>,
}

impl<'s> CouchQuery<'s> {
    pub(crate) fn new(session: &'s CouchSession, collection: &str) -> Self {
        Self {
            session,
            collection: collection.to_string(),
            filters: Vec::new(),
        }
    }
}

fn field(filter: &Filter) -> &str {
    if filter.targets_id() {
        ID_FIELD
    } else {
        filter.property()
    }
}

/// Mango selector: the collection's id prefix plus every filter, as `$and`.
pub(crate) fn selector(collection: &str, filters: &[Filter]) -> Value {
    let prefix = format!("^{}{}", regex::escape(collection), COLLECTION_SEPARATOR);
    let mut clauses = vec![json!({ ID_FIELD: { "$regex": prefix } })];

    for filter in filters {
        let clause = match filter {
            Filter::Equals { value, .. } => json!({ field(filter): { "$eq": value } }),
            Filter::Regex { pattern, .. } => {
                json!({ field(filter): { "$regex": pattern.as_str() } })
            }
        };
        clauses.push(clause);
    }

    json!({ "$and": clauses })
}

#[async_trait]
impl DocumentQuery for CouchQuery<'_> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    async fn execute(self: Box<Self>) -> Result<Vec<Document>> {
        let selector = selector(&self.collection, &self.filters);
        let raws = self.session.client.find(&selector, &self.collection).await?;
        raws.into_iter()
            .map(|raw| self.session.instantiate(raw))
            .collect()
    }
}
