use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use super::conventions::{DATA_COLUMN, ID_COLUMN};
use super::session::{is_undefined_table, table, PostgresSession, BACKEND};
use crate::error::{Result, StoreError};
use crate::model::Document;
use crate::query::{matches_all, DocumentQuery, Filter};

/// Equality filters become `WHERE` clauses on the jsonb column. Regex
/// filters are applied after the fetch, so a regex-only query reads the
/// whole table.
pub struct PostgresQuery<'s> {
    session: &'s PostgresSession,
    collection: String,
    filters: Vec<Filter>,
}

impl<'s> PostgresQuery<'s> {
    pub(crate) fn new(session: &'s PostgresSession, collection: &str) -> Self {
        Self {
            session,
            collection: collection.to_string(),
            filters: Vec::new(),
        }
    }
}

/// `SELECT` with one bound clause per equality filter.
pub(crate) fn select<'a>(collection: &str, filters: &'a [Filter]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {}, {} FROM {}",
        ID_COLUMN,
        DATA_COLUMN,
        table(collection)
    ));

    let mut first = true;
    for filter in filters {
        let Filter::Equals { property, value } = filter else {
            continue;
        };
        builder.push(if first { " WHERE " } else { " AND " });
        first = false;

        if filter.targets_id() {
            match value {
                Value::String(id) => {
                    builder.push(ID_COLUMN).push(" = ").push_bind(id.as_str());
                }
                // Ids are always text.
                _ => {
                    builder.push("FALSE");
                }
            }
        } else {
            builder
                .push(DATA_COLUMN)
                .push(" -> ")
                .push_bind(property.as_str())
                .push(" = ")
                .push_bind(value);
        }
    }

    builder
}

#[async_trait]
impl DocumentQuery for PostgresQuery<'_> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    async fn execute(self: Box<Self>) -> Result<Vec<Document>> {
        let mut builder = select(&self.collection, &self.filters);
        let rows = match builder.build().fetch_all(self.session.pool()).await {
            Ok(rows) => rows,
            Err(err) if is_undefined_table(&err) => Vec::new(),
            Err(err) => return Err(StoreError::driver(BACKEND, "query", &self.collection, err)),
        };

        let regexes: Vec<Filter> = self
            .filters
            .iter()
            .filter(|filter| matches!(filter, Filter::Regex { .. }))
            .cloned()
            .collect();

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let document = self.session.instantiate(row)?;
            if matches_all(&regexes, &document) {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}
