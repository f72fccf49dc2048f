use async_trait::async_trait;
use serde_json::{Map, Value};

use super::session::RavenSession;
use crate::error::Result;
use crate::model::Document;
use crate::query::{DocumentQuery, Filter};

/// RQL query over one collection. Both filter kinds run server-side, the
/// regex through `regex()`.
pub struct RavenQuery<'s> {
    session: &'s RavenSession,
    collection: String,
    filters: Vec<Filter>,
}

impl<'s> RavenQuery<'s> {
    pub(crate) fn new(session: &'s RavenSession, collection: &str) -> Self {
        Self {
            session,
            collection: collection.to_string(),
            filters: Vec::new(),
        }
    }
}

fn quote(name: &str) -> String {
    format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn field(filter: &Filter) -> String {
    if filter.targets_id() {
        return "id()".to_string();
    }

    let property = filter.property();
    let plain = property
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && property
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if plain {
        property.to_string()
    } else {
        quote(property)
    }
}

/// RQL text and its parameters. Values are always passed as `$pN`.
pub(crate) fn rql(collection: &str, filters: &[Filter]) -> (String, Map<String, Value>) {
    let mut text = format!("from {}", quote(collection));
    let mut parameters = Map::new();

    for (index, filter) in filters.iter().enumerate() {
        let name = format!("p{}", index);
        text.push_str(if index == 0 { " where " } else { " and " });

        match filter {
            Filter::Equals { value, .. } => {
                text.push_str(&format!("{} = ${}", field(filter), name));
                parameters.insert(name, value.clone());
            }
            Filter::Regex { pattern, .. } => {
                text.push_str(&format!("regex({}, ${})", field(filter), name));
                parameters.insert(name, Value::String(pattern.as_str().to_string()));
            }
        }
    }

    (text, parameters)
}

#[async_trait]
impl DocumentQuery for RavenQuery<'_> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    async fn execute(self: Box<Self>) -> Result<Vec<Document>> {
        let (text, parameters) = rql(&self.collection, &self.filters);
        let raws = self
            .session
            .client
            .query(&text, parameters, &self.collection)
            .await?;
        raws.into_iter()
            .map(|raw| self.session.instantiate(raw))
            .collect()
    }
}
