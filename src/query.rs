//! Query - equality and regex predicates over one collection.
//!
//! Filters always combine as a conjunction, so the order they are added in
//! never changes the result set. Backends translate them into their own
//! query language where they can; [`Filter::matches`] is the reference
//! semantics and the client-side fallback.

use std::marker::PhantomData;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::model::{Document, Model};

/// Property name that addresses the full document identifier.
pub const ID_PROPERTY: &str = "id";

/// A single predicate over a document property.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Property equals the value exactly. A missing property never matches.
    Equals { property: String, value: Value },
    /// String property matches the pattern. Non-string values never match.
    Regex { property: String, pattern: Regex },
}

impl Filter {
    pub fn equals(property: &str, value: impl Into<Value>) -> Self {
        Filter::Equals {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub fn regex(property: &str, pattern: Regex) -> Self {
        Filter::Regex {
            property: property.to_string(),
            pattern,
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Filter::Equals { property, .. } | Filter::Regex { property, .. } => property,
        }
    }

    /// Whether the filter addresses the document identifier.
    pub fn targets_id(&self) -> bool {
        self.property() == ID_PROPERTY
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Equals { property, value } => document
                .property(property)
                .is_some_and(|actual| &actual == value),
            Filter::Regex { property, pattern } => match document.property(property) {
                Some(Value::String(text)) => pattern.is_match(&text),
                _ => false,
            },
        }
    }
}

/// Whether a document satisfies every filter.
pub fn matches_all(filters: &[Filter], document: &Document) -> bool {
    filters.iter().all(|filter| filter.matches(document))
}

/// Backend query over one collection.
#[async_trait]
pub trait DocumentQuery: Send {
    /// The collection this query reads from.
    fn collection(&self) -> &str;

    /// Narrow the query with another predicate.
    fn add_filter(&mut self, filter: Filter);

    fn where_equals(&mut self, property: &str, value: Value) {
        self.add_filter(Filter::equals(property, value));
    }

    fn where_regex(&mut self, property: &str, pattern: Regex) {
        self.add_filter(Filter::regex(property, pattern));
    }

    /// Run the query and instantiate every matching document.
    async fn execute(self: Box<Self>) -> Result<Vec<Document>>;
}

/// Typed, chainable wrapper over a backend query.
pub struct Query<'s, M> {
    inner: Box<dyn DocumentQuery + 's>,
    _marker: PhantomData<fn() -> M>,
}

impl<'s, M: Model> Query<'s, M> {
    pub fn new(inner: Box<dyn DocumentQuery + 's>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Keep documents whose `property` equals `value`. `"id"` compares the
    /// full identifier.
    pub fn where_equals(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.inner.where_equals(property, value.into());
        self
    }

    /// Keep documents whose string `property` matches `pattern`.
    pub fn where_regex(mut self, property: &str, pattern: Regex) -> Self {
        self.inner.where_regex(property, pattern);
        self
    }

    pub async fn execute(self) -> Result<Vec<M>> {
        self.inner
            .execute()
            .await?
            .into_iter()
            .map(Document::into_model)
            .collect()
    }

    /// First matching model, if any.
    pub async fn first(self) -> Result<Option<M>> {
        Ok(self.execute().await?.into_iter().next())
    }
}
