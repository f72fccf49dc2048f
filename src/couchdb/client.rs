//! Thin CouchDB HTTP client over reqwest.

use reqwest::header::ETAG;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapter::RawDocument;
use crate::config::Credentials;
use crate::error::{Result, StoreError};

pub(crate) const BACKEND: &str = "couchdb";

/// Documents fetched per `_find` round trip.
const PAGE_SIZE: usize = 1000;

/// Result of a document write.
pub(crate) enum PutOutcome {
    /// Written; carries the new revision.
    Written(String),
    /// Rejected with 409: the supplied revision was stale.
    Conflict,
}

#[derive(Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    #[serde(default)]
    doc: Option<RawDocument>,
}

#[derive(Deserialize)]
struct FindResponse {
    docs: Vec<RawDocument>,
    #[serde(default)]
    bookmark: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    rev: String,
}

#[derive(Clone)]
pub(crate) struct CouchClient {
    http: Client,
    base: Url,
    database: String,
    credentials: Option<Credentials>,
}

impl CouchClient {
    pub(crate) fn new(
        http: Client,
        base: &str,
        database: &str,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| StoreError::Connection {
            backend: BACKEND,
            message: format!("invalid server url {}: {}", base, e),
        })?;
        Ok(Self {
            http,
            base,
            database: database.to_string(),
            credentials,
        })
    }

    pub(crate) fn database(&self) -> &str {
        &self.database
    }

    /// `<base>/<database>/<segments...>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| StoreError::Connection {
                backend: BACKEND,
                message: format!("server url {} cannot hold a path", self.base),
            })?;
            path.pop_if_empty().push(&self.database).extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }

    async fn failure(operation: &'static str, id: &str, response: Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StoreError::driver(BACKEND, operation, id, format!("{}: {}", status, body))
    }

    /// Create the database. `Ok(false)` when it already exists.
    pub(crate) async fn ensure_database(&self) -> Result<bool> {
        let response = self
            .request(Method::PUT, self.url(&[])?)
            .send()
            .await
            .map_err(|e| StoreError::Connection {
                backend: BACKEND,
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(true),
            StatusCode::PRECONDITION_FAILED => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Connection {
                    backend: BACKEND,
                    message: format!("creating database {}: {} {}", self.database, status, body),
                })
            }
        }
    }

    pub(crate) async fn get(&self, id: &str) -> Result<Option<RawDocument>> {
        let response = self
            .request(Method::GET, self.url(&[id])?)
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "load", id, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| StoreError::driver(BACKEND, "load", id, e)),
            _ => Err(Self::failure("load", id, response).await),
        }
    }

    /// Bulk read through `_all_docs`. Missing and deleted ids are skipped.
    pub(crate) async fn all_docs(&self, ids: &[String]) -> Result<Vec<RawDocument>> {
        let label = ids.join(",");
        let response = self
            .request(Method::POST, self.url(&["_all_docs"])?)
            .query(&[("include_docs", "true")])
            .json(&json!({ "keys": ids }))
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "load_many", &label, e))?;

        if !response.status().is_success() {
            return Err(Self::failure("load_many", &label, response).await);
        }

        let body: AllDocsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "load_many", &label, e))?;

        Ok(body.rows.into_iter().filter_map(|row| row.doc).collect())
    }

    /// Current revision of a stored document, read from the `ETag` of a HEAD.
    pub(crate) async fn revision(&self, id: &str) -> Result<Option<String>> {
        let response = self
            .request(Method::HEAD, self.url(&[id])?)
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "revision", id, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(response
                .headers()
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim_matches('"').to_string())),
            _ => Err(Self::failure("revision", id, response).await),
        }
    }

    pub(crate) async fn put(&self, id: &str, raw: &RawDocument) -> Result<PutOutcome> {
        let response = self
            .request(Method::PUT, self.url(&[id])?)
            .json(raw)
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "store", id, e))?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => {
                let body: PutResponse = response
                    .json()
                    .await
                    .map_err(|e| StoreError::driver(BACKEND, "store", id, e))?;
                Ok(PutOutcome::Written(body.rev))
            }
            _ => Err(Self::failure("store", id, response).await),
        }
    }

    /// Every document matching a Mango selector, paging with bookmarks.
    pub(crate) async fn find(&self, selector: &Value, label: &str) -> Result<Vec<RawDocument>> {
        let mut documents = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut body = json!({ "selector": selector, "limit": PAGE_SIZE });
            if let Some(bookmark) = &bookmark {
                body["bookmark"] = Value::String(bookmark.clone());
            }

            let response = self
                .request(Method::POST, self.url(&["_find"])?)
                .json(&body)
                .send()
                .await
                .map_err(|e| StoreError::driver(BACKEND, "query", label, e))?;

            if !response.status().is_success() {
                return Err(Self::failure("query", label, response).await);
            }

            let page: FindResponse = response
                .json()
                .await
                .map_err(|e| StoreError::driver(BACKEND, "query", label, e))?;

            let count = page.docs.len();
            documents.extend(page.docs);

            if count < PAGE_SIZE || page.bookmark.is_none() {
                return Ok(documents);
            }
            bookmark = page.bookmark;
        }
    }
}
