//! RavenDB REST client over reqwest.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::adapter::RawDocument;
use crate::error::{Result, StoreError};

pub(crate) const BACKEND: &str = "ravendb";

#[derive(Deserialize)]
struct ResultsResponse<T> {
    #[serde(rename = "Results")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct PutResult {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@change-vector")]
    change_vector: Option<String>,
}

/// One `PUT` entry of a batch.
pub(crate) struct PutCommand<'a> {
    pub id: &'a str,
    pub document: RawDocument,
}

/// Outcome of a flushed `PUT`: the document id and its new change vector.
pub(crate) struct Written {
    pub id: String,
    pub change_vector: Option<String>,
}

#[derive(Clone)]
pub(crate) struct RavenClient {
    http: Client,
    base: Url,
    database: String,
}

impl RavenClient {
    pub(crate) fn new(http: Client, base: &str, database: &str) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| StoreError::Connection {
            backend: BACKEND,
            message: format!("invalid server url {}: {}", base, e),
        })?;
        Ok(Self {
            http,
            base,
            database: database.to_string(),
        })
    }

    pub(crate) fn database(&self) -> &str {
        &self.database
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| StoreError::Connection {
                backend: BACKEND,
                message: format!("server url {} cannot hold a path", self.base),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `<base>/databases/<database>/<segments...>`
    fn database_url(&self, segments: &[&str]) -> Result<Url> {
        let mut all = vec!["databases", self.database.as_str()];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    async fn failure(operation: &'static str, id: &str, response: Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StoreError::driver(BACKEND, operation, id, format!("{}: {}", status, body))
    }

    /// Create the database when the server does not know it. `Ok(false)` when
    /// it already exists.
    pub(crate) async fn ensure_database(&self) -> Result<bool> {
        let connection_error = |e: reqwest::Error| StoreError::Connection {
            backend: BACKEND,
            message: e.to_string(),
        };

        let stats = self
            .request(Method::GET, self.database_url(&["stats"])?)
            .send()
            .await
            .map_err(connection_error)?;

        match stats.status() {
            status if status.is_success() => return Ok(false),
            StatusCode::NOT_FOUND | StatusCode::SERVICE_UNAVAILABLE => {}
            status => {
                let body = stats.text().await.unwrap_or_default();
                return Err(StoreError::Connection {
                    backend: BACKEND,
                    message: format!("reading database {}: {} {}", self.database, status, body),
                });
            }
        }

        let response = self
            .request(Method::PUT, self.url(&["admin", "databases"])?)
            .json(&json!({ "DatabaseName": self.database, "Disabled": false }))
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Connection {
                    backend: BACKEND,
                    message: format!("creating database {}: {} {}", self.database, status, body),
                })
            }
        }
    }

    /// Documents by id, one slot per requested id.
    pub(crate) async fn get(&self, ids: &[String]) -> Result<Vec<Option<RawDocument>>> {
        let label = ids.join(",");
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("id", id.as_str())).collect();
        let response = self
            .request(Method::GET, self.database_url(&["docs"])?)
            .query(&query)
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "load", &label, e))?;

        match response.status() {
            // Every requested id is missing.
            StatusCode::NOT_FOUND => Ok(vec![None; ids.len()]),
            status if status.is_success() => {
                let body: ResultsResponse<Option<RawDocument>> = response
                    .json()
                    .await
                    .map_err(|e| StoreError::driver(BACKEND, "load", &label, e))?;
                Ok(body.results)
            }
            _ => Err(Self::failure("load", &label, response).await),
        }
    }

    /// Flush a batch of `PUT` commands in one transaction.
    pub(crate) async fn bulk_put(&self, commands: Vec<PutCommand<'_>>) -> Result<Vec<Written>> {
        let label = commands
            .iter()
            .map(|command| command.id)
            .collect::<Vec<_>>()
            .join(",");
        let commands: Vec<Value> = commands
            .into_iter()
            .map(|command| {
                json!({
                    "Type": "PUT",
                    "Id": command.id,
                    "Document": command.document,
                    "ChangeVector": Value::Null,
                })
            })
            .collect();

        let response = self
            .request(Method::POST, self.database_url(&["bulk_docs"])?)
            .json(&json!({ "Commands": commands }))
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "store", &label, e))?;

        if !response.status().is_success() {
            return Err(Self::failure("store", &label, response).await);
        }

        let body: ResultsResponse<PutResult> = response
            .json()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "store", &label, e))?;

        Ok(body
            .results
            .into_iter()
            .map(|result| Written {
                id: result.id,
                change_vector: result.change_vector,
            })
            .collect())
    }

    /// Run an RQL query with named parameters.
    pub(crate) async fn query(
        &self,
        rql: &str,
        parameters: Map<String, Value>,
        label: &str,
    ) -> Result<Vec<RawDocument>> {
        let response = self
            .request(Method::POST, self.database_url(&["queries"])?)
            .json(&json!({
                "Query": rql,
                "QueryParameters": parameters,
                "WaitForNonStaleResults": true,
            }))
            .send()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "query", label, e))?;

        if !response.status().is_success() {
            return Err(Self::failure("query", label, response).await);
        }

        let body: ResultsResponse<RawDocument> = response
            .json()
            .await
            .map_err(|e| StoreError::driver(BACKEND, "query", label, e))?;
        Ok(body.results)
    }
}
