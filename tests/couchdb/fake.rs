//! A stateful stand-in for the slice of the CouchDB HTTP API the adapter uses.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use polystore::Regex;
use serde_json::{json, Value};

#[derive(Default)]
struct Inner {
    databases: HashSet<String>,
    documents: BTreeMap<String, Value>,
    force_conflict: bool,
    puts: usize,
}

#[derive(Clone, Default)]
pub struct FakeCouch {
    inner: Arc<Mutex<Inner>>,
}

impl FakeCouch {
    pub fn database_exists(&self, name: &str) -> bool {
        self.inner.lock().unwrap().databases.contains(name)
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        self.inner.lock().unwrap().documents.get(id).cloned()
    }

    /// Answer every document write with 409.
    pub fn force_conflicts(&self) {
        self.inner.lock().unwrap().force_conflict = true;
    }

    pub fn puts(&self) -> usize {
        self.inner.lock().unwrap().puts
    }

    /// Bind to port 0 and return the port.
    pub async fn start(&self) -> u16 {
        let app = Router::new()
            .route("/:db", put(create_database))
            .route("/:db/_all_docs", post(all_docs))
            .route("/:db/_find", post(find))
            .route("/:db/:id", put(put_document).get(get_document))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}

async fn create_database(
    State(fake): State<FakeCouch>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = fake.inner.lock().unwrap();
    if inner.databases.insert(db) {
        (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response()
    } else {
        (
            StatusCode::PRECONDITION_FAILED,
            Json(json!({ "error": "file_exists" })),
        )
            .into_response()
    }
}

async fn get_document(
    State(fake): State<FakeCouch>,
    Path((_db, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let inner = fake.inner.lock().unwrap();
    match inner.documents.get(&id) {
        Some(document) => {
            let rev = document["_rev"].as_str().unwrap_or_default().to_string();
            (
                StatusCode::OK,
                [(header::ETAG, format!("\"{}\"", rev))],
                Json(document.clone()),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" }))).into_response(),
    }
}

async fn put_document(
    State(fake): State<FakeCouch>,
    Path((_db, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = fake.inner.lock().unwrap();
    inner.puts += 1;

    let current = inner
        .documents
        .get(&id)
        .and_then(|document| document["_rev"].as_str().map(str::to_string));
    let supplied = body.get("_rev").and_then(Value::as_str).map(str::to_string);

    if inner.force_conflict || current != supplied {
        return (StatusCode::CONFLICT, Json(json!({ "error": "conflict" }))).into_response();
    }

    let generation = current
        .as_deref()
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(0);
    let rev = format!("{}-fake", generation + 1);

    body["_id"] = json!(id);
    body["_rev"] = json!(rev);
    inner.documents.insert(id.clone(), body);

    (
        StatusCode::CREATED,
        Json(json!({ "ok": true, "id": id, "rev": rev })),
    )
        .into_response()
}

async fn all_docs(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let inner = fake.inner.lock().unwrap();
    let rows: Vec<Value> = body["keys"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|key| {
            let id = key.as_str().unwrap_or_default();
            match inner.documents.get(id) {
                Some(document) => json!({ "id": id, "key": id, "doc": document }),
                None => json!({ "key": id, "error": "not_found" }),
            }
        })
        .collect();
    Json(json!({ "total_rows": inner.documents.len(), "rows": rows })).into_response()
}

fn clause_matches(clause: &Value, document: &Value) -> bool {
    let Some(clause) = clause.as_object() else {
        return false;
    };
    clause.iter().all(|(field, condition)| {
        let actual = document.get(field);
        if let Some(expected) = condition.get("$eq") {
            actual == Some(expected)
        } else if let Some(pattern) = condition.get("$regex").and_then(Value::as_str) {
            let pattern = Regex::new(pattern).unwrap();
            actual
                .and_then(Value::as_str)
                .is_some_and(|text| pattern.is_match(text))
        } else {
            false
        }
    })
}

async fn find(
    State(fake): State<FakeCouch>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let inner = fake.inner.lock().unwrap();
    let clauses = body["selector"]["$and"].as_array().cloned().unwrap_or_default();
    let docs: Vec<Value> = inner
        .documents
        .values()
        .filter(|document| clauses.iter().all(|clause| clause_matches(clause, document)))
        .cloned()
        .collect();
    Json(json!({ "docs": docs, "bookmark": "nil" })).into_response()
}
