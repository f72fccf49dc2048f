//! A stateful stand-in for the slice of the RavenDB REST API the adapter uses.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use polystore::Regex;
use serde_json::{json, Map, Value};

#[derive(Default)]
struct Inner {
    databases: HashSet<String>,
    documents: BTreeMap<String, Value>,
    batches: usize,
    etag: u64,
}

#[derive(Clone, Default)]
pub struct FakeRaven {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRaven {
    pub fn database_exists(&self, name: &str) -> bool {
        self.inner.lock().unwrap().databases.contains(name)
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        self.inner.lock().unwrap().documents.get(id).cloned()
    }

    pub fn batches(&self) -> usize {
        self.inner.lock().unwrap().batches
    }

    /// Bind to port 0 and return the port.
    pub async fn start(&self) -> u16 {
        let app = Router::new()
            .route("/admin/databases", put(create_database))
            .route("/databases/:db/stats", get(stats))
            .route("/databases/:db/docs", get(get_documents))
            .route("/databases/:db/bulk_docs", post(bulk_docs))
            .route("/databases/:db/queries", post(query))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }
}

async fn stats(State(fake): State<FakeRaven>, Path(db): Path<String>) -> Response {
    if fake.database_exists(&db) {
        Json(json!({ "CountOfDocuments": 0 })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "Type": "DatabaseDoesNotExistException" })),
        )
            .into_response()
    }
}

async fn create_database(State(fake): State<FakeRaven>, Json(body): Json<Value>) -> Response {
    let name = body["DatabaseName"].as_str().unwrap_or_default().to_string();
    let mut inner = fake.inner.lock().unwrap();
    if inner.databases.insert(name.clone()) {
        Json(json!({ "Name": name, "RaftCommandIndex": 1 })).into_response()
    } else {
        (StatusCode::CONFLICT, Json(json!({ "Type": "ConcurrencyException" }))).into_response()
    }
}

async fn get_documents(
    State(fake): State<FakeRaven>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let inner = fake.inner.lock().unwrap();
    let results: Vec<Value> = params
        .iter()
        .filter(|(key, _)| key == "id")
        .map(|(_, id)| inner.documents.get(id).cloned().unwrap_or(Value::Null))
        .collect();

    if results.iter().all(Value::is_null) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({ "Results": results, "Includes": {} })).into_response()
}

async fn bulk_docs(State(fake): State<FakeRaven>, Json(body): Json<Value>) -> Response {
    let mut inner = fake.inner.lock().unwrap();
    inner.batches += 1;

    let mut results = Vec::new();
    for command in body["Commands"].as_array().cloned().unwrap_or_default() {
        if command["Type"] != json!("PUT") {
            return (StatusCode::BAD_REQUEST, Json(json!({ "Type": "BadRequest" })))
                .into_response();
        }
        let id = command["Id"].as_str().unwrap_or_default().to_string();
        let mut document = command["Document"].clone();
        let collection = document["@metadata"]["@collection"].clone();

        inner.etag += 1;
        let change_vector = format!("A:{}-fake", inner.etag);
        document["@metadata"] = json!({
            "@id": id,
            "@collection": collection,
            "@change-vector": change_vector,
        });
        inner.documents.insert(id.clone(), document);

        results.push(json!({
            "Type": "PUT",
            "@id": id,
            "@collection": collection,
            "@change-vector": change_vector,
        }));
    }

    (StatusCode::CREATED, Json(json!({ "Results": results }))).into_response()
}

/// Just enough RQL: `from 'C' [where <cond> (and <cond>)*]` with
/// `field = $p`, `id() = $p` and `regex(field, $p)` conditions.
fn matches(condition: &str, parameters: &Map<String, Value>, document: &Value) -> bool {
    let parameter = |name: &str| parameters.get(name.trim().trim_start_matches('$'));
    let field = |name: &str| -> Option<Value> {
        let name = name.trim();
        if name == "id()" {
            return Some(document["@metadata"]["@id"].clone());
        }
        document.get(name.trim_matches('\'')).cloned()
    };

    if let Some(inner) = condition
        .strip_prefix("regex(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let (name, param) = inner.split_once(',').unwrap();
        let pattern = Regex::new(parameter(param).and_then(Value::as_str).unwrap()).unwrap();
        return field(name)
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|text| pattern.is_match(text));
    }

    let (name, param) = condition.split_once(" = ").unwrap();
    field(name).is_some_and(|value| Some(&value) == parameter(param))
}

async fn query(State(fake): State<FakeRaven>, Json(body): Json<Value>) -> Response {
    let text = body["Query"].as_str().unwrap_or_default().to_string();
    let parameters = body["QueryParameters"].as_object().cloned().unwrap_or_default();

    let rest = text.strip_prefix("from '").unwrap();
    let (collection, rest) = rest.split_once('\'').unwrap();
    let conditions: Vec<&str> = match rest.trim().strip_prefix("where ") {
        Some(clause) => clause.split(" and ").collect(),
        None => Vec::new(),
    };

    let inner = fake.inner.lock().unwrap();
    let results: Vec<Value> = inner
        .documents
        .values()
        .filter(|document| document["@metadata"]["@collection"] == json!(collection))
        .filter(|document| {
            conditions
                .iter()
                .all(|condition| matches(condition, &parameters, document))
        })
        .cloned()
        .collect();

    Json(json!({ "Results": results, "TotalResults": results.len() })).into_response()
}
