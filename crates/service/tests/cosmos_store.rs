use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use models::counter::{CounterDocument, CounterId};
use serde_json::{json, Value};
use service::{
    errors::StoreError,
    retry::RetryPolicy,
    runtime::StoreHandle,
    store::{CosmosStore, DocumentStore},
    CounterError, CounterService,
};
use tokio::net::TcpListener;

const KEY: &str = "c2VjcmV0LWtleS1mb3ItdGVzdHM=";
const ID: &str = "resume-visitor-counter";

/// Minimal stand-in for the Cosmos DB document endpoints.
#[derive(Clone, Default)]
struct MockCosmos {
    docs: Arc<Mutex<HashMap<String, (Value, u64)>>>,
    version: Arc<Mutex<u64>>,
}

impl MockCosmos {
    fn seed(&self, doc: Value) {
        let id = doc["id"].as_str().unwrap().to_string();
        let v = self.bump();
        self.docs.lock().unwrap().insert(id, (doc, v));
    }

    fn bump(&self) -> u64 {
        let mut v = self.version.lock().unwrap();
        *v += 1;
        *v
    }

    fn count(&self, id: &str) -> Option<u64> {
        self.docs.lock().unwrap().get(id).and_then(|(d, _)| d["count"].as_u64())
    }
}

fn etag(v: u64) -> String {
    format!("\"{v:08x}-0000-0000-0000-000000000000\"")
}

fn with_meta(mut doc: Value, v: u64) -> Value {
    doc["_etag"] = json!(etag(v));
    doc["_rid"] = json!("Xc0BAJ4yQf8BAAAAAAAAAA==");
    doc["_ts"] = json!(1_700_000_000 + v);
    doc
}

fn check_headers(db: &str, id: &str, headers: &HeaderMap) -> Result<(), Response> {
    match db {
        "forbidden" => return Err((StatusCode::FORBIDDEN, "forbidden").into_response()),
        "revoked" => return Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response()),
        "throttled" => return Err((StatusCode::SERVICE_UNAVAILABLE, "try later").into_response()),
        "broken" => return Err((StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(500)).into_response()),
        _ => {}
    }
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !auth.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D") || headers.get("x-ms-date").is_none() {
        return Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response());
    }
    let pk = headers.get("x-ms-documentdb-partitionkey").and_then(|v| v.to_str().ok());
    if pk != Some(format!("[\"{id}\"]").as_str()) || headers.get("x-ms-version").is_none() {
        return Err((StatusCode::BAD_REQUEST, "bad partition key").into_response());
    }
    Ok(())
}

async fn read_doc(
    State(mock): State<MockCosmos>,
    Path((db, _coll, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_headers(&db, &id, &headers) {
        return resp;
    }
    match mock.docs.lock().unwrap().get(&id) {
        Some((doc, v)) => Json(with_meta(doc.clone(), *v)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"code": "NotFound"}))).into_response(),
    }
}

async fn replace_doc(
    State(mock): State<MockCosmos>,
    Path((db, _coll, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(resp) = check_headers(&db, &id, &headers) {
        return resp;
    }
    let if_match = headers.get("if-match").and_then(|v| v.to_str().ok()).map(str::to_string);
    let mut docs = mock.docs.lock().unwrap();
    let Some((_, current)) = docs.get(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"code": "NotFound"}))).into_response();
    };
    if let Some(expected) = if_match {
        if expected != etag(*current) {
            return (StatusCode::PRECONDITION_FAILED, Json(json!({"code": "PreconditionFailed"}))).into_response();
        }
    }
    if let Some(obj) = body.as_object_mut() {
        obj.retain(|k, _| !k.starts_with('_'));
    }
    let v = mock.bump();
    docs.insert(id, (body.clone(), v));
    Json(with_meta(body, v)).into_response()
}

async fn start_mock(mock: MockCosmos) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/dbs/:db/colls/:coll/docs/:id", get(read_doc).put(replace_doc))
        .with_state(mock);
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock cosmos error: {}", e);
        }
    });
    Ok(format!("http://{}:{}/", addr.ip(), addr.port()))
}

fn cosmos(endpoint: &str, database: &str) -> CosmosStore {
    CosmosStore::new(endpoint, KEY, database, "visitors", Duration::from_secs(5)).expect("cosmos store")
}

#[tokio::test]
async fn read_and_conditional_replace_round_trip() -> anyhow::Result<()> {
    let mock = MockCosmos::default();
    mock.seed(json!({"id": ID, "count": 7}));
    let endpoint = start_mock(mock.clone()).await?;
    let store = cosmos(&endpoint, "cloudresume");

    let mut doc = store.read_item(ID, ID).await?;
    assert_eq!(doc.count, Some(7));
    assert!(doc.extra.contains_key("_rid"));
    let read_etag = doc.etag.clone().expect("etag");

    doc.increment();
    let updated = store.replace_item(ID, ID, &doc, Some(&read_etag)).await?;
    assert_eq!(updated.count, Some(8));
    assert_ne!(updated.etag.as_deref(), Some(read_etag.as_str()));
    assert_eq!(mock.count(ID), Some(8));

    // the version read earlier is now stale
    let err = store.replace_item(ID, ID, &doc, Some(&read_etag)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(mock.count(ID), Some(8));
    Ok(())
}

#[tokio::test]
async fn missing_document_maps_to_not_found() -> anyhow::Result<()> {
    let endpoint = start_mock(MockCosmos::default()).await?;
    let store = cosmos(&endpoint, "cloudresume");

    let err = store.read_item(ID, ID).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == ID));

    let err = store.replace_item(ID, ID, &CounterDocument::new(ID, 1), None).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_map_to_unavailable() -> anyhow::Result<()> {
    let mock = MockCosmos::default();
    mock.seed(json!({"id": ID, "count": 0}));
    let endpoint = start_mock(mock).await?;
    let store = cosmos(&endpoint, "forbidden");

    let err = store.read_item(ID, ID).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    Ok(())
}

#[tokio::test]
async fn revoked_key_and_outage_map_to_unavailable() -> anyhow::Result<()> {
    let endpoint = start_mock(MockCosmos::default()).await?;

    for db in ["revoked", "throttled"] {
        let store = cosmos(&endpoint, db);
        let err = store.read_item(ID, ID).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{db}: got {err:?}");
        let err = store.replace_item(ID, ID, &CounterDocument::new(ID, 1), Some("\"v\"")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{db}: got {err:?}");
    }
    Ok(())
}

#[tokio::test]
async fn other_statuses_map_to_other_with_truncated_body() -> anyhow::Result<()> {
    let endpoint = start_mock(MockCosmos::default()).await?;
    let store = cosmos(&endpoint, "broken");

    let err = store.read_item(ID, ID).await.unwrap_err();
    let StoreError::Other(msg) = err else {
        panic!("expected Other, got {err:?}");
    };
    assert!(msg.contains("500"), "{msg}");
    assert_eq!(msg.matches('x').count(), 200);
    assert!(!msg.contains(&"x".repeat(201)));
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_maps_to_unavailable() -> anyhow::Result<()> {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let store = cosmos(&format!("http://{addr}"), "cloudresume");
    let err = store.read_item(ID, ID).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_through_cosmos_lose_nothing() -> anyhow::Result<()> {
    let mock = MockCosmos::default();
    mock.seed(json!({"id": ID, "count": 5}));
    let endpoint = start_mock(mock.clone()).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(cosmos(&endpoint, "cloudresume"));
    let svc = Arc::new(CounterService::new(
        StoreHandle::ready(store),
        RetryPolicy::new(100, Duration::from_millis(1), Duration::from_millis(20)),
    ));
    let id = CounterId::new(ID)?;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            tokio::spawn(async move { svc.increment(&id).await })
        })
        .collect();
    let mut counts = Vec::new();
    for t in tasks {
        counts.push(t.await??.count);
    }

    counts.sort_unstable();
    assert_eq!(counts, (6..=25).collect::<Vec<u64>>());
    assert_eq!(mock.count(ID), Some(25));
    Ok(())
}

#[tokio::test]
async fn missing_counter_document_through_service_is_not_found() -> anyhow::Result<()> {
    let endpoint = start_mock(MockCosmos::default()).await?;
    let svc = CounterService::new(
        StoreHandle::ready(Arc::new(cosmos(&endpoint, "cloudresume"))),
        RetryPolicy::default(),
    );
    let err = svc.increment(&CounterId::new(ID)?).await.unwrap_err();
    assert_eq!(err, CounterError::NotFound { id: ID.into() });
    Ok(())
}
