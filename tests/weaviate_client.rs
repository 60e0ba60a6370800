//! `WeaviateStore` against a local axum stand-in for the Weaviate REST and
//! GraphQL endpoints.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, head, post},
    Json, Router,
};
use report_harness::schema::{ensure_collection, CollectionSchema};
use report_harness::store::weaviate::WeaviateStore;
use report_harness::store::{StoreError, UpsertOutcome, VectorStore};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    classes: Vec<Value>,
    objects: HashMap<String, Value>,
    queries: Vec<String>,
    graphql_reply: Value,
    creates: usize,
    replaces: usize,
}

type Shared = Arc<Mutex<MockState>>;

fn mock_weaviate(state: Shared) -> Router {
    Router::new()
        .route("/v1/schema", get(list_schema).post(create_class))
        .route("/v1/objects", post(create_object))
        .route(
            "/v1/objects/{class}/{id}",
            head(object_exists).put(replace_object),
        )
        .route("/v1/graphql", post(graphql))
        .with_state(state)
}

async fn list_schema(State(state): State<Shared>) -> Json<Value> {
    let classes = state.lock().unwrap().classes.clone();
    Json(json!({ "classes": classes }))
}

async fn create_class(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().unwrap();
    if s.classes.iter().any(|c| c["class"] == body["class"]) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": [{"message": "class already exists"}]})),
        );
    }
    s.classes.push(body.clone());
    (StatusCode::OK, Json(body))
}

async fn object_exists(
    State(state): State<Shared>,
    Path((_class, id)): Path<(String, String)>,
) -> StatusCode {
    if state.lock().unwrap().objects.contains_key(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_object(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut s = state.lock().unwrap();
    let id = body["id"].as_str().unwrap_or_default().to_string();
    s.objects.insert(id, body.clone());
    s.creates += 1;
    Json(body)
}

async fn replace_object(
    State(state): State<Shared>,
    Path((_class, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut s = state.lock().unwrap();
    s.objects.insert(id, body.clone());
    s.replaces += 1;
    Json(body)
}

async fn graphql(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut s = state.lock().unwrap();
    s.queries
        .push(body["query"].as_str().unwrap_or_default().to_string());
    Json(s.graphql_reply.clone())
}

async fn setup() -> (Shared, WeaviateStore) {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));
    let url = common::spawn(mock_weaviate(state.clone())).await;
    (state, WeaviateStore::new(&url).unwrap())
}

fn schema() -> CollectionSchema {
    CollectionSchema::text_pair("Eval", "title", "content")
}

#[tokio::test]
async fn collection_is_created_once() {
    let (state, store) = setup().await;

    assert!(ensure_collection(&store, &schema()).await.unwrap());
    assert!(!ensure_collection(&store, &schema()).await.unwrap());

    let s = state.lock().unwrap();
    assert_eq!(s.classes.len(), 1);
    assert_eq!(s.classes[0]["class"], json!("Eval"));
    let props: Vec<&str> = s.classes[0]["properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(props, ["title", "content"]);
}

#[tokio::test]
async fn upsert_creates_then_replaces() {
    let (state, store) = setup().await;
    let id = Uuid::new_v4();
    let mut props = serde_json::Map::new();
    props.insert("title".into(), json!("notes.txt"));
    props.insert("content".into(), json!("v1"));

    assert_eq!(store.upsert("Eval", id, &props).await.unwrap(), UpsertOutcome::Created);
    assert_eq!(store.upsert("Eval", id, &props).await.unwrap(), UpsertOutcome::Replaced);

    let s = state.lock().unwrap();
    assert_eq!((s.creates, s.replaces), (1, 1));
    assert_eq!(s.objects.len(), 1);
    let stored = &s.objects[&id.to_string()];
    assert_eq!(stored["class"], json!("Eval"));
    assert_eq!(stored["properties"]["content"], json!("v1"));
}

#[tokio::test]
async fn near_text_sends_query_and_projects_rows() {
    let (state, store) = setup().await;
    state.lock().unwrap().graphql_reply = json!({
        "data": {"Get": {"Eval": [
            {"title": "notes.txt", "content": "Alpha deployment readiness: green."},
            {"title": "report.md"}
        ]}}
    });

    let fields = vec!["title".to_string(), "content".to_string()];
    let rows = store
        .near_text("Eval", "deployment \"readiness\"", 3, &fields)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["content"], json!("Alpha deployment readiness: green."));
    assert_eq!(rows[1]["content"], Value::Null);

    let s = state.lock().unwrap();
    let query = &s.queries[0];
    assert!(query.contains("Eval("));
    assert!(query.contains(r#"concepts: ["deployment \"readiness\""]"#));
    assert!(query.contains("limit: 3"));
}

#[tokio::test]
async fn graphql_errors_surface_with_raw_payload() {
    let (state, store) = setup().await;
    state.lock().unwrap().graphql_reply = json!({
        "errors": [{"message": "Cannot query field \"Eval\" on type \"GetObjectsObj\"."}]
    });

    let err = store
        .near_text("Eval", "anything", 5, &["content".to_string()])
        .await
        .unwrap_err();
    match &err {
        StoreError::Query { messages, .. } => {
            assert!(messages[0].contains("Cannot query field"));
        }
        other => panic!("expected query error, got {:?}", other),
    }
    assert!(err.raw_payload().unwrap().contains("GetObjectsObj"));
}

#[tokio::test]
async fn empty_class_result_is_empty_not_error() {
    let (state, store) = setup().await;
    state.lock().unwrap().graphql_reply = json!({"data": {"Get": {"Eval": []}}});

    let rows = store
        .near_text("Eval", "nothing", 5, &["content".to_string()])
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn unreachable_store_is_reported() {
    let store = WeaviateStore::new(&common::unreachable_url()).unwrap();
    let err = store.collection_names().await.unwrap_err();
    assert!(matches!(err, StoreError::Unreachable { .. }));
    assert!(store.ping("Eval", &["title".to_string()]).await.is_err());
}

#[tokio::test]
async fn ping_runs_a_one_row_query() {
    let (state, store) = setup().await;
    state.lock().unwrap().graphql_reply = json!({"data": {"Get": {"Eval": []}}});

    store
        .ping("Eval", &["title".to_string(), "content".to_string()])
        .await
        .unwrap();
    let s = state.lock().unwrap();
    assert!(s.queries[0].contains("Eval(limit: 1)"));
    assert!(s.queries[0].contains("title"));
}
