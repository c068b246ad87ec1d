//! Integration tests for the HTTP transport.
//!
//! Each test starts an in-process axum server on an ephemeral port and runs a
//! collection against it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use roster_client::HttpTransport;
use roster_engine::{routes_from_json, Collection, Error, Route};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared state of the mock API.
#[derive(Clone, Default)]
struct Api {
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn list_users(State(api): State<Api>) -> Json<Value> {
    api.hits.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        {"id": 1, "name": "one"},
        {"id": 2, "name": "two"}
    ]))
}

async fn get_user(State(api): State<Api>, Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    api.hits.fetch_add(1, Ordering::SeqCst);
    if id >= 100 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({"id": id, "name": format!("user {}", id)})))
}

async fn update_user(
    State(api): State<Api>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    api.hits.fetch_add(1, Ordering::SeqCst);
    api.bodies.lock().unwrap().push(body.clone());
    let mut record = body;
    record["id"] = json!(id);
    Json(record)
}

async fn delete_user(State(api): State<Api>) -> StatusCode {
    api.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn slow_user(State(api): State<Api>, Path(id): Path<u64>) -> Json<Value> {
    api.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    Json(json!({"id": id, "slow": true}))
}

async fn spawn_api() -> (String, Api) {
    let api = Api::default();
    let app = Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/slow/{id}", get(slow_user))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), api)
}

fn users(base_url: &str) -> Collection {
    let transport = HttpTransport::new(base_url, Duration::from_secs(5)).unwrap();
    Collection::builder()
        .spawner(|request| {
            tokio::spawn(request);
        })
        .route("getAll", Route::get("/users").array())
        .route("getOne", Route::get("/users/:id").one())
        .route("update", Route::put("/users/:id").one())
        .route("remove", Route::delete("/users/:id").remove())
        .route("getSlow", Route::get("/slow/:id").one())
        .build(Arc::new(transport))
        .unwrap()
}

#[tokio::test]
async fn listing_populates_collection() {
    let (base, api) = spawn_api().await;
    let users = users(&base);

    let placeholder = users.item(2);
    let items = users.perform("getAll", None).unwrap().await.unwrap().into_items().unwrap();

    assert_eq!(items.len(), 2);
    assert!(users.is_loaded());
    assert!(items.get(1).unwrap().ptr_eq(&placeholder));
    assert_eq!(placeholder.get("name"), Some(json!("two")));
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_record_keeps_identity() {
    let (base, _api) = spawn_api().await;
    let users = users(&base);

    let first = users.route("getOne").unwrap().call_with(7).unwrap().await.unwrap();
    let first = first.into_item().unwrap();
    let again = users.route("getOne").unwrap().call_with(7).unwrap().await.unwrap();

    assert!(again.into_item().unwrap().ptr_eq(&first));
    assert_eq!(first.get("name"), Some(json!("user 7")));
    assert_eq!(users.items().len(), 1);
}

#[tokio::test]
async fn updates_send_the_item_as_json() {
    let (base, api) = spawn_api().await;
    let users = users(&base);

    let user = users
        .route("getOne")
        .unwrap()
        .call_with(3)
        .unwrap()
        .await
        .unwrap()
        .into_item()
        .unwrap();

    users
        .route("update")
        .unwrap()
        .call_with(json!({"id": 3, "name": "renamed"}))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(user.get("name"), Some(json!("renamed")));
    assert_eq!(
        api.bodies.lock().unwrap().clone(),
        vec![json!({"id": 3, "name": "renamed"})]
    );
}

#[tokio::test]
async fn delete_with_empty_body_removes_record() {
    let (base, _api) = spawn_api().await;
    let users = users(&base);

    users.perform("getAll", None).unwrap().await.unwrap();
    let items = users
        .route("remove")
        .unwrap()
        .call_with(1)
        .unwrap()
        .await
        .unwrap()
        .into_items()
        .unwrap();

    assert_eq!(items.len(), 1);
    assert!(users.lookup(1).is_none());
    assert!(users.lookup(2).is_some());
}

#[tokio::test]
async fn dropped_delete_still_reaches_server() {
    let (base, api) = spawn_api().await;
    let users = users(&base);

    users.perform("getAll", None).unwrap().await.unwrap();
    drop(users.route("remove").unwrap().call_with(1).unwrap());

    for _ in 0..100 {
        if users.lookup(1).is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(users.lookup(1).is_none());
    assert_eq!(users.items().len(), 1);
    assert_eq!(users.in_flight(), 0);
    assert_eq!(api.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn error_status_reaches_caller() {
    let (base, _api) = spawn_api().await;
    let users = users(&base);

    let err = users
        .route("getOne")
        .unwrap()
        .call_with(404)
        .unwrap()
        .await
        .unwrap_err();

    match err {
        Error::Transport(e) => assert_eq!(e.status, Some(404)),
        other => panic!("expected transport error, got {:?}", other),
    }
    assert!(users.items().is_empty());
    assert_eq!(users.in_flight(), 0);
}

#[tokio::test]
async fn identical_requests_hit_the_server_once() {
    let (base, api) = spawn_api().await;
    let users = users(&base);
    let route = users.route("getSlow").unwrap();

    let first = route.call_with(5).unwrap();
    let second = route.call_with(5).unwrap();
    assert!(!first.is_piggybacked());
    assert!(second.is_piggybacked());

    let (a, b) = futures::future::join(first, second).await;
    assert!(a.unwrap().into_item().unwrap().ptr_eq(&b.unwrap().into_item().unwrap()));
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);

    // Settled requests are not reused
    route.call_with(5).unwrap().await.unwrap();
    assert_eq!(api.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn route_table_with_absolute_url() {
    let (base, api) = spawn_api().await;
    let table = format!(
        r#"{{"getAll": {{"method": "get", "url": "{}/users", "responseType": "array"}}}}"#,
        base
    );

    // The transport base points nowhere; the absolute route URL is used as-is
    let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
    let users = Collection::builder()
        .routes(routes_from_json(&table).unwrap())
        .build(Arc::new(transport))
        .unwrap();

    let items = users.perform("getAll", None).unwrap().await.unwrap().into_items().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);
}
