//! HTTP contract tests driven through the router without a socket.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use conversation_store::config::StorageConfig;
use conversation_store::server::{AppState, app};
use conversation_store::store::Database;

async fn test_app() -> (TempDir, Router) {
    let tmp = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        sqlite_path: tmp.path().join("conversations.db"),
    };
    let db = Database::open(&config).await.unwrap();
    (tmp, app(AppState::new(db)))
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    match body {
        Some(body) => send_raw(router, method, uri, Some("application/json"), body.to_string()).await,
        None => send_raw(router, method, uri, None, String::new()).await,
    }
}

async fn send_raw(
    router: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: String,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(Body::from(body)).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| panic!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "conversation-store");
}

#[tokio::test]
async fn login_create_and_fetch_round_trip() {
    let (_tmp, router) = test_app().await;

    let (status, user) = send(
        &router,
        Method::POST,
        "/api/users/login",
        Some(json!({"userName": "  alice  "})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["userName"], "alice");
    assert_eq!(user["currentAnalysisId"], Value::Null);

    let (status, created) = send(
        &router,
        Method::POST,
        "/api/conversations",
        Some(json!({
            "userName": "alice",
            "analysisId": "a1",
            "chatMessages": [{"role": "user", "text": "hi"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["analysisData"], Value::Null);
    assert_eq!(created["beautyPlan"], Value::Null);
    assert_eq!(created["chatMessages"][0]["text"], "hi");
    assert!(created["createdAt"].as_str().unwrap().ends_with('Z'));

    let (status, fetched) = send(&router, Method::GET, "/api/conversations/alice/a1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (_, user) = send(
        &router,
        Method::POST,
        "/api/users/login",
        Some(json!({"userName": "alice"})),
    )
    .await;
    assert_eq!(user["currentAnalysisId"], "a1");
}

#[tokio::test]
async fn blank_login_is_bad_request() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/users/login",
        Some(json!({"userName": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&router, Method::POST, "/api/users/login", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_without_keys_is_bad_request() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/conversations",
        Some(json!({"userName": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn duplicate_create_is_conflict() {
    let (_tmp, router) = test_app().await;
    let body = json!({"userName": "bob", "analysisId": "x"});

    let (status, _) = send(&router, Method::POST, "/api/conversations", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = send(&router, Method::POST, "/api/conversations", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(err["error"].is_string());
}

#[tokio::test]
async fn update_replaces_only_given_documents() {
    let (_tmp, router) = test_app().await;
    send(
        &router,
        Method::POST,
        "/api/conversations",
        Some(json!({
            "userName": "alice",
            "analysisId": "a1",
            "analysisData": {"skin": "dry"},
            "chatMessages": []
        })),
    )
    .await;

    let (status, updated) = send(
        &router,
        Method::PUT,
        "/api/conversations/alice/a1",
        Some(json!({"beautyPlan": {"steps": 3}, "analysisData": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["beautyPlan"]["steps"], 3);
    assert_eq!(updated["analysisData"]["skin"], "dry");
    assert_eq!(updated["chatMessages"], json!([]));

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/conversations/alice/missing",
        Some(json!({"beautyPlan": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let (_tmp, router) = test_app().await;
    send(
        &router,
        Method::POST,
        "/api/conversations",
        Some(json!({"userName": "alice", "analysisId": "a1"})),
    )
    .await;

    let (status, _) = send(&router, Method::DELETE, "/api/conversations/alice/a1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&router, Method::GET, "/api/conversations/alice/a1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&router, Method::DELETE, "/api/conversations/alice/a1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_and_sessions_order_by_recency() {
    let (_tmp, router) = test_app().await;
    send(
        &router,
        Method::POST,
        "/api/users/login",
        Some(json!({"userName": "carol"})),
    )
    .await;
    for id in ["a1", "a2"] {
        send(
            &router,
            Method::POST,
            "/api/conversations",
            Some(json!({"userName": "carol", "analysisId": id})),
        )
        .await;
    }

    let (status, list) = send(&router, Method::GET, "/api/conversations/carol", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["analysisId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["a2", "a1"]);

    let (status, sessions) = send(&router, Method::GET, "/api/users/carol/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sessions["currentAnalysisId"], "a2");
    assert_eq!(sessions["conversations"][0]["analysisId"], "a2");
    assert_eq!(sessions["conversations"][1]["analysisId"], "a1");
}

#[tokio::test]
async fn empty_list_for_unknown_user() {
    let (_tmp, router) = test_app().await;

    let (status, list) = send(&router, Method::GET, "/api/conversations/nobody", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));

    let (status, _) = send(&router, Method::GET, "/api/users/nobody/sessions", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_reports_path() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send(&router, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
    assert_eq!(body["path"], "/api/nope");
}

#[tokio::test]
async fn mistyped_login_name_is_bad_request() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/users/login",
        Some(json!({"userName": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn truncated_json_body_is_bad_request() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send_raw(
        &router,
        Method::POST,
        "/api/conversations",
        Some("application/json"),
        "{\"userName\": \"alice\", \"analysisId\"".to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send_raw(
        &router,
        Method::PUT,
        "/api/conversations/alice/a1",
        Some("application/json"),
        "{".to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn body_without_content_type_is_bad_request() {
    let (_tmp, router) = test_app().await;

    let (status, body) = send_raw(
        &router,
        Method::POST,
        "/api/conversations",
        None,
        json!({"userName": "alice", "analysisId": "a1"}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, list) = send(&router, Method::GET, "/api/conversations/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn falsy_documents_are_stored_verbatim() {
    let (_tmp, router) = test_app().await;

    let (status, created) = send(
        &router,
        Method::POST,
        "/api/conversations",
        Some(json!({
            "userName": "dana",
            "analysisId": "d1",
            "analysisData": false,
            "chatMessages": "",
            "beautyPlan": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["analysisData"], json!(false));
    assert_eq!(created["chatMessages"], json!(""));
    assert_eq!(created["beautyPlan"], json!(0));

    let (_, updated) = send(
        &router,
        Method::PUT,
        "/api/conversations/dana/d1",
        Some(json!({"beautyPlan": false})),
    )
    .await;
    assert_eq!(updated["beautyPlan"], json!(false));
}
