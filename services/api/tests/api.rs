//! Integration tests driving the full router against an in-memory SQLite
//! database, with the model port faked and the execution adapter pointed at
//! `sh` so no Python toolchain is required.

use api_lib::adapters::{DbAdapter, SubprocessExecAdapter};
use api_lib::config::Config;
use api_lib::web::{app_router, AppState};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use learnsphere_core::pipeline::GenerationPipeline;
use learnsphere_core::ports::{PortResult, TextGenerationService};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

//=========================================================================================
// Test Fixtures
//=========================================================================================

/// A fake model that returns the same canned response for every call.
struct StaticModel {
    body: String,
}

#[async_trait]
impl TextGenerationService for StaticModel {
    async fn generate_json(&self, _model: &str, _prompt: &str) -> PortResult<String> {
        Ok(self.body.clone())
    }
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_path: ":memory:".into(),
        log_level: tracing::Level::INFO,
        genai_api_key: None,
        genai_api_base: None,
        genai_models: vec!["model-a".to_string()],
        python_bin: "sh".to_string(),
        run_timeout: Duration::from_secs(5),
    }
}

async fn test_app(model: Option<Arc<dyn TextGenerationService>>) -> Router {
    // One pooled connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let db = Arc::new(DbAdapter::new(pool));
    db.run_migrations().await.expect("migrations");

    let config = Arc::new(test_config());
    let pipeline = GenerationPipeline::new(model, config.genai_models.clone());
    let executor = Arc::new(SubprocessExecAdapter::new(
        config.python_bin.clone(),
        config.run_timeout,
    ));

    app_router(Arc::new(AppState {
        db,
        config,
        pipeline,
        executor,
    }))
}

fn fenced_model_payload() -> String {
    format!(
        "```json\n{}\n```",
        serde_json::json!({
            "explanation": "**Gradient descent** walks downhill on the loss surface.",
            "code": "import numpy as np\nw = w - lr * grad",
            "xray": {"1": "import numpy", "2": "one update step"},
            "diagram": "```Mermaid\ngraph LR\n    A[\"Loss\"] --> B[\"Minimum\"]\n```"
        })
    )
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pulls the `session=...` pair out of a Set-Cookie header.
fn session_cookie(response: &Response) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().trim().to_string()
}

async fn register(app: &Router, username: &str) -> Response {
    app.clone()
        .oneshot(post_json(
            "/register",
            serde_json::json!({"username": username, "password": "hunter2"}),
        ))
        .await
        .unwrap()
}

//=========================================================================================
// /api/generate
//=========================================================================================

#[tokio::test]
async fn generate_returns_exactly_the_four_keys() {
    let model: Arc<dyn TextGenerationService> = Arc::new(StaticModel {
        body: fenced_model_payload(),
    });
    let app = test_app(Some(model)).await;

    let response = app
        .oneshot(post_json(
            "/api/generate",
            serde_json::json!({"topic": "Gradient Descent", "level": "Beginner"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec!["code", "diagram", "explanation", "xray"]);
    assert!(body["explanation"].as_str().unwrap().contains("Gradient descent"));
}

#[tokio::test]
async fn generate_normalizes_fenced_diagrams() {
    let model: Arc<dyn TextGenerationService> = Arc::new(StaticModel {
        body: fenced_model_payload(),
    });
    let app = test_app(Some(model)).await;

    let response = app
        .oneshot(post_json(
            "/api/generate",
            serde_json::json!({"topic": "Gradient Descent"}),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    let diagram = body["diagram"].as_str().unwrap();
    assert!(diagram.starts_with("graph LR"));
    assert!(!diagram.contains("```"));
}

#[tokio::test]
async fn generate_rejects_missing_or_empty_topic() {
    let app = test_app(None).await;

    let response = app
        .clone()
        .oneshot(post_json("/api/generate", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Topic"));

    let response = app
        .oneshot(post_json(
            "/api/generate",
            serde_json::json!({"topic": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_serves_mock_payload_without_credential() {
    let app = test_app(None).await;

    let response = app
        .oneshot(post_json(
            "/api/generate",
            serde_json::json!({"topic": "SVMs"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["explanation"].as_str().unwrap().contains("Mock Generated"));
}

#[tokio::test]
async fn generate_persists_history_for_logged_in_account() {
    let app = test_app(None).await;

    let response = register(&app, "historian").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);

    let mut request = post_json(
        "/api/generate",
        serde_json::json!({"topic": "Decision Trees"}),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_with_cookie("/api/history", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["topic"], "Decision Trees");

    // The stored content is the serialized GenerationResult.
    let content: serde_json::Value =
        serde_json::from_str(entries[0]["content"].as_str().unwrap()).unwrap();
    assert!(content["explanation"].as_str().unwrap().contains("Decision Trees"));
}

//=========================================================================================
// /api/run
//=========================================================================================

#[tokio::test]
async fn run_captures_stdout_with_empty_error() {
    let app = test_app(None).await;

    let response = app
        .oneshot(post_json(
            "/api/run",
            serde_json::json!({"code": "echo 'Test Output'"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["output"], "Test Output\n");
    assert_eq!(body["error"], "");
}

#[tokio::test]
async fn run_reports_failure_with_partial_output() {
    let app = test_app(None).await;

    let response = app
        .oneshot(post_json(
            "/api/run",
            serde_json::json!({"code": "echo partial; definitely_not_a_command_xyz"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["output"], "partial\n");
    assert!(!body["error"].as_str().unwrap().is_empty());
}

//=========================================================================================
// Registration, Login, Logout
//=========================================================================================

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = test_app(None).await;

    let response = register(&app, "alice").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Registered successfully");

    let response = register(&app, "alice").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Username already exists");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = test_app(None).await;
    register(&app, "bob").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/login",
            serde_json::json!({"username": "bob", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid credentials");

    // Unknown usernames get the same generic message.
    let response = app
        .oneshot(post_json(
            "/login",
            serde_json::json!({"username": "nobody", "password": "hunter2"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = test_app(None).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/login",
            serde_json::json!({"username": "carol", "password": "hunter2"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = register(&app, "carol").await;
    let cookie = session_cookie(&response);

    // Gated route works while the session is live.
    let response = app
        .clone()
        .oneshot(get_with_cookie("/api/history", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_with_cookie("/logout", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // The same cookie no longer authenticates.
    let response = app
        .oneshot(get_with_cookie("/api/history", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gated_routes_require_a_session() {
    let app = test_app(None).await;

    let response = app.clone().oneshot(get("/api/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/logout")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

//=========================================================================================
// /api/onboard and Pages
//=========================================================================================

#[tokio::test]
async fn onboard_echoes_the_level() {
    let app = test_app(None).await;

    let response = app
        .oneshot(post_json(
            "/api/onboard",
            serde_json::json!({"level": "Intermediate"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["level"], "Intermediate");
}

#[tokio::test]
async fn pages_render() {
    let app = test_app(None).await;

    for uri in ["/", "/register", "/login", "/editor", "/learning-path"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "page {uri}");
    }
}
