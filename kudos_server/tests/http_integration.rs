// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for the HTTP API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kudos_server::ai::{AiError, ChatMessage, CompletionClient};
use kudos_server::api::{self, AppContext};
use kudos_server::store::MemoryStore;
use kudos_server::{KudosServer, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Completion client with a fixed behavior.
struct ScriptedAi {
    reply: fn() -> Result<String, AiError>,
    configured: bool,
    calls: AtomicUsize,
}

impl ScriptedAi {
    fn new(reply: fn() -> Result<String, AiError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            configured: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            reply: || Ok("[]".to_string()),
            configured: false,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionClient for ScriptedAi {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)()
    }
}

fn themes() -> Result<String, AiError> {
    Ok("```json\n[\"remote work\", \"better snacks\"]\n```".to_string())
}

fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_response("improve-experience", "Let me work remotely")
            .with_response("improve-experience", "The snacks could be better"),
    )
}

fn app(store: Arc<MemoryStore>, ai: Arc<ScriptedAi>) -> (Router, Arc<AppContext>) {
    let ctx = Arc::new(AppContext::new(store, ai));
    (api::router(Arc::clone(&ctx)), ctx)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Helper to get response body as JSON.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn extract_body() -> Value {
    json!({
        "questionId": "improve-experience",
        "question": "What's one thing we could improve?"
    })
}

#[tokio::test]
async fn test_health_assigns_request_id() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(themes));
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(themes));
    let response = router
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_extract_is_generated_once() {
    let ai = ScriptedAi::new(themes);
    let (router, _) = app(seeded_store(), Arc::clone(&ai));

    let first = router
        .clone()
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;
    let keypoints = first["keypoints"].as_array().unwrap();
    assert_eq!(keypoints.len(), 2);
    assert_eq!(keypoints[0]["text"], "remote work");
    assert_eq!(keypoints[0]["value"], 10);
    assert_eq!(keypoints[0]["likes"], 0);

    let second = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    let second = body_json(second).await;
    assert_eq!(first["keypoints"][0]["id"], second["keypoints"][0]["id"]);
    assert_eq!(first["keypoints"][1]["id"], second["keypoints"][1]["id"]);
    assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_extract_without_responses() {
    let ai = ScriptedAi::new(themes);
    let (router, _) = app(Arc::new(MemoryStore::new()), Arc::clone(&ai));
    let response = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"keypoints": []}));
    assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submitted_responses_feed_extraction() {
    let ai = ScriptedAi::new(themes);
    let (router, _) = app(Arc::new(MemoryStore::new()), Arc::clone(&ai));

    for text in ["Let me work remotely", "  Better snacks  "] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/responses",
                &json!({
                    "questionId": "improve-experience",
                    "answer": {"type": "text", "value": text}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let saved = body_json(response).await;
        assert_eq!(saved["responseText"], text.trim());
    }

    let response = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["keypoints"].as_array().unwrap().len(), 2);
    assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_response_validation() {
    let (router, _) = app(Arc::new(MemoryStore::new()), ScriptedAi::new(themes));

    let blank = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/responses",
            &json!({
                "questionId": "improve-experience",
                "answer": {"type": "text", "value": "   "}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let unknown = router
        .oneshot(json_request(
            "POST",
            "/responses",
            &json!({
                "questionId": "favorite-color",
                "answer": {"type": "yes-no", "value": true}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_extract_without_api_key() {
    let (router, _) = app(seeded_store(), ScriptedAi::unconfigured());
    let response = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "API key not configured");
}

#[tokio::test]
async fn test_extract_upstream_rate_limit() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(|| Err(AiError::RateLimited)));
    let response = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await["error"],
        "Rate limit exceeded. Please try again later."
    );
}

#[tokio::test]
async fn test_extract_upstream_payment_required() {
    let (router, _) = app(
        seeded_store(),
        ScriptedAi::new(|| Err(AiError::PaymentRequired)),
    );
    let response = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_extract_upstream_failure() {
    let (router, _) = app(
        seeded_store(),
        ScriptedAi::new(|| {
            Err(AiError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            })
        }),
    );
    let response = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "AI processing failed");
}

#[tokio::test]
async fn test_extract_rejects_malformed_body() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(themes));
    let response = router
        .oneshot(
            Request::post("/extract-keypoints")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_cors_preflight() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(themes));
    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/extract-keypoints")
                .header("origin", "https://app.example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "apikey, content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_like_raises_value() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(themes));
    let created = router
        .clone()
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["keypoints"][0]["id"].as_str().unwrap().to_string();

    for expected in 1..=2 {
        let liked = router
            .clone()
            .oneshot(
                Request::post(format!("/keypoints/{id}/likes"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(liked.status(), StatusCode::OK);
        let liked = body_json(liked).await;
        assert_eq!(liked["keypointId"], id.as_str());
        assert_eq!(liked["likes"], expected);
    }

    let again = router
        .oneshot(json_request("POST", "/extract-keypoints", &extract_body()))
        .await
        .unwrap();
    let again = body_json(again).await;
    assert_eq!(again["keypoints"][0]["likes"], 2);
    assert_eq!(again["keypoints"][0]["value"], 20);
}

#[tokio::test]
async fn test_like_unknown_keypoint() {
    let (router, _) = app(seeded_store(), ScriptedAi::new(themes));
    let response = router
        .oneshot(
            Request::post("/keypoints/nope/likes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_progress_feeds_leaderboard() {
    let (router, ctx) = app(Arc::new(MemoryStore::new()), ScriptedAi::new(themes));
    let mut changes = ctx.feed.subscribe();

    for (user, xp) in [("ada", 260.0), ("bob", 700.0), ("cy", 120.0)] {
        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/progress/{user}"),
                &json!({"username": user, "totalXP": xp}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let first = changes.recv().await.unwrap();
    assert_eq!(first.user_id, "ada");
    assert_eq!(first.level, 3);

    let response = router
        .oneshot(Request::get("/leaderboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let board = body_json(response).await;
    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 3);
    assert_eq!(board[0]["userId"], "bob");
    assert_eq!(board[0]["level"], 5);
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[1]["userId"], "ada");
    assert_eq!(board[2]["totalXP"], 120);
}

#[tokio::test]
async fn test_progress_clamps_negative_xp() {
    let (router, _) = app(Arc::new(MemoryStore::new()), ScriptedAi::new(themes));
    let response = router
        .oneshot(json_request(
            "PUT",
            "/progress/ada",
            &json!({"totalXP": -30}),
        ))
        .await
        .unwrap();
    let change = body_json(response).await;
    assert_eq!(change["totalXP"], 0);
    assert_eq!(change["level"], 1);
}

#[tokio::test]
async fn test_serve_and_shutdown() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = AppContext::new(seeded_store(), ScriptedAi::new(themes));
    let server = KudosServer::with_context(ServerConfig::new().with_bind_addr(addr), ctx);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_on(listener, async move {
        let _ = stop_rx.await;
    }));

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
