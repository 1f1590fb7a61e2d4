//! Router tests against a stub completion client

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use loom_server::{create_app, AppState, ServerConfig};
use loom_suggest::{ChatMessage, Completion, CompletionClient, SuggestError, Usage};
use serde_json::{json, Value};

struct StubClient {
    reply: Result<String, String>,
    systems: Mutex<Vec<String>>,
}

impl StubClient {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            systems: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            systems: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionClient for StubClient {
    fn model(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, system: &str, _messages: &[ChatMessage]) -> Result<Completion, SuggestError> {
        self.systems.lock().unwrap().push(system.to_string());
        match &self.reply {
            Ok(text) => Ok(Completion {
                text: text.clone(),
                usage: Usage {
                    input_tokens: 42,
                    output_tokens: 7,
                },
            }),
            Err(message) => Err(SuggestError::Chat(message.clone())),
        }
    }
}

fn config(extra: &[(&str, &str)]) -> Result<ServerConfig> {
    let mut values: HashMap<String, String> = HashMap::new();
    values.insert("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string());
    for (k, v) in extra {
        values.insert(k.to_string(), v.to_string());
    }
    Ok(ServerConfig::from_map(&values)?)
}

fn setup_test_server(client: Arc<StubClient>, extra: &[(&str, &str)]) -> Result<TestServer> {
    let config = config(extra)?;
    let app = create_app(AppState::new(client, &config), &config.allowed_origins);
    Ok(TestServer::new(app)?)
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let server = setup_test_server(Arc::new(StubClient::replying("hi")), &[])?;

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    let timestamp = body["timestamp"].as_str().unwrap_or_default();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_chat_forwards_with_canvas_context() -> Result<()> {
    let client = Arc::new(StubClient::replying("Added!\n```json\n[]\n```"));
    let server = setup_test_server(client.clone(), &[])?;

    let response = server
        .post("/api/chat")
        .json(&json!({
            "messages": [{"role": "user", "content": "make the button red"}],
            "builderContext": {
                "nodes": [{"id": "node-1", "type": "Button", "props": {"label": "Go", "color": "blue"}}],
                "edges": []
            }
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({
            "content": "Added!\n```json\n[]\n```",
            "model": "stub-model",
            "usage": {"input_tokens": 42, "output_tokens": 7}
        })
    );

    let systems = client.systems.lock().unwrap();
    assert_eq!(systems.len(), 1);
    assert!(systems[0].contains("node-1 Button"));
    assert!(systems[0].contains("\"action\""));

    Ok(())
}

#[tokio::test]
async fn test_chat_forwards_empty_reply() -> Result<()> {
    let server = setup_test_server(Arc::new(StubClient::replying("")), &[])?;

    let response = server
        .post("/api/chat")
        .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["content"], "");
    assert_eq!(body["model"], "stub-model");

    Ok(())
}

#[tokio::test]
async fn test_chat_validates_messages() -> Result<()> {
    let client = Arc::new(StubClient::replying("unused"));
    let server = setup_test_server(client.clone(), &[])?;

    let missing = server.post("/api/chat").json(&json!({"systemPrompt": "x"})).await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        missing.json::<Value>(),
        json!({"error": "Invalid request: messages array required"})
    );

    let not_array = server.post("/api/chat").json(&json!({"messages": "hello"})).await;
    assert_eq!(not_array.status_code(), StatusCode::BAD_REQUEST);

    let not_object = server.post("/api/chat").text("hello").await;
    assert_eq!(not_object.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        not_object.json::<Value>()["error"],
        "Invalid request: messages array required"
    );

    let empty = server.post("/api/chat").json(&json!({"messages": []})).await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        empty.json::<Value>(),
        json!({"error": "Invalid request: messages array cannot be empty"})
    );

    assert!(client.systems.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_chat_reports_upstream_failure() -> Result<()> {
    let server = setup_test_server(Arc::new(StubClient::failing("overloaded")), &[])?;

    let response = server
        .post("/api/chat")
        .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Failed to process chat request");
    assert_eq!(body["message"], "chat: overloaded");

    Ok(())
}

#[tokio::test]
async fn test_export_returns_attachment() -> Result<()> {
    let server = setup_test_server(Arc::new(StubClient::replying("unused")), &[])?;

    let response = server
        .post("/api/export")
        .json(&json!({
            "nodes": [
                {"id": "node-1", "type": "Card", "props": {"title": "Profile"}},
                {"id": "node-2", "type": "Text", "props": {"content": "Hello", "variant": "h2"}}
            ],
            "edges": [
                {"source": "node-1", "target": "node-2"},
                {"source": "node-1", "target": "node-7"}
            ]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let disposition = response.header("content-disposition");
    assert_eq!(
        disposition.to_str()?,
        "attachment; filename=\"GeneratedComponent.tsx\""
    );
    let code = response.text();
    assert!(code.contains("export default function GeneratedComponent()"));
    assert!(code.contains("        <h2 className=\"text-2xl font-bold\">Hello</h2>"));

    Ok(())
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() -> Result<()> {
    let server = setup_test_server(
        Arc::new(StubClient::replying("ok")),
        &[("LOOM_RATE_LIMIT_MAX", "2")],
    )?;
    let body = json!({"messages": [{"role": "user", "content": "hi"}]});

    for _ in 0..2 {
        assert_eq!(server.post("/api/chat").json(&body).await.status_code(), StatusCode::OK);
    }
    let limited = server.post("/api/chat").json(&body).await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        limited.json::<Value>(),
        json!({"error": "Too many requests from this IP, please try again later."})
    );

    // health is outside the limited scope
    assert_eq!(server.get("/health").await.status_code(), StatusCode::OK);
    Ok(())
}
