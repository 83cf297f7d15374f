//! Test utilities for tally-core
//!
//! A mock relay server that speaks just enough of the OpenAI chat
//! completions API and the Twilio Messages API for the real HTTP backends to
//! be exercised end to end. Every request is recorded for assertions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// A chat completion request as received by the mock server
#[derive(Debug, Clone)]
pub struct RecordedChat {
    pub authorization: Option<String>,
    pub model: String,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A messaging request as received by the mock server
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub account_sid: String,
    pub authorization: Option<String>,
    pub from: String,
    pub to: String,
    pub body: String,
}

#[derive(Default)]
struct Recorded {
    chats: Vec<RecordedChat>,
    messages: Vec<RecordedMessage>,
}

type SharedState = Arc<Mutex<Recorded>>;

/// Mock chat completions + messaging relay for tests
pub struct MockRelayServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockRelayServer {
    /// Prompts containing this text get a 500 from the chat endpoint
    pub const FAILING_KEY: &'static str = "FAIL-9999";

    /// Destinations the messaging endpoint rejects with a 400
    pub const REJECTED_NUMBER: &'static str = "+15005550001";

    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = SharedState::default();

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .route(
                "/2010-04-01/Accounts/:sid/Messages.json",
                post(handle_message),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Chat completion requests received so far
    pub fn chat_requests(&self) -> Vec<RecordedChat> {
        self.state.lock().unwrap().chats.clone()
    }

    /// Messaging requests received so far
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockRelayServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle_models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": [{"id": "gpt-4", "object": "model"}]
    }))
}

async fn handle_chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let prompt = request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    state.lock().unwrap().chats.push(RecordedChat {
        authorization: authorization(&headers),
        model: request.model.clone(),
        prompt: prompt.clone(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    });

    if prompt.contains(MockRelayServer::FAILING_KEY) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "{\"error\":{\"message\":\"mock upstream failure\"}}",
        )
            .into_response();
    }

    let content = if let Some(key) = line_value(&prompt, "Account Code:") {
        format!(
            "  Account {} most likely reflects a posting that reached only one system.  ",
            key
        )
    } else if let Some(question) = line_value(&prompt, "Question:") {
        format!("Mock answer: {}", question)
    } else {
        "Mock response".to_string()
    };

    Json(ChatResponse {
        id: "chatcmpl-mock".to_string(),
        model: request.model,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: "stop".to_string(),
        }],
    })
    .into_response()
}

async fn handle_message(
    State(state): State<SharedState>,
    Path(sid): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let field = |name: &str| form.get(name).cloned().unwrap_or_default();
    let to = field("To");

    let count = {
        let mut recorded = state.lock().unwrap();
        recorded.messages.push(RecordedMessage {
            account_sid: sid,
            authorization: authorization(&headers),
            from: field("From"),
            to: to.clone(),
            body: field("Body"),
        });
        recorded.messages.len()
    };

    if to.ends_with(MockRelayServer::REJECTED_NUMBER) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "sid": format!("SM{:032}", count),
            "status": "queued",
            "to": to,
        })),
    )
        .into_response()
}

/// Text after `label` on the first line that contains it
fn line_value(prompt: &str, label: &str) -> Option<String> {
    prompt.lines().find_map(|line| {
        line.find(label)
            .map(|pos| line[pos + label.len()..].trim().to_string())
    })
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    id: String,
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
struct ChatChoice {
    index: u32,
    message: ChatMessage,
    finish_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_value() {
        let prompt = "Mismatch found:\n- Account Code: 2000\n- Other";
        assert_eq!(line_value(prompt, "Account Code:").as_deref(), Some("2000"));
        assert_eq!(line_value(prompt, "Question:"), None);
    }

    #[tokio::test]
    async fn test_server_starts_and_serves_models() {
        let server = MockRelayServer::start().await;
        let resp = reqwest::get(format!("{}/v1/models", server.url()))
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
}
