pub mod engine;
pub mod prompt;

use async_trait::async_trait;
use loom_core::graph::Canvas;
use loom_core::{ComponentKind, Edge, Node, Position, Props};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use engine::LlmClient;

// --- Wire types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(default)]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEdge {
    pub source: String,
    pub target: String,
}

/// Snapshot of the canvas sent along with a chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderContext {
    #[serde(default)]
    pub nodes: Vec<ContextNode>,
    #[serde(default)]
    pub edges: Vec<ContextEdge>,
}

impl BuilderContext {
    pub fn from_canvas(canvas: &Canvas) -> Self {
        Self {
            nodes: canvas
                .nodes
                .iter()
                .map(|n| ContextNode {
                    id: n.id.clone(),
                    kind: n.kind.clone(),
                    props: n.props.clone(),
                    position: Some(n.position),
                })
                .collect(),
            edges: canvas
                .edges
                .iter()
                .map(|e| ContextEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a canvas from the wire snapshot, dropping edges to unknown nodes.
    pub fn into_canvas(self) -> Canvas {
        let mut canvas = Canvas {
            nodes: self
                .nodes
                .into_iter()
                .map(|n| Node {
                    id: n.id,
                    kind: n.kind,
                    position: n.position.unwrap_or_default(),
                    props: n.props,
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|e| Edge::new(&e.source, &e.target))
                .collect(),
            selected: None,
        };
        canvas.prune_dangling_edges();
        canvas
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_context: Option<BuilderContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Token counts as reported by the provider. Field names are snake_case on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
}

// --- Errors ---

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    #[error("chat: {0}")]
    Chat(String),

    #[error("conversation has no messages")]
    EmptyConversation,
}

// --- Completion seam ---

/// One round-trip's worth of provider output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// Upstream text completion. The server holds one behind an `Arc<dyn _>` so
/// tests can substitute a stub.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<Completion, SuggestError>;
}

/// Enrich the request with the canvas-aware system prompt and forward it.
/// The provider's text is returned unchanged.
pub async fn chat(client: &dyn CompletionClient, request: &ChatRequest) -> Result<ChatResponse, SuggestError> {
    let messages = match request.messages.as_deref() {
        Some(messages) if !messages.is_empty() => messages,
        _ => return Err(SuggestError::EmptyConversation),
    };

    let system = prompt::system_prompt(request.system_prompt.as_deref(), request.builder_context.as_ref());
    debug!("system prompt is {} bytes", system.len());
    info!("sending {} messages to {}", messages.len(), client.model());

    let completion = client.complete(&system, messages).await?;
    info!(
        "completion: {} input / {} output tokens",
        completion.usage.input_tokens, completion.usage.output_tokens
    );

    Ok(ChatResponse {
        content: completion.text,
        model: client.model().to_string(),
        usage: completion.usage,
    })
}
