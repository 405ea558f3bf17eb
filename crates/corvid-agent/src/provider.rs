//! The LLM provider boundary. No concrete HTTP client lives here — wiring a
//! real provider (Anthropic, OpenAI, a local model) is a process-bootstrap
//! concern outside this crate. `LlmProvider` is the seam the orchestrator
//! calls through.

use async_trait::async_trait;

use corvid_core::types::{Message, ToolCall};

/// A tool exposed to the model for one request, shaped like the JSON-schema
/// tool specs C4 loads at startup.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Non-streaming chat completion. Streaming token delivery is a non-goal.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// A scripted provider for exercising the orchestrator loop without a
/// network round-trip. Pops one response per call; panics if exhausted,
/// which surfaces a test bug immediately rather than hanging.
#[cfg(test)]
pub mod test_support {
    use std::sync::Mutex;

    use super::*;

    pub struct ScriptedProvider {
        responses: Mutex<Vec<ChatResponse>>,
    }

    impl ScriptedProvider {
        pub fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::Unavailable("scripted responses exhausted".into()))
        }
    }
}
