pub mod error;
pub mod provider;
pub mod runtime;
pub mod transport;

pub use error::{AgentError, Result};
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolDefinition};
pub use runtime::AgentOrchestrator;
pub use transport::{ImageSender, VoiceNoteSender};
