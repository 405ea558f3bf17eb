use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm provider error: {0}")]
    Llm(#[from] ProviderError),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
