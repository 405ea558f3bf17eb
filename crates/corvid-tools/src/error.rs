use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("argument error: {0}")]
    ArgumentError(String),

    #[error("backend error: {0}")]
    BackendError(#[from] corvid_memory::error::MemoryError),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
