use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("memory backend error during identity seeding: {0}")]
    Memory(#[from] corvid_memory::error::MemoryError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
