pub mod embedding;
pub mod error;
pub mod manager;
pub mod persona;
pub mod types;

pub use embedding::EmbeddingProvider;
pub use error::{MemoryError, Result};
pub use manager::MemoryStore;
pub use types::{Collection, Fact, FilterExpr, SparseVector};
