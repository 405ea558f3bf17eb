pub mod error;
pub mod router;
pub mod spec;

pub use error::{Result, ToolError};
pub use router::ToolRouter;
