pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use config::CorvidConfig;
pub use error::{CoreError, Result};
