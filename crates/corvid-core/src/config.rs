use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Top-level config (corvid.toml + CORVID_* env overrides).
///
/// Field names and defaults follow the "Configuration (recognised options)"
/// contract: `embedding_dimension`, `sparse_dimension`, `max_tool_rounds`,
/// `admin_user_ids`, `allowed_user_ids`, `fresh_start`, `persona_path`.
/// `qdrant_url` and `debug` are ambient additions needed to actually wire up
/// the memory store and logging verbosity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorvidConfig {
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    #[serde(default = "default_sparse_dimension")]
    pub sparse_dimension: usize,

    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    #[serde(default)]
    pub admin_user_ids: Vec<i64>,

    #[serde(default)]
    pub allowed_user_ids: Vec<i64>,

    #[serde(default)]
    pub fresh_start: bool,

    #[serde(default = "default_persona_path")]
    pub persona_path: String,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    #[serde(default)]
    pub debug: bool,
}

impl Default for CorvidConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
            sparse_dimension: default_sparse_dimension(),
            max_tool_rounds: default_max_tool_rounds(),
            admin_user_ids: Vec::new(),
            allowed_user_ids: Vec::new(),
            fresh_start: false,
            persona_path: default_persona_path(),
            qdrant_url: default_qdrant_url(),
            debug: false,
        }
    }
}

fn default_embedding_dimension() -> usize {
    1024
}
fn default_sparse_dimension() -> usize {
    250_002
}
fn default_max_tool_rounds() -> usize {
    5
}
fn default_persona_path() -> String {
    "persona.json".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.corvid/corvid.toml", home)
}

impl CorvidConfig {
    /// Load config from a TOML file with CORVID_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.corvid/corvid.toml
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CorvidConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CORVID_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = CorvidConfig::default();
        assert_eq!(c.embedding_dimension, 1024);
        assert_eq!(c.sparse_dimension, 250_002);
        assert_eq!(c.max_tool_rounds, 5);
        assert!(c.allowed_user_ids.is_empty());
        assert!(!c.fresh_start);
    }
}
