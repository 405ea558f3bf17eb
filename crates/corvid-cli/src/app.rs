//! Process bootstrap: load configuration and persona data, stand up the
//! memory store, and wire the policy/tool/session layers together. The LLM
//! client, embedding client, and chat transport are external collaborators
//! (§1) and are not constructed here — this binary demonstrates the wiring
//! and idles until shutdown.

use std::sync::Arc;

use tracing::info;

use corvid_core::config::CorvidConfig;
use corvid_memory::manager::MemoryStore;
use corvid_memory::persona::Persona;
use corvid_policy::PolicyGate;
use corvid_tools::spec::load_tool_specs;

pub struct Bootstrap {
    pub config: CorvidConfig,
    pub persona: Persona,
    pub memory: Arc<MemoryStore>,
    pub policy: Arc<PolicyGate>,
}

/// Runs the full bootstrap sequence and then blocks until the process
/// receives a shutdown signal. Returns `Err` only for fatal initialisation
/// failures (per §6, these map to process exit code 1).
pub async fn run(
    config_path: Option<&str>,
    character_override: Option<&str>,
    fresh_start_override: bool,
) -> anyhow::Result<()> {
    let mut config = CorvidConfig::load(config_path)?;
    if let Some(path) = character_override {
        config.persona_path = path.to_string();
    }
    if fresh_start_override {
        config.fresh_start = true;
    }

    info!(persona_path = %config.persona_path, fresh_start = config.fresh_start, "loaded configuration");

    let persona_json = std::fs::read_to_string(&config.persona_path)
        .map_err(|e| anyhow::anyhow!("failed to read persona file '{}': {e}", config.persona_path))?;
    let persona: Persona = serde_json::from_str(&persona_json)
        .map_err(|e| anyhow::anyhow!("failed to parse persona file '{}': {e}", config.persona_path))?;
    info!(persona = %persona.name, "loaded persona");

    let memory = Arc::new(MemoryStore::new(&config.qdrant_url, config.embedding_dimension)?);
    memory.ensure_collections(config.fresh_start).await?;
    info!("memory collections ready");

    let policy = Arc::new(PolicyGate::new(config.admin_user_ids.clone(), config.allowed_user_ids.clone()));

    let tool_spec_dir = std::path::Path::new("tools");
    let tool_specs = load_tool_specs(tool_spec_dir);
    info!(count = tool_specs.len(), "loaded tool specifications");

    let _bootstrap = Bootstrap {
        config,
        persona,
        memory,
        policy,
    };

    info!("bootstrap complete; waiting for the LLM provider, embedding provider, and chat transport to be wired in by the host process");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    Ok(())
}
