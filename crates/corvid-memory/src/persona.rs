use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::manager::MemoryStore;
use crate::types::Collection;

/// The immutable character bundle. Not stored in C1 directly — its
/// bio/lore/knowledge entries are seeded into `bot_facts` with deterministic
/// ids (see `deterministic_fact_id`) so restarts are idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub pre_prompt: String,
    pub bio: Vec<String>,
    pub lore: Vec<String>,
    pub knowledge: Vec<String>,
    pub examples: Vec<String>,
    pub topics: Vec<String>,
    pub adjectives: Vec<String>,
    pub style: Vec<String>,
}

/// `"<persona>:" + hex(first 8 bytes of SHA-256(text))`.
///
/// Guarantees idempotent reseeding across restarts without a separate
/// existence table: the same (persona, text) pair always produces the same id.
pub fn deterministic_fact_id(persona_name: &str, text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{persona_name}:{}", hex::encode(&digest[..8]))
}

/// Seed the `bot_facts` collection from persona.bio ∪ persona.lore ∪
/// persona.knowledge. Skips any id that already exists unless `force_reload`
/// is set. Fails fast if the embedding provider returns an incomplete pair.
pub async fn ensure_persona_facts(
    store: &MemoryStore,
    embedder: &dyn EmbeddingProvider,
    persona: &Persona,
    force_reload: bool,
) -> Result<()> {
    let entries = persona
        .bio
        .iter()
        .map(|t| ("bio", t))
        .chain(persona.lore.iter().map(|t| ("lore", t)))
        .chain(persona.knowledge.iter().map(|t| ("knowledge", t)));

    for (kind, text) in entries {
        let id = deterministic_fact_id(&persona.name, text);

        if !force_reload && store.fact_exists(Collection::Bot, &id).await? {
            continue;
        }

        let (dense, sparse) = embedder
            .embed(text)
            .await
            .map_err(|_| MemoryError::EmbeddingIncomplete(text.clone()))?;
        if dense.is_empty() {
            return Err(MemoryError::EmbeddingIncomplete(text.clone()));
        }

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("source".to_string(), serde_json::json!("persona_seed"));
        metadata.insert("kind".to_string(), serde_json::json!(kind));

        store
            .store_fact_with_id(
                Collection::Bot,
                Some(id),
                "",
                &persona.name,
                text,
                metadata,
                dense,
                sparse,
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_id_matches_invariant() {
        // SHA-256("hello world") first 8 bytes, hex-encoded.
        let id = deterministic_fact_id("aria", "hello world");
        let digest = Sha256::digest(b"hello world");
        let expected_suffix = hex::encode(&digest[..8]);
        assert_eq!(id, format!("aria:{expected_suffix}"));
    }

    #[test]
    fn deterministic_id_is_stable_across_calls() {
        let a = deterministic_fact_id("aria", "the sky is blue");
        let b = deterministic_fact_id("aria", "the sky is blue");
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_id_differs_by_persona() {
        let a = deterministic_fact_id("aria", "same text");
        let b = deterministic_fact_id("nova", "same text");
        assert_ne!(a, b);
    }
}
