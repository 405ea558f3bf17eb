use std::sync::Arc;

use serde_json::json;

use corvid_core::types::{ToolCall, UserId};
use corvid_memory::embedding::EmbeddingProvider;
use corvid_memory::manager::MemoryStore;
use corvid_memory::types::{Collection, FilterExpr};
use corvid_policy::PolicyGate;

use crate::error::{Result, ToolError};

/// "Owner" value written into `bot_facts` — the collection's subject is the
/// persona itself, not any one user, so the owner field is reserved/empty.
const BOT_FACTS_RESERVED_OWNER: &str = "";
const DEFAULT_SEARCH_K: usize = 5;

/// Dispatches a model-issued tool invocation to a handler, validates and
/// normalises arguments, and serialises the result as a text payload for
/// the model. Everything here is gated by `PolicyGate` first.
pub struct ToolRouter {
    store: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    gate: Arc<PolicyGate>,
    persona_name: String,
}

impl ToolRouter {
    pub fn new(
        store: Arc<MemoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        gate: Arc<PolicyGate>,
        persona_name: String,
    ) -> Self {
        Self {
            store,
            embedder,
            gate,
            persona_name,
        }
    }

    /// `execute(user_id, tool_call) -> text_payload`.
    pub async fn execute(&self, user_id: UserId, tool_call: &ToolCall) -> Result<String> {
        if !self.gate.is_tool_allowed(user_id, &tool_call.name) {
            return Err(ToolError::PermissionDenied(format!(
                "tool '{}' is not permitted for this user",
                tool_call.name
            )));
        }

        let args: serde_json::Value = serde_json::from_str(&tool_call.arguments)
            .map_err(|e| ToolError::ArgumentError(format!("malformed JSON arguments: {e}")))?;

        match tool_call.name.as_str() {
            "store_person_memory" => self.store_person_memory(&args).await,
            "store_self_memory" => self.store_self_memory(&args).await,
            "store_community_memory" => self.store_community_memory(&args).await,
            "remember_about_person" => self.remember_about_person(&args).await,
            "remember_about_community" => self.remember_about_community(&args).await,
            "remember_about_self" => self.remember_about_self(&args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn store_person_memory(&self, args: &serde_json::Value) -> Result<String> {
        let memory_text = required_str(args, "memory_text")?;
        let telegram_id = required_str(args, "telegram_id")?;
        let person_name = required_str(args, "person_name")?;

        let (dense, sparse) = self
            .embedder
            .embed(memory_text)
            .await
            .map_err(ToolError::BackendError)?;

        let id = self
            .store
            .store_fact(
                Collection::People,
                telegram_id,
                person_name,
                memory_text,
                Default::default(),
                dense,
                sparse,
            )
            .await?;

        Ok(format!("Remembered about {person_name} (fact id {id})."))
    }

    async fn store_self_memory(&self, args: &serde_json::Value) -> Result<String> {
        let memory_text = required_str(args, "memory_text")?;

        let (dense, sparse) = self
            .embedder
            .embed(memory_text)
            .await
            .map_err(ToolError::BackendError)?;

        let id = self
            .store
            .store_fact(
                Collection::Bot,
                BOT_FACTS_RESERVED_OWNER,
                &self.persona_name,
                memory_text,
                Default::default(),
                dense,
                sparse,
            )
            .await?;

        Ok(format!("Remembered about myself (fact id {id})."))
    }

    async fn store_community_memory(&self, args: &serde_json::Value) -> Result<String> {
        let community_name = required_str(args, "community_name")?;
        let memory_text = required_str(args, "memory_text")?;

        let (dense, sparse) = self
            .embedder
            .embed(memory_text)
            .await
            .map_err(ToolError::BackendError)?;

        let id = self
            .store
            .store_fact(
                Collection::Community,
                community_name,
                community_name,
                memory_text,
                Default::default(),
                dense,
                sparse,
            )
            .await?;

        Ok(format!("Remembered about {community_name} (fact id {id})."))
    }

    async fn remember_about_person(&self, args: &serde_json::Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let k = optional_k(args);

        let mut filter = FilterExpr::new();
        if let Some(telegram_id) = optional_str(args, "telegram_id") {
            filter
                .push_equals("telegram_id", telegram_id)
                .map_err(ToolError::ArgumentError)?;
        }
        if let Some(person_name) = optional_str(args, "person_name") {
            filter
                .push_prefix("telegram_name", person_name)
                .map_err(ToolError::ArgumentError)?;
        }

        self.search_and_render(Collection::People, query, k, &filter).await
    }

    async fn remember_about_community(&self, args: &serde_json::Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let k = optional_k(args);

        let mut filter = FilterExpr::new();
        if let Some(community_name) = optional_str(args, "community_name") {
            filter
                .push_equals("owner_id", community_name)
                .map_err(ToolError::ArgumentError)?;
        }

        self.search_and_render(Collection::Community, query, k, &filter).await
    }

    async fn remember_about_self(&self, args: &serde_json::Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let k = optional_k(args);
        self.search_and_render(Collection::Bot, query, k, &FilterExpr::new()).await
    }

    async fn search_and_render(
        &self,
        collection: Collection,
        query: &str,
        k: usize,
        filter: &FilterExpr,
    ) -> Result<String> {
        let (dense, sparse) = self
            .embedder
            .embed(query)
            .await
            .map_err(ToolError::BackendError)?;

        let results = self
            .store
            .search_facts(collection, &dense, &sparse, k, filter)
            .await?;

        if results.is_empty() {
            return Ok(json!({"memories": [], "message": "No relevant memories found."}).to_string());
        }

        let memories: Vec<serde_json::Value> = results
            .iter()
            .map(|(fact, score)| {
                json!({
                    "memory": fact.text,
                    "score": score,
                    "name": fact.name,
                    "telegram_id": fact.owner_id,
                    "timestamp": fact.created_at.to_rfc3339(),
                    "metadata": fact.metadata,
                })
            })
            .collect();

        Ok(json!({ "memories": memories }).to_string())
    }
}

fn required_str<'a>(args: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::ArgumentError(format!("missing required field '{field}'")))
}

fn optional_str<'a>(args: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    args.get(field).and_then(|v| v.as_str())
}

/// `k` defaults to 5; any value `<= 0` is coerced to the default.
fn optional_k(args: &serde_json::Value) -> usize {
    match args.get("k").and_then(|v| v.as_i64()) {
        Some(k) if k > 0 => k as usize,
        _ => DEFAULT_SEARCH_K,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_memory::embedding::test_support::StubEmbeddingProvider;

    fn gate_allow_all() -> Arc<PolicyGate> {
        Arc::new(PolicyGate::new(vec![], vec![]))
    }

    #[tokio::test]
    async fn unknown_tool_name_is_rejected_even_for_admin() {
        let gate = Arc::new(PolicyGate::new(vec![1], vec![]));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider { dim: 8 });
        // Without a live Qdrant we only exercise argument/policy branches;
        // an unknown tool name never reaches the store.
        let store = Arc::new(MemoryStore::new("http://localhost:6334", 8).unwrap());
        let router = ToolRouter::new(store, embedder, gate, "aria".to_string());
        let call = ToolCall {
            id: "1".to_string(),
            name: "drop_database".to_string(),
            arguments: "{}".to_string(),
        };
        let err = router.execute(UserId(1), &call).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn permission_denied_before_argument_parsing() {
        let gate = gate_allow_all();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider { dim: 8 });
        let store = Arc::new(MemoryStore::new("http://localhost:6334", 8).unwrap());
        let router = ToolRouter::new(store, embedder, gate, "aria".to_string());
        let call = ToolCall {
            id: "1".to_string(),
            name: "send_voice_note".to_string(),
            arguments: "not even valid json".to_string(),
        };
        let err = router.execute(UserId(1), &call).await.unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }

    #[test]
    fn k_coercion_defaults_on_non_positive() {
        assert_eq!(optional_k(&json!({"k": 0})), DEFAULT_SEARCH_K);
        assert_eq!(optional_k(&json!({"k": -3})), DEFAULT_SEARCH_K);
        assert_eq!(optional_k(&json!({"k": 2})), 2);
        assert_eq!(optional_k(&json!({})), DEFAULT_SEARCH_K);
    }
}
