//! In-memory conversation state (C6): one message log and one resolved
//! identity per chat. Both maps are sharded `DashMap`s so a mutation never
//! holds a lock across network I/O — only across the map access itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use corvid_core::types::{ChatId, Message, UserIdentity};
use corvid_memory::embedding::EmbeddingProvider;
use corvid_memory::manager::MemoryStore;
use corvid_memory::types::{Collection, FilterExpr};

const IDENTITY_SEED_TIMEOUT: Duration = Duration::from_secs(5);
const IDENTITY_SEED_SOURCE: &str = "identity_seed";

pub struct SessionManager {
    sessions: DashMap<ChatId, Vec<Message>>,
    identities: Arc<DashMap<ChatId, UserIdentity>>,
    store: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SessionManager {
    pub fn new(store: Arc<MemoryStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            sessions: DashMap::new(),
            identities: Arc::new(DashMap::new()),
            store,
            embedder,
        }
    }

    /// Returns the chat's message log, creating it with a single blank
    /// system-role entry if this is the first turn seen for `chat_id`. The
    /// composed system prompt is written back in every turn via
    /// `set_system_message`, since it depends on retrieved context that
    /// changes turn to turn.
    pub fn get_or_create(&self, chat_id: ChatId) -> Vec<Message> {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| vec![Message::system(String::new())])
            .clone()
    }

    /// Appends one message to the chat's log. Creates the log (with a blank
    /// system message at position 0) if this is the first turn.
    pub fn append(&self, chat_id: ChatId, message: Message) {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| vec![Message::system(String::new())])
            .push(message);
    }

    /// Overwrites the system message at position 0 with freshly composed
    /// prompt text, leaving the rest of the history untouched.
    pub fn set_system_message(&self, chat_id: ChatId, system_prompt: impl Into<String>) {
        let mut entry = self
            .sessions
            .entry(chat_id)
            .or_insert_with(|| vec![Message::system(String::new())]);
        if let Some(first) = entry.first_mut() {
            *first = Message::system(system_prompt);
        } else {
            entry.push(Message::system(system_prompt));
        }
    }

    /// Discards history and replaces it with a single fresh system message.
    pub fn reset(&self, chat_id: ChatId, system_prompt: impl Into<String>) {
        self.sessions.insert(chat_id, vec![Message::system(system_prompt)]);
    }

    /// Updates the resolved identity for `chat_id`. If this is the first
    /// time identity facts have been confirmed seeded for this user, spawns
    /// a detached, best-effort background task to write them; the seeded
    /// flag is set unconditionally once that task finishes (or times out),
    /// so a slow or unreachable backend never blocks the caller and never
    /// retries forever.
    pub fn record_identity(&self, chat_id: ChatId, identity: UserIdentity) {
        let should_seed = !identity.identity_facts_seeded;
        self.identities.insert(chat_id, identity.clone());

        if !should_seed {
            return;
        }

        let store = self.store.clone();
        let embedder = self.embedder.clone();
        let identities = self.identities.clone();

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                IDENTITY_SEED_TIMEOUT,
                seed_identity_facts(store, embedder, &identity),
            )
            .await;

            match outcome {
                Ok(Ok(())) => info!(chat_id = %chat_id, "identity facts seeded"),
                Ok(Err(e)) => warn!(chat_id = %chat_id, error = %e, "identity fact seeding failed"),
                Err(_) => warn!(chat_id = %chat_id, "identity fact seeding timed out"),
            }

            if let Some(mut entry) = identities.get_mut(&chat_id) {
                entry.identity_facts_seeded = true;
            }
        });
    }

    pub fn identity(&self, chat_id: ChatId) -> Option<UserIdentity> {
        self.identities.get(&chat_id).map(|r| r.clone())
    }
}

/// Best-effort existence check plus write: searches `people_facts` for an
/// exact owner match, then inspects the returned facts' metadata for the
/// `identity_seed` provenance tag (the filter grammar only covers
/// owner/name equality, so the provenance check happens client-side).
/// Writes a handle fact and a full-name fact when none is found.
async fn seed_identity_facts(
    store: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    identity: &UserIdentity,
) -> crate::error::Result<()> {
    let owner = identity.user_id.to_string();

    let mut filter = FilterExpr::new();
    filter
        .push_equals("telegram_id", owner.clone())
        .map_err(corvid_memory::error::MemoryError::InvalidFilter)?;

    let existing = store
        .scroll_by_filter(Collection::People, &filter, 10)
        .await
        .unwrap_or_default();

    let already_seeded = existing.iter().any(|fact| {
        fact.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .map(|s| s == IDENTITY_SEED_SOURCE)
            .unwrap_or(false)
    });
    if already_seeded {
        return Ok(());
    }

    let name = identity
        .handle_or_full_name()
        .unwrap_or("unknown")
        .to_string();

    let mut candidates: Vec<String> = Vec::new();
    if let Some(handle) = &identity.handle {
        candidates.push(format!("This person's handle is @{handle}."));
    }
    if let Some(full_name) = &identity.full_name {
        candidates.push(format!("This person's name is {full_name}."));
    }
    if candidates.is_empty() {
        return Ok(());
    }

    for text in candidates {
        let (dense, sparse) = embedder
            .embed(&text)
            .await
            .map_err(|_| corvid_memory::error::MemoryError::EmbeddingIncomplete(text.clone()))?;

        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        metadata.insert("source".to_string(), serde_json::json!(IDENTITY_SEED_SOURCE));

        store
            .store_fact(Collection::People, &owner, &name, &text, metadata, dense, sparse)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_memory::embedding::test_support::StubEmbeddingProvider;

    fn manager() -> SessionManager {
        let store = Arc::new(MemoryStore::new("http://localhost:6334", 8).unwrap());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider { dim: 8 });
        SessionManager::new(store, embedder)
    }

    #[test]
    fn get_or_create_seeds_blank_system_message() {
        let mgr = manager();
        let log = mgr.get_or_create(ChatId(1));
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, corvid_core::types::Role::System);
    }

    #[test]
    fn append_preserves_order() {
        let mgr = manager();
        mgr.get_or_create(ChatId(1));
        mgr.append(ChatId(1), Message::user("hello", vec![]));
        mgr.append(ChatId(1), Message::assistant("hi there", vec![]));
        let log = mgr.get_or_create(ChatId(1));
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].content, "hello");
        assert_eq!(log[2].content, "hi there");
    }

    #[test]
    fn reset_replaces_entire_log() {
        let mgr = manager();
        mgr.append(ChatId(1), Message::user("hello", vec![]));
        mgr.reset(ChatId(1), "fresh start");
        let log = mgr.get_or_create(ChatId(1));
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, "fresh start");
    }

    #[test]
    fn set_system_message_overwrites_position_zero_only() {
        let mgr = manager();
        mgr.get_or_create(ChatId(1));
        mgr.append(ChatId(1), Message::user("hello", vec![]));
        mgr.set_system_message(ChatId(1), "you are aria");
        let log = mgr.get_or_create(ChatId(1));
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "you are aria");
        assert_eq!(log[1].content, "hello");
    }

    #[test]
    fn separate_chats_do_not_share_history() {
        let mgr = manager();
        mgr.append(ChatId(1), Message::user("chat one", vec![]));
        mgr.append(ChatId(2), Message::user("chat two", vec![]));
        assert_eq!(mgr.get_or_create(ChatId(1)).len(), 2);
        assert_eq!(mgr.get_or_create(ChatId(2)).len(), 2);
        assert_eq!(mgr.get_or_create(ChatId(1))[1].content, "chat one");
    }
}
