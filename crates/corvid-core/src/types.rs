use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a user, as handed down by the chat transport
/// (e.g. a Telegram user id). 64-bit per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Identifies a chat/conversation. A session is keyed by this, not by user,
/// so that group chats with several participants share one message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// A role tag on a `Message`. Ordering within a session is strictly
/// insertion order; the role only disambiguates how a message is rendered
/// to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-originated request to invoke a named function. `arguments` is a
/// JSON object encoded as a string, matching the wire format in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One entry in a session's message log. Optional fields are populated only
/// for the roles that use them: `tool_calls` for role=assistant,
/// `tool_call_id` for role=tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Per-chat resolved user identity (C6 owns the map; C5 and C7 read it).
/// Mutable: updated on every inbound message. `identity_facts_seeded` is a
/// cache flag, not authoritative — losing it just means the background
/// seed task runs again and no-ops against existing facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub identity_facts_seeded: bool,
}

impl UserIdentity {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            handle: None,
            display_name: None,
            full_name: None,
            identity_facts_seeded: false,
        }
    }

    /// `identity.handle or identity.full_name`, used when injecting
    /// `person_name` for `store_person_memory`.
    pub fn handle_or_full_name(&self) -> Option<&str> {
        self.handle.as_deref().or(self.full_name.as_deref())
    }
}
