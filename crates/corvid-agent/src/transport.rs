//! The two transport-side tool actions the orchestrator dispatches directly,
//! bypassing C4/C3 entirely (§4.3, §4.7). The transport adapter, its image
//! download/re-encode step, and the text-to-speech client are all external
//! collaborators — these traits are the seam, not an implementation of them.

use async_trait::async_trait;

use corvid_core::types::ChatId;

#[async_trait]
pub trait VoiceNoteSender: Send + Sync {
    async fn send_voice_note(&self, chat_id: ChatId, text: &str) -> Result<(), String>;
}

#[async_trait]
pub trait ImageSender: Send + Sync {
    async fn send_urls_as_image(&self, chat_id: ChatId, urls: &[String]) -> Result<(), String>;
}
