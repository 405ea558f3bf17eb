//! The agent orchestrator (C7): the bounded tool-calling loop that drives
//! the LLM, routes tool calls, enforces the round budget, and applies the
//! voice-suppression rule.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use corvid_core::types::{ChatId, Message, ToolCall, UserId, UserIdentity};
use corvid_memory::embedding::EmbeddingProvider;
use corvid_memory::manager::MemoryStore;
use corvid_memory::persona::Persona;
use corvid_memory::types::{Collection, FilterExpr};
use corvid_policy::PolicyGate;
use corvid_prompt::{compose, RetrievedContext};
use corvid_session::SessionManager;
use corvid_tools::spec::{filter_for_user, ToolSpec};
use corvid_tools::ToolRouter;

use crate::error::{AgentError, Result};
use crate::provider::{ChatRequest, LlmProvider, ProviderError, ToolDefinition};
use crate::transport::{ImageSender, VoiceNoteSender};

/// A single tool's execution outcome, folded into the session as a
/// `role=tool` message regardless of success or failure.
struct ToolOutcome {
    payload: String,
    ok: bool,
}

pub struct AgentOrchestrator {
    provider: Arc<dyn LlmProvider>,
    sessions: Arc<SessionManager>,
    router: Arc<ToolRouter>,
    policy: Arc<PolicyGate>,
    memory: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    persona: Arc<Persona>,
    voice: Arc<dyn VoiceNoteSender>,
    image: Arc<dyn ImageSender>,
    tool_specs: Vec<ToolSpec>,
    max_tool_rounds: usize,
}

#[allow(clippy::too_many_arguments)]
impl AgentOrchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        sessions: Arc<SessionManager>,
        router: Arc<ToolRouter>,
        policy: Arc<PolicyGate>,
        memory: Arc<MemoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        persona: Arc<Persona>,
        voice: Arc<dyn VoiceNoteSender>,
        image: Arc<dyn ImageSender>,
        tool_specs: Vec<ToolSpec>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            provider,
            sessions,
            router,
            policy,
            memory,
            embedder,
            persona,
            voice,
            image,
            tool_specs,
            max_tool_rounds,
        }
    }

    /// Runs one full turn: appends the user message, composes the system
    /// prompt, and drives the bounded tool-calling loop. Returns the final
    /// user-visible text (possibly empty under voice suppression).
    pub async fn handle_turn(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        identity: UserIdentity,
        text: String,
        images: Vec<String>,
    ) -> Result<String> {
        self.sessions.record_identity(chat_id, identity.clone());
        self.sessions.append(chat_id, Message::user(text.clone(), images));

        let system_prompt = self.compose_system_prompt(&text, user_id, &identity).await;
        self.sessions.set_system_message(chat_id, system_prompt);

        let tool_defs = self.build_tool_defs(user_id);
        let mut voice_suppressed = false;

        for round in 0..self.max_tool_rounds {
            debug!(chat_id = %chat_id, round, "agent loop round");
            let history = self.sessions.get_or_create(chat_id);
            let req = ChatRequest {
                messages: history,
                tools: tool_defs.clone(),
            };

            let response = self.provider.send(&req).await.map_err(AgentError::Llm)?;

            if response.tool_calls.is_empty() {
                self.sessions
                    .append(chat_id, Message::assistant(response.content.clone(), vec![]));
                let mut content = response.content;
                if voice_suppressed {
                    content.clear();
                }
                return Ok(content);
            }

            self.sessions.append(
                chat_id,
                Message::assistant(response.content.clone(), response.tool_calls.clone()),
            );

            if round == self.max_tool_rounds - 1 {
                let mut content = response.content;
                if voice_suppressed {
                    content.clear();
                }
                return Ok(content);
            }

            let mut round_succeeded = false;
            let mut round_sent_voice = false;

            for tc in &response.tool_calls {
                debug!(tool = %tc.name, "executing tool");
                let outcome = self.process_tool_call(tc, &identity, user_id, chat_id).await;
                self.sessions
                    .append(chat_id, Message::tool_result(tc.id.clone(), outcome.payload));
                if outcome.ok {
                    round_succeeded = true;
                }
                if tc.name == "send_voice_note" && outcome.ok {
                    round_sent_voice = true;
                }
            }

            voice_suppressed = round_sent_voice && round_succeeded;
        }

        unreachable!("loop always returns within max_tool_rounds iterations")
    }

    async fn compose_system_prompt(&self, query: &str, user_id: UserId, identity: &UserIdentity) -> String {
        let retrieved = match self.embedder.embed(query).await {
            Ok((dense, sparse)) => {
                let personal_facts = self
                    .memory
                    .search_facts(Collection::Bot, &dense, &sparse, 3, &FilterExpr::new())
                    .await
                    .unwrap_or_default();

                let mut person_filter = FilterExpr::new();
                let _ = person_filter.push_equals("telegram_id", user_id.to_string());
                let person_facts = self
                    .memory
                    .search_facts(Collection::People, &dense, &sparse, 3, &person_filter)
                    .await
                    .unwrap_or_default();

                let community_facts = self
                    .memory
                    .search_facts(Collection::Community, &dense, &sparse, 3, &FilterExpr::new())
                    .await
                    .unwrap_or_default();

                RetrievedContext {
                    personal_facts: personal_facts.into_iter().map(|(f, _)| f.text).collect(),
                    person_facts: person_facts.into_iter().map(|(f, _)| f.text).collect(),
                    community_facts: community_facts.into_iter().map(|(f, _)| f.text).collect(),
                }
            }
            Err(e) => {
                warn!(error = %e, "retrieval embedding failed, composing prompt without memory context");
                RetrievedContext::default()
            }
        };

        compose(&self.persona, Some(identity), Some(&retrieved))
    }

    fn build_tool_defs(&self, user_id: UserId) -> Vec<ToolDefinition> {
        let gated = filter_for_user(&self.tool_specs, &self.policy, user_id);
        let always_on = self
            .tool_specs
            .iter()
            .filter(|s| s.function.name == "send_voice_note" || s.function.name == "send_urls_as_image");

        gated
            .iter()
            .chain(always_on)
            .map(|s| ToolDefinition {
                name: s.function.name.clone(),
                description: s.function.description.clone(),
                parameters: s.function.parameters.clone(),
            })
            .collect()
    }

    async fn process_tool_call(
        &self,
        tc: &ToolCall,
        identity: &UserIdentity,
        user_id: UserId,
        chat_id: ChatId,
    ) -> ToolOutcome {
        match tc.name.as_str() {
            "send_voice_note" => self.dispatch_voice_note(tc, chat_id).await,
            "send_urls_as_image" => self.dispatch_image(tc, chat_id).await,
            "store_person_memory" => {
                let injected = inject_person_args(&tc.arguments, user_id, identity);
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: injected,
                };
                self.dispatch_router(&call, user_id).await
            }
            _ => self.dispatch_router(tc, user_id).await,
        }
    }

    async fn dispatch_router(&self, tc: &ToolCall, user_id: UserId) -> ToolOutcome {
        match self.router.execute(user_id, tc).await {
            Ok(payload) => ToolOutcome { payload, ok: true },
            Err(e) => ToolOutcome {
                payload: e.to_string(),
                ok: false,
            },
        }
    }

    async fn dispatch_voice_note(&self, tc: &ToolCall, chat_id: ChatId) -> ToolOutcome {
        let args: serde_json::Value = match serde_json::from_str(&tc.arguments) {
            Ok(v) => v,
            Err(e) => {
                return ToolOutcome {
                    payload: format!("malformed arguments: {e}"),
                    ok: false,
                }
            }
        };
        let text = args.get("message").and_then(|v| v.as_str()).unwrap_or_default();
        match self.voice.send_voice_note(chat_id, text).await {
            Ok(()) => {
                info!(chat_id = %chat_id, "voice note sent");
                ToolOutcome {
                    payload: "Voice note sent.".to_string(),
                    ok: true,
                }
            }
            Err(e) => ToolOutcome {
                payload: format!("failed to send voice note: {e}"),
                ok: false,
            },
        }
    }

    async fn dispatch_image(&self, tc: &ToolCall, chat_id: ChatId) -> ToolOutcome {
        let args: serde_json::Value = match serde_json::from_str(&tc.arguments) {
            Ok(v) => v,
            Err(e) => {
                return ToolOutcome {
                    payload: format!("malformed arguments: {e}"),
                    ok: false,
                }
            }
        };
        let urls: Vec<String> = args
            .get("urls")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|u| u.as_str().map(String::from)).collect())
            .unwrap_or_default();

        match self.image.send_urls_as_image(chat_id, &urls).await {
            Ok(()) => ToolOutcome {
                payload: "Image sent.".to_string(),
                ok: true,
            },
            Err(e) => ToolOutcome {
                payload: format!("failed to send image: {e}"),
                ok: false,
            },
        }
    }
}

/// Injects `telegram_id`/`person_name` into `store_person_memory`'s argument
/// object when the model omitted them, per §4.7. Malformed input is passed
/// through unchanged — the router will reject it with a typed error.
fn inject_person_args(raw_arguments: &str, user_id: UserId, identity: &UserIdentity) -> String {
    let Ok(serde_json::Value::Object(mut map)) = serde_json::from_str(raw_arguments) else {
        return raw_arguments.to_string();
    };

    map.entry("telegram_id")
        .or_insert_with(|| json!(user_id.to_string()));

    if !map.contains_key("person_name") {
        let name = identity.handle_or_full_name().unwrap_or("unknown");
        map.insert("person_name".to_string(), json!(name));
    }

    serde_json::Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::ScriptedProvider;
    use crate::provider::ChatResponse;
    use crate::transport::test_support::CountingTransport;
    use corvid_memory::embedding::test_support::StubEmbeddingProvider;
    use corvid_policy::PolicyGate;
    use corvid_tools::ToolRouter;

    fn persona() -> Persona {
        Persona {
            name: "Aria".to_string(),
            pre_prompt: "You are Aria.".to_string(),
            bio: vec![],
            lore: vec![],
            knowledge: vec![],
            examples: vec![],
            topics: vec![],
            adjectives: vec!["witty".to_string()],
            style: vec![],
        }
    }

    fn make_orchestrator(provider: ScriptedProvider, max_tool_rounds: usize) -> AgentOrchestrator {
        let store = Arc::new(MemoryStore::new("http://localhost:6334", 8).unwrap());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider { dim: 8 });
        let gate = Arc::new(PolicyGate::new(vec![], vec![]));
        let router = Arc::new(ToolRouter::new(store.clone(), embedder.clone(), gate.clone(), "Aria".to_string()));
        let sessions = Arc::new(SessionManager::new(store.clone(), embedder.clone()));
        let transport = Arc::new(CountingTransport::default());

        AgentOrchestrator::new(
            Arc::new(provider),
            sessions,
            router,
            gate,
            store,
            embedder,
            Arc::new(persona()),
            transport.clone(),
            transport,
            Vec::new(),
            max_tool_rounds,
        )
    }

    fn identity(id: i64) -> UserIdentity {
        let mut identity = UserIdentity::new(UserId(id));
        identity.handle = Some("alice".to_string());
        identity
    }

    #[tokio::test]
    async fn happy_path_no_tools_returns_model_text_verbatim() {
        let provider = ScriptedProvider::new(vec![ChatResponse {
            content: "Hello there!".to_string(),
            tool_calls: vec![],
            stop_reason: "end_turn".to_string(),
        }]);
        let orchestrator = make_orchestrator(provider, 5);
        let reply = orchestrator
            .handle_turn(ChatId(1), UserId(1), identity(1), "hi".to_string(), vec![])
            .await
            .unwrap();
        assert_eq!(reply, "Hello there!");
    }

    #[tokio::test]
    async fn max_rounds_cap_halts_after_n_calls_without_further_llm_calls() {
        let scripted_calls = (0..5)
            .map(|i| ChatResponse {
                content: format!("round {i}"),
                tool_calls: vec![ToolCall {
                    id: format!("call-{i}"),
                    name: "remember_about_self".to_string(),
                    arguments: json!({"query": "test"}).to_string(),
                }],
                stop_reason: "tool_use".to_string(),
            })
            .collect();
        let provider = ScriptedProvider::new(scripted_calls);
        let orchestrator = make_orchestrator(provider, 5);
        let reply = orchestrator
            .handle_turn(ChatId(2), UserId(1), identity(1), "remember anything?".to_string(), vec![])
            .await
            .unwrap();
        assert_eq!(reply, "round 4");
    }

    #[tokio::test]
    async fn voice_suppression_blanks_final_text_after_successful_send() {
        let provider = ScriptedProvider::new(vec![
            ChatResponse {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "v1".to_string(),
                    name: "send_voice_note".to_string(),
                    arguments: json!({"message": "Hello"}).to_string(),
                }],
                stop_reason: "tool_use".to_string(),
            },
            ChatResponse {
                content: "Hope you like it!".to_string(),
                tool_calls: vec![],
                stop_reason: "end_turn".to_string(),
            },
        ]);
        let orchestrator = make_orchestrator(provider, 5);
        let reply = orchestrator
            .handle_turn(ChatId(3), UserId(1), identity(1), "send me a voice note".to_string(), vec![])
            .await
            .unwrap();
        assert_eq!(reply, "");

        let history = orchestrator.sessions.get_or_create(ChatId(3));
        assert!(history.iter().any(|m| m.content == "Hope you like it!"));
    }

    #[tokio::test]
    async fn store_person_memory_gets_caller_identity_injected() {
        let provider = ScriptedProvider::new(vec![
            ChatResponse {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "t1".to_string(),
                    name: "store_person_memory".to_string(),
                    arguments: json!({"memory_text": "loves jazz"}).to_string(),
                }],
                stop_reason: "tool_use".to_string(),
            },
            ChatResponse {
                content: "Got it.".to_string(),
                tool_calls: vec![],
                stop_reason: "end_turn".to_string(),
            },
        ]);
        let orchestrator = make_orchestrator(provider, 5);
        let reply = orchestrator
            .handle_turn(ChatId(4), UserId(42), identity(42), "remember this about me".to_string(), vec![])
            .await
            .unwrap();
        assert_eq!(reply, "Got it.");
    }

    #[test]
    fn inject_person_args_fills_missing_fields() {
        let identity = identity(42);
        let injected = inject_person_args(&json!({"memory_text": "loves jazz"}).to_string(), UserId(42), &identity);
        let parsed: serde_json::Value = serde_json::from_str(&injected).unwrap();
        assert_eq!(parsed["telegram_id"], "42");
        assert_eq!(parsed["person_name"], "alice");
    }

    #[test]
    fn inject_person_args_leaves_explicit_fields_alone() {
        let identity = identity(42);
        let injected = inject_person_args(
            &json!({"memory_text": "loves jazz", "telegram_id": "7", "person_name": "bob"}).to_string(),
            UserId(42),
            &identity,
        );
        let parsed: serde_json::Value = serde_json::from_str(&injected).unwrap();
        assert_eq!(parsed["telegram_id"], "7");
        assert_eq!(parsed["person_name"], "bob");
    }
}
