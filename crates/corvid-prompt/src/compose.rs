//! System prompt composition (C5).
//!
//! Section order is fixed because test snapshots depend on it: pre-prompt,
//! style guidelines, topics, adjectives, few-shot examples, personal facts,
//! known-person facts, known-community facts, identity line, wall-clock
//! times, closing instruction. Absent sections are omitted entirely, never
//! rendered as empty headings — this mirrors the way the teacher's
//! `WorkspaceLoader` skips missing workspace files rather than emitting a
//! blank section for them.

use corvid_core::clock::persona_locale_times;
use corvid_core::types::UserIdentity;
use corvid_memory::persona::Persona;

/// Retrieved memory, already rendered into plain strings by the caller
/// (the orchestrator decides what to fetch and how much context budget to
/// spend on it; the composer only knows how to slot it into the prompt).
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub personal_facts: Vec<String>,
    pub person_facts: Vec<String>,
    pub community_facts: Vec<String>,
}

pub fn compose(
    persona: &Persona,
    user_identity: Option<&UserIdentity>,
    retrieved: Option<&RetrievedContext>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !persona.pre_prompt.is_empty() {
        sections.push(persona.pre_prompt.clone());
    }

    if !persona.style.is_empty() {
        sections.push(format!("Style guidelines:\n{}", bullet_list(&persona.style)));
    }

    if !persona.topics.is_empty() {
        sections.push(format!("Topics: {}", persona.topics.join(", ")));
    }

    if !persona.adjectives.is_empty() {
        sections.push(format!("Adjectives: {}", persona.adjectives.join(", ")));
    }

    if !persona.examples.is_empty() {
        sections.push(format!("Example dialogues:\n{}", bullet_list(&persona.examples)));
    }

    if let Some(ctx) = retrieved {
        if !ctx.personal_facts.is_empty() {
            sections.push(format!("What you know about yourself:\n{}", bullet_list(&ctx.personal_facts)));
        }
        if !ctx.person_facts.is_empty() {
            sections.push(format!("What you know about this person:\n{}", bullet_list(&ctx.person_facts)));
        }
        if !ctx.community_facts.is_empty() {
            sections.push(format!("What you know about this community:\n{}", bullet_list(&ctx.community_facts)));
        }
    }

    if let Some(identity) = user_identity {
        sections.push(identity_line(identity));
    }

    sections.push(locale_times_section());

    sections.push(format!("Stay in character as {} at all times.", persona.name));

    sections.join("\n\n")
}

/// Prefixes a raw image-generation prompt with the persona framing, per the
/// image-prompt-enhancement contract: "Create an image as if you were
/// <persona-name>, who is <first three adjectives>."
pub fn image_prompt_enhancement(persona: &Persona, raw_prompt: &str) -> String {
    let adjectives = persona
        .adjectives
        .iter()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Create an image as if you were {}, who is {}. {}",
        persona.name, adjectives, raw_prompt
    )
}

fn identity_line(identity: &UserIdentity) -> String {
    let name = identity
        .full_name
        .clone()
        .or_else(|| identity.display_name.clone())
        .unwrap_or_else(|| "the user".to_string());
    match &identity.handle {
        Some(handle) => format!("You are speaking with {name} (@{handle})."),
        None => format!("You are speaking with {name}."),
    }
}

fn locale_times_section() -> String {
    let times = persona_locale_times();
    let rendered: Vec<String> = times
        .iter()
        .map(|t| format!("{}: {}", t.label, t.formatted))
        .collect();
    format!("Current local time:\n{}", bullet_list(&rendered))
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_persona() -> Persona {
        Persona {
            name: "Aria".to_string(),
            pre_prompt: "You are Aria, a helpful assistant.".to_string(),
            bio: vec![],
            lore: vec![],
            knowledge: vec![],
            examples: vec![],
            topics: vec![],
            adjectives: vec![],
            style: vec![],
        }
    }

    #[test]
    fn absent_sections_are_omitted_not_blank() {
        let persona = minimal_persona();
        let prompt = compose(&persona, None, None);
        assert!(!prompt.contains("Topics:"));
        assert!(!prompt.contains("Adjectives:"));
        assert!(!prompt.contains("Example dialogues"));
        assert!(prompt.contains("You are Aria"));
        assert!(prompt.contains("Stay in character as Aria"));
    }

    #[test]
    fn section_order_is_fixed() {
        let mut persona = minimal_persona();
        persona.topics = vec!["music".to_string()];
        persona.adjectives = vec!["witty".to_string(), "warm".to_string(), "curious".to_string()];
        let prompt = compose(&persona, None, None);
        let topics_pos = prompt.find("Topics:").unwrap();
        let adjectives_pos = prompt.find("Adjectives:").unwrap();
        let time_pos = prompt.find("Current local time").unwrap();
        let closing_pos = prompt.find("Stay in character").unwrap();
        assert!(topics_pos < adjectives_pos);
        assert!(adjectives_pos < time_pos);
        assert!(time_pos < closing_pos);
    }

    #[test]
    fn image_prompt_enhancement_uses_first_three_adjectives() {
        let mut persona = minimal_persona();
        persona.adjectives = vec![
            "witty".to_string(),
            "warm".to_string(),
            "curious".to_string(),
            "blunt".to_string(),
        ];
        let enhanced = image_prompt_enhancement(&persona, "a cat wearing a hat");
        assert!(enhanced.starts_with("Create an image as if you were Aria, who is witty, warm, curious."));
        assert!(enhanced.contains("a cat wearing a hat"));
        assert!(!enhanced.contains("blunt"));
    }

    #[test]
    fn identity_line_prefers_full_name_and_handle() {
        let identity = UserIdentity {
            user_id: corvid_core::types::UserId(42),
            handle: Some("alice".to_string()),
            display_name: Some("Al".to_string()),
            full_name: Some("Alice Example".to_string()),
            identity_facts_seeded: false,
        };
        let persona = minimal_persona();
        let prompt = compose(&persona, Some(&identity), None);
        assert!(prompt.contains("Alice Example (@alice)"));
    }
}
