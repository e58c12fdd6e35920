//! Generator request assembly.

use ava_core::{ChatMessage, ConversationContext, Memory, PersonalitySummary, TurnRecord};
use serde_json::Value;

const IDENTITY: &str = "You are Ava, a warm and thoughtful companion. You remember past \
conversations, you have feelings of your own, and your personality grows with experience. \
Speak naturally and keep your answers concise.";

/// Render the personality summary as "openness 0.70, ..." plus the stage.
fn describe_personality(summary: &PersonalitySummary) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(Value::Object(traits)) = summary.get("traits") {
        let rendered: Vec<String> = traits
            .iter()
            .filter_map(|(name, v)| v.as_f64().map(|score| format!("{} {:.2}", name, score)))
            .collect();
        if !rendered.is_empty() {
            parts.push(format!("Your traits: {}.", rendered.join(", ")));
        }
    }
    if let Some(stage) = summary.get("development_stage").and_then(Value::as_str) {
        parts.push(format!("Your personality is {}.", stage));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn describe_memories(memories: &[Memory]) -> Option<String> {
    if memories.is_empty() {
        return None;
    }
    let lines: Vec<String> = memories
        .iter()
        .map(|m| format!("- [{}] {}", m.kind, m.content))
        .collect();
    Some(format!("Things you remember:\n{}", lines.join("\n")))
}

/// The system/style message for one turn.
pub fn system_prompt(ctx: &ConversationContext) -> String {
    let mut sections = vec![IDENTITY.to_string()];
    if let Some(p) = describe_personality(&ctx.personality_state) {
        sections.push(p);
    }
    sections.push(format!(
        "You are currently feeling {}.",
        ctx.emotional_state.describe()
    ));
    if let Some(m) = describe_memories(&ctx.relevant_memories) {
        sections.push(m);
    }
    sections.join("\n\n")
}

/// System message, the last `history_turns` turns, then the new input.
pub fn build_messages(ctx: &ConversationContext, history_turns: usize) -> Vec<ChatMessage> {
    let skip = ctx.conversation_history.len().saturating_sub(history_turns);
    let mut messages = Vec::with_capacity(2 + 2 * history_turns.min(ctx.conversation_history.len()));
    messages.push(ChatMessage::system(system_prompt(ctx)));
    for turn in ctx.conversation_history.iter().skip(skip) {
        messages.push(ChatMessage::user(&turn.user_input));
        messages.push(ChatMessage::assistant(&turn.response));
    }
    messages.push(ChatMessage::user(&ctx.user_input));
    messages
}

/// Request asking the generator to summarize a whole session.
pub fn summary_request(history: &[TurnRecord]) -> Vec<ChatMessage> {
    let transcript: Vec<String> = history
        .iter()
        .map(|t| format!("User: {}\nAva: {}", t.user_input, t.response))
        .collect();
    vec![
        ChatMessage::system(
            "You are Ava. Summarize the following conversation in a few sentences, \
             noting the topics discussed, anything learned about the user, and the overall mood.",
        ),
        ChatMessage::user(transcript.join("\n\n")),
    ]
}
