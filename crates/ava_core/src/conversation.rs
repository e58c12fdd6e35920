use crate::emotion::EmotionalSnapshot;
use crate::memory::Memory;
use crate::PersonalitySummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a generator request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completed user/assistant exchange. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub user_input: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl TurnRecord {
    pub fn new(user_input: &str, response: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything gathered for a single turn before generation.
/// Built fresh per turn and not modified afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationContext {
    pub user_input: String,
    pub emotional_state: EmotionalSnapshot,
    pub personality_state: PersonalitySummary,
    pub relevant_memories: Vec<Memory>,
    pub conversation_history: Vec<TurnRecord>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(
        user_input: &str,
        emotional_state: EmotionalSnapshot,
        personality_state: PersonalitySummary,
        relevant_memories: Vec<Memory>,
        conversation_history: Vec<TurnRecord>,
    ) -> Self {
        Self {
            user_input: user_input.to_string(),
            emotional_state,
            personality_state,
            relevant_memories,
            conversation_history,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = ConversationContext::new(
            "test",
            EmotionalSnapshot::neutral(),
            PersonalitySummary::new(),
            vec![],
            vec![],
        );
        assert_eq!(ctx.user_input, "test");
        assert_eq!(ctx.emotional_state.primary, "neutral");
        assert!(ctx.timestamp <= Utc::now());
    }

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }
}
