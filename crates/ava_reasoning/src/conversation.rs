//! Foreground conversation turns.
//!
//! One `process_message` call:
//! 1. gathers relevant memories, an emotional analysis of the input and the
//!    personality summary concurrently
//! 2. builds the generator request from that context plus recent history
//! 3. on success records the turn, then pushes the exchange into memory and
//!    the analysis into the emotion state (concurrently, both awaited)
//!
//! Lookup failures degrade to defaults. A generator failure yields
//! [`FALLBACK_RESPONSE`] and leaves every piece of state untouched.

use crate::prompts;
use anyhow::Result;
use ava_core::config::ConversationConfig;
use ava_core::{
    ConversationContext, EmotionPort, EmotionalSnapshot, ErrorLog, Generator, Memory, MemoryKind,
    MemoryPort, PersonalityPort, PersonalitySummary, Severity, TurnRecord,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const ERROR_SOURCE: &str = "conversation";

pub const FALLBACK_RESPONSE: &str =
    "I apologize, but I'm having trouble responding right now. Could you please try again?";

#[derive(Debug, Default)]
struct Session {
    history: VecDeque<TurnRecord>,
    last_interaction: Option<DateTime<Utc>>,
}

pub struct ConversationPipeline {
    memory: Arc<dyn MemoryPort>,
    emotion: Arc<dyn EmotionPort>,
    personality: Arc<dyn PersonalityPort>,
    generator: Arc<dyn Generator>,
    config: ConversationConfig,
    errors: Option<Arc<ErrorLog>>,
    session: RwLock<Session>,
    /// Serializes turns and end-of-session handling on this instance.
    turn_lock: Mutex<()>,
}

impl ConversationPipeline {
    pub fn new(
        memory: Arc<dyn MemoryPort>,
        emotion: Arc<dyn EmotionPort>,
        personality: Arc<dyn PersonalityPort>,
        generator: Arc<dyn Generator>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            memory,
            emotion,
            personality,
            generator,
            config,
            errors: None,
            session: RwLock::new(Session::default()),
            turn_lock: Mutex::new(()),
        }
    }

    /// Also record degraded and failed turns in `errors`.
    pub fn with_error_log(mut self, errors: Arc<ErrorLog>) -> Self {
        self.errors = Some(errors);
        self
    }

    fn record_error(&self, severity: Severity, message: String) {
        if let Some(errors) = &self.errors {
            errors.record(ERROR_SOURCE, severity, message);
        }
    }

    pub async fn history(&self) -> Vec<TurnRecord> {
        self.session.read().await.history.iter().cloned().collect()
    }

    pub async fn history_len(&self) -> usize {
        self.session.read().await.history.len()
    }

    pub async fn last_interaction(&self) -> Option<DateTime<Utc>> {
        self.session.read().await.last_interaction
    }

    async fn gather_context(&self, user_input: &str) -> ConversationContext {
        let (memories, analysis, personality) = tokio::join!(
            self.memory.get_relevant_memories(user_input),
            self.emotion.analyze_text(user_input),
            self.personality.get_personality_summary(),
        );

        let memories = memories.unwrap_or_else(|e| {
            tracing::warn!("Memory lookup failed, continuing without memories: {:#}", e);
            self.record_error(Severity::Warning, format!("Memory lookup failed: {:#}", e));
            Vec::new()
        });
        let analysis = analysis.unwrap_or_else(|e| {
            tracing::warn!("Emotional analysis failed, assuming neutral: {:#}", e);
            self.record_error(Severity::Warning, format!("Emotional analysis failed: {:#}", e));
            EmotionalSnapshot::neutral()
        });
        let personality = personality.unwrap_or_else(|e| {
            tracing::warn!("Personality summary unavailable: {:#}", e);
            PersonalitySummary::new()
        });

        let history = self.history().await;
        ConversationContext::new(user_input, analysis, personality, memories, history)
    }

    /// Run one turn and return the response text. Never fails.
    pub async fn process_message(&self, user_input: &str) -> String {
        let _turn = self.turn_lock.lock().await;

        let ctx = self.gather_context(user_input).await;
        let messages = prompts::build_messages(&ctx, self.config.prompt_history_turns);

        let response = match self.generator.generate_response(&messages).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Generation failed: {:#}", e);
                self.record_error(Severity::Error, format!("Generation failed: {:#}", e));
                return FALLBACK_RESPONSE.to_string();
            }
        };

        let turn = TurnRecord::new(user_input, &response);
        {
            let mut session = self.session.write().await;
            session.history.push_back(turn.clone());
            while session.history.len() > self.config.max_history_turns {
                session.history.pop_front();
            }
        }

        let exchange = Memory::new(
            MemoryKind::Conversation,
            format!("User: {}\nAva: {}", turn.user_input, turn.response),
        )
        .with_emotion(ctx.emotional_state.clone())
        .with_metadata("type", json!("exchange"))
        .with_metadata("timestamp", json!(turn.timestamp));

        let (stored, updated) = tokio::join!(
            self.memory.add_memory(exchange),
            self.emotion.update_emotional_state(ctx.emotional_state.clone()),
        );
        if let Err(e) = stored {
            tracing::warn!("Failed to store conversation memory: {:#}", e);
            self.record_error(
                Severity::Warning,
                format!("Failed to store conversation memory: {:#}", e),
            );
        }
        if let Err(e) = updated {
            tracing::warn!("Failed to update emotional state: {:#}", e);
        }

        self.session.write().await.last_interaction = Some(Utc::now());
        response
    }

    /// Summarize the current session. `None` when there is nothing to summarize.
    pub async fn generate_conversation_summary(&self) -> Result<Option<String>> {
        let history = self.history().await;
        if history.is_empty() {
            return Ok(None);
        }
        let summary = self
            .generator
            .generate_response(&prompts::summary_request(&history))
            .await?;
        Ok(Some(summary))
    }

    /// Store a summary of the session as one memory, then clear the session.
    ///
    /// Returns the stored summary. A second call with no turns in between
    /// does nothing.
    pub async fn end_conversation(&self) -> Option<String> {
        let _turn = self.turn_lock.lock().await;

        let turns = self.history_len().await;
        let stored = match self.generate_conversation_summary().await {
            Ok(Some(summary)) => {
                let memory = Memory::new(MemoryKind::Conversation, summary.clone())
                    .with_importance(0.7)
                    .with_metadata("type", json!("summary"))
                    .with_metadata("turns", json!(turns));
                match self.memory.add_memory(memory).await {
                    Ok(()) => Some(summary),
                    Err(e) => {
                        tracing::warn!("Failed to store conversation summary: {:#}", e);
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to summarize conversation: {:#}", e);
                None
            }
        };

        let mut session = self.session.write().await;
        session.history.clear();
        session.last_interaction = None;
        if turns > 0 {
            tracing::info!("Conversation ended after {} turns", turns);
        }
        stored
    }
}
