use anyhow::Result;
use async_trait::async_trait;
use ava_core::config::SelfAwarenessConfig;
use ava_core::{EmotionPort, Memory, MemoryFilter, MemoryKind, MemoryPort, SelfAwarenessPort};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const MAX_TOPICS: usize = 3;
const COMMON_WORDS: &[&str] = &[
    "about", "after", "again", "before", "could", "every", "really", "should", "there", "their",
    "these", "thing", "things", "those", "which", "would",
];

#[derive(Debug, Default)]
struct ReflectionState {
    last_reflection: Option<DateTime<Utc>>,
    reflection_count: u64,
    last_insight: Option<String>,
}

/// Periodic self-assessment.
///
/// A reflection looks at the most recent conversation memories and the
/// current emotional state, and writes a `Reflection` memory summarizing
/// both.
pub struct SelfAwareness {
    config: SelfAwarenessConfig,
    memory: Arc<dyn MemoryPort>,
    emotion: Arc<dyn EmotionPort>,
    state: RwLock<ReflectionState>,
    reflecting: Mutex<()>,
}

impl SelfAwareness {
    pub fn new(
        config: SelfAwarenessConfig,
        memory: Arc<dyn MemoryPort>,
        emotion: Arc<dyn EmotionPort>,
    ) -> Self {
        Self {
            config,
            memory,
            emotion,
            state: RwLock::new(ReflectionState::default()),
            reflecting: Mutex::new(()),
        }
    }

    async fn is_reflection_due(&self) -> bool {
        let secs = self.config.reflection_interval_secs.min(u32::MAX as u64) as i64;
        match self.state.read().await.last_reflection {
            Some(last) => Utc::now() - last >= Duration::seconds(secs),
            None => true,
        }
    }

    pub async fn last_insight(&self) -> Option<String> {
        self.state.read().await.last_insight.clone()
    }
}

/// Most frequent content words across `memories`, most frequent first.
fn recurring_topics(memories: &[Memory]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for m in memories {
        for word in m
            .content
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 5 && !COMMON_WORDS.contains(w))
        {
            *counts.entry(word.to_string()).or_default() += 1;
        }
        for theme in &m.themes {
            *counts.entry(theme.to_lowercase()).or_default() += 2;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(MAX_TOPICS).map(|(w, _)| w).collect()
}

fn compose_insight(conversations: usize, feeling: &str, topics: &[String]) -> String {
    let mut insight = if conversations == 0 {
        format!("I haven't talked with anyone recently. Right now I feel {}.", feeling)
    } else {
        format!(
            "Looking back on {} recent conversation{}, I feel {}.",
            conversations,
            if conversations == 1 { "" } else { "s" },
            feeling
        )
    };
    if !topics.is_empty() {
        insight.push_str(&format!(" Recurring topics: {}.", topics.join(", ")));
    }
    insight
}

#[async_trait]
impl SelfAwarenessPort for SelfAwareness {
    async fn initialize(&self) -> Result<()> {
        tracing::info!(
            "Self-awareness ready (window={}, interval={}s)",
            self.config.reflection_window,
            self.config.reflection_interval_secs
        );
        Ok(())
    }

    async fn reflect(&self, force: bool) -> Result<bool> {
        let _reflecting = self.reflecting.lock().await;
        if !force && !self.is_reflection_due().await {
            return Ok(false);
        }

        let conversations = self
            .memory
            .get_memories(Some(
                MemoryFilter::kind(MemoryKind::Conversation).with_limit(self.config.reflection_window),
            ))
            .await?;

        if conversations.is_empty() && !force {
            self.state.write().await.last_reflection = Some(Utc::now());
            tracing::debug!("Nothing new to reflect on");
            return Ok(false);
        }

        let feeling = self.emotion.get_current_state().await?;
        let topics = recurring_topics(&conversations);
        let insight = compose_insight(conversations.len(), &feeling.describe(), &topics);

        let memory = Memory::new(MemoryKind::Reflection, insight.clone())
            .with_importance(0.6)
            .with_emotion(feeling)
            .with_themes(topics)
            .with_metadata("conversations", json!(conversations.len()));
        self.memory.add_memory(memory).await?;

        let mut state = self.state.write().await;
        state.last_reflection = Some(Utc::now());
        state.reflection_count += 1;
        state.last_insight = Some(insight);
        tracing::info!("Reflection #{} recorded", state.reflection_count);
        Ok(true)
    }

    async fn get_status(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let state = self.state.read().await;
        let mut status = serde_json::Map::new();
        status.insert("reflection_count".into(), json!(state.reflection_count));
        status.insert("last_reflection".into(), json!(state.last_reflection));
        status.insert("last_insight".into(), json!(state.last_insight));
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ava_core::mock::{MockEmotion, MockMemory};
    use ava_core::EmotionalSnapshot;

    fn setup() -> (Arc<MockMemory>, Arc<MockEmotion>, SelfAwareness) {
        let memory = Arc::new(MockMemory::new());
        let emotion = Arc::new(MockEmotion::new());
        let awareness = SelfAwareness::new(
            SelfAwarenessConfig::default(),
            memory.clone(),
            emotion.clone(),
        );
        (memory, emotion, awareness)
    }

    #[test]
    fn test_recurring_topics() {
        let memories = vec![
            Memory::new(MemoryKind::Conversation, "We talked about gardening tomatoes"),
            Memory::new(MemoryKind::Conversation, "More gardening, this time herbs"),
            Memory::new(MemoryKind::Conversation, "A chat about music").with_themes(["music"]),
        ];
        let topics = recurring_topics(&memories);
        assert_eq!(topics, vec!["music".to_string(), "gardening".to_string()]);
    }

    #[tokio::test]
    async fn test_reflect_writes_reflection_memory() {
        let (memory, emotion, awareness) = setup();
        memory
            .add_memory(Memory::new(MemoryKind::Conversation, "User: hi\nAva: hello"))
            .await
            .unwrap();
        emotion
            .set_current(EmotionalSnapshot::new("joy", 0.8, 0.6, 0.5))
            .await;

        assert!(awareness.reflect(false).await.unwrap());

        let reflections: Vec<_> = memory
            .added()
            .await
            .into_iter()
            .filter(|m| m.kind == MemoryKind::Reflection)
            .collect();
        assert_eq!(reflections.len(), 1);
        assert!(reflections[0].content.contains("1 recent conversation,"));
        assert!(reflections[0].content.contains("joy"));

        let status = awareness.get_status().await.unwrap();
        assert_eq!(status["reflection_count"], 1);
    }

    #[tokio::test]
    async fn test_unforced_reflection_is_gated() {
        let (memory, _emotion, awareness) = setup();
        memory
            .add_memory(Memory::new(MemoryKind::Conversation, "something"))
            .await
            .unwrap();
        assert!(awareness.reflect(false).await.unwrap());
        assert!(!awareness.reflect(false).await.unwrap());
        assert!(awareness.reflect(true).await.unwrap());
    }

    #[tokio::test]
    async fn test_forced_reflection_without_conversations() {
        let (_memory, _emotion, awareness) = setup();
        assert!(!awareness.reflect(false).await.unwrap());
        assert!(awareness.reflect(true).await.unwrap());
        let insight = awareness.last_insight().await.unwrap();
        assert!(insight.starts_with("I haven't talked"));
    }
}
