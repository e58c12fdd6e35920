use crate::emotion::EmotionalSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Category of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Facts about the user or the relationship
    Personal,
    /// A captured exchange or an end-of-session summary
    Conversation,
    /// A recorded emotional state
    Emotional,
    /// Output of self-reflection
    Reflection,
    /// Identity-defining memories; never forgotten
    Core,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Personal => "personal",
            MemoryKind::Conversation => "conversation",
            MemoryKind::Emotional => "emotional",
            MemoryKind::Reflection => "reflection",
            MemoryKind::Core => "core",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single long-term memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub kind: MemoryKind,
    /// 0.0 (trivial) to 1.0 (vital)
    pub importance: f32,
    #[serde(default)]
    pub emotional_context: Option<EmotionalSnapshot>,
    #[serde(default)]
    pub themes: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: u32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Memory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            kind,
            importance: 0.5,
            emotional_context: None,
            themes: Vec::new(),
            created_at: Utc::now(),
            last_accessed: None,
            access_count: 0,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_emotion(mut self, emotion: EmotionalSnapshot) -> Self {
        self.emotional_context = Some(emotion);
        self
    }

    pub fn with_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.themes = themes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Record a retrieval.
    pub fn touch(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = Some(Utc::now());
    }
}

/// Partial update of one memory. Fields left as `None` are unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEdit {
    pub memory_id: Uuid,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub themes: Option<Vec<String>>,
}

impl MemoryEdit {
    pub fn new(memory_id: Uuid) -> Self {
        Self {
            memory_id,
            content: None,
            importance: None,
            themes: None,
        }
    }

    pub fn apply(&self, memory: &mut Memory) {
        if let Some(content) = &self.content {
            memory.content = content.clone();
        }
        if let Some(importance) = self.importance {
            if importance.is_finite() {
                memory.importance = importance.clamp(0.0, 1.0);
            }
        }
        if let Some(themes) = &self.themes {
            memory.themes = themes.clone();
        }
    }
}

/// A saved copy of the whole memory set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    pub memory_count: usize,
}

/// Selection criteria for `MemoryPort::get_memories`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFilter {
    #[serde(default)]
    pub kind: Option<MemoryKind>,
    #[serde(default)]
    pub min_importance: Option<f32>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl MemoryFilter {
    pub fn kind(kind: MemoryKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_min_importance(mut self, min: f32) -> Self {
        self.min_importance = Some(min);
        self
    }

    /// Whether `memory` passes the kind and importance criteria.
    /// `limit` is applied by the caller after sorting.
    pub fn matches(&self, memory: &Memory) -> bool {
        if let Some(kind) = self.kind {
            if memory.kind != kind {
                return false;
            }
        }
        if let Some(min) = self.min_importance {
            if memory.importance < min {
                return false;
            }
        }
        true
    }

    /// Filter, sort newest first and truncate to `limit`.
    pub fn apply<'a, I>(&self, memories: I) -> Vec<Memory>
    where
        I: IntoIterator<Item = &'a Memory>,
    {
        let mut selected: Vec<Memory> = memories
            .into_iter()
            .filter(|m| self.matches(m))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}
