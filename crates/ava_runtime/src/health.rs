//! Subsystem health polling.

use crate::wiring::Subsystems;
use anyhow::Result;
use ava_core::{Memory, MemoryKind};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

pub const MEMORY_SYSTEM: &str = "memory_system";
pub const EMOTIONAL_SYSTEM: &str = "emotional_system";
pub const PERSONALITY_SYSTEM: &str = "personality_system";
pub const SELF_AWARENESS: &str = "self_awareness";

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthRecord {
    pub last_health_check: Option<DateTime<Utc>>,
    pub subsystem_summaries: Map<String, Value>,
}

impl HealthRecord {
    /// Subsystems whose last summary was an error.
    pub fn degraded(&self) -> Vec<&str> {
        self.subsystem_summaries
            .iter()
            .filter(|(_, v)| v.get("error").is_some())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

pub struct HealthMonitor {
    subsystems: Subsystems,
    record: RwLock<HealthRecord>,
}

fn or_error(result: Result<Value>) -> Value {
    result.unwrap_or_else(|e| json!({ "error": format!("{:#}", e) }))
}

/// Counts per kind plus the newest entry, for memories ordered newest first.
pub fn memory_summary(memories: &[Memory]) -> Value {
    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for kind in [
        MemoryKind::Personal,
        MemoryKind::Conversation,
        MemoryKind::Emotional,
        MemoryKind::Reflection,
        MemoryKind::Core,
    ] {
        by_kind.insert(kind.as_str(), 0);
    }
    for m in memories {
        *by_kind.entry(m.kind.as_str()).or_default() += 1;
    }
    json!({
        "total_memories": memories.len(),
        "by_kind": by_kind,
        "newest": memories.first().map(|m| m.created_at),
    })
}

impl HealthMonitor {
    pub fn new(subsystems: Subsystems) -> Self {
        Self {
            subsystems,
            record: RwLock::new(HealthRecord::default()),
        }
    }

    /// Poll every subsystem without touching the health record.
    /// A failing subsystem is reported as `{"error": ...}`.
    pub async fn summaries(&self) -> Map<String, Value> {
        let s = &self.subsystems;
        let (memory, emotion, personality, awareness) = tokio::join!(
            async { anyhow::Ok(memory_summary(&s.memory.get_memories(None).await?)) },
            async { anyhow::Ok(serde_json::to_value(s.emotion.get_current_state().await?)?) },
            async { anyhow::Ok(Value::Object(s.personality.get_personality_summary().await?)) },
            async { anyhow::Ok(Value::Object(s.self_awareness.get_status().await?)) },
        );

        let mut out = Map::new();
        out.insert(MEMORY_SYSTEM.into(), or_error(memory));
        out.insert(EMOTIONAL_SYSTEM.into(), or_error(emotion));
        out.insert(PERSONALITY_SYSTEM.into(), or_error(personality));
        out.insert(SELF_AWARENESS.into(), or_error(awareness));
        out
    }

    /// Poll every subsystem and stamp the record.
    ///
    /// The stamp strictly increases across calls even if the wall clock
    /// does not.
    pub async fn check(&self) -> HealthRecord {
        let summaries = self.summaries().await;

        let mut record = self.record.write().await;
        let now = Utc::now();
        let stamp = match record.last_health_check {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        record.last_health_check = Some(stamp);
        record.subsystem_summaries = summaries;

        let degraded = record.degraded();
        if degraded.is_empty() {
            tracing::debug!("Health check passed");
        } else {
            tracing::warn!("Health check found degraded subsystems: {:?}", degraded);
        }
        record.clone()
    }

    pub async fn record(&self) -> HealthRecord {
        self.record.read().await.clone()
    }

    pub async fn last_health_check(&self) -> Option<DateTime<Utc>> {
        self.record.read().await.last_health_check
    }
}
