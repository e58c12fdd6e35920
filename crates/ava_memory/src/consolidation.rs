//! Periodic memory compaction.
//!
//! A pass does two things:
//! 1. merges memories whose normalized content is identical, keeping the
//!    oldest entry and folding importance, access counts and themes into it
//! 2. forgets stale memories: older than `max_memory_age_days`, less
//!    important than `forget_threshold` and never retrieved
//!
//! Core memories are never forgotten. The whole pass runs inside
//! [`MemoryStore::compact`], so memories added while it runs are kept.

use crate::store::MemoryStore;
use anyhow::Result;
use async_trait::async_trait;
use ava_core::{Memory, MemoryConsolidationPort, MemoryKind};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outcome of a single consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub merged: usize,
    pub forgotten: usize,
    pub remaining: usize,
}

pub struct MemoryConsolidator {
    store: Arc<MemoryStore>,
    interval: Duration,
    last_consolidation: RwLock<Option<DateTime<Utc>>>,
    last_report: RwLock<Option<ConsolidationReport>>,
    running: Mutex<()>,
}

impl MemoryConsolidator {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let secs = store.config().consolidation_interval_secs;
        Self {
            store,
            interval: Duration::seconds(secs.min(u32::MAX as u64) as i64),
            last_consolidation: RwLock::new(None),
            last_report: RwLock::new(None),
            running: Mutex::new(()),
        }
    }

    pub async fn is_consolidation_due(&self) -> bool {
        match *self.last_consolidation.read().await {
            Some(last) => Utc::now() - last >= self.interval,
            None => true,
        }
    }

    pub async fn last_consolidation(&self) -> Option<DateTime<Utc>> {
        *self.last_consolidation.read().await
    }

    pub async fn last_report(&self) -> Option<ConsolidationReport> {
        self.last_report.read().await.clone()
    }

    /// Run a pass immediately.
    pub async fn consolidate(&self) -> Result<ConsolidationReport> {
        let _running = self.running.lock().await;
        tracing::info!("Starting memory consolidation...");

        let now = Utc::now();
        let report = self
            .store
            .compact(|memories| {
                let (merged, merged_count) = merge_duplicates(std::mem::take(memories));
                let (kept, forgotten) = self.forget_stale(merged, now);
                *memories = kept;
                ConsolidationReport {
                    merged: merged_count,
                    forgotten,
                    remaining: memories.len(),
                }
            })
            .await?;

        *self.last_consolidation.write().await = Some(Utc::now());
        *self.last_report.write().await = Some(report.clone());
        tracing::info!(
            "Memory consolidation complete: merged={}, forgotten={}, remaining={}",
            report.merged,
            report.forgotten,
            report.remaining
        );
        Ok(report)
    }

    fn forget_stale(&self, memories: Vec<Memory>, now: DateTime<Utc>) -> (Vec<Memory>, usize) {
        let config = self.store.config();
        let max_age = Duration::days(config.max_memory_age_days as i64);
        let before = memories.len();
        let kept: Vec<Memory> = memories
            .into_iter()
            .filter(|m| {
                m.kind == MemoryKind::Core
                    || now - m.created_at < max_age
                    || m.importance >= config.forget_threshold
                    || m.access_count > 0
            })
            .collect();
        let forgotten = before - kept.len();
        (kept, forgotten)
    }
}

fn normalize(content: &str) -> String {
    content
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse memories with the same kind and normalized content.
fn merge_duplicates(mut memories: Vec<Memory>) -> (Vec<Memory>, usize) {
    memories.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut index: HashMap<(MemoryKind, String), usize> = HashMap::new();
    let mut out: Vec<Memory> = Vec::with_capacity(memories.len());
    let mut merged = 0;

    for memory in memories {
        let key = (memory.kind, normalize(&memory.content));
        match index.get(&key) {
            Some(&i) => {
                let target = &mut out[i];
                target.importance = target.importance.max(memory.importance);
                target.access_count = target.access_count.saturating_add(memory.access_count);
                target.last_accessed = target.last_accessed.max(memory.last_accessed);
                for theme in memory.themes {
                    if !target.themes.contains(&theme) {
                        target.themes.push(theme);
                    }
                }
                merged += 1;
            }
            None => {
                index.insert(key, out.len());
                out.push(memory);
            }
        }
    }
    (out, merged)
}

#[async_trait]
impl MemoryConsolidationPort for MemoryConsolidator {
    async fn consolidate_memories(&self, force: bool) -> Result<bool> {
        if !force && !self.is_consolidation_due().await {
            tracing::debug!("Consolidation not due yet, skipping");
            return Ok(false);
        }
        self.consolidate().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ava_core::config::MemoryConfig;
    use ava_core::{MemoryFilter, MemoryPort};
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (Arc<MemoryStore>, MemoryConsolidator) {
        let store = Arc::new(MemoryStore::new(dir.path(), MemoryConfig::default()));
        store.initialize().await.unwrap();
        let consolidator = MemoryConsolidator::new(store.clone());
        (store, consolidator)
    }

    fn aged(kind: MemoryKind, content: &str, days: i64, importance: f32) -> Memory {
        let mut m = Memory::new(kind, content).with_importance(importance);
        m.created_at = Utc::now() - Duration::days(days);
        m
    }

    #[tokio::test]
    async fn test_merges_duplicates() {
        let dir = TempDir::new().unwrap();
        let (store, consolidator) = setup(&dir).await;
        store
            .add_memory(Memory::new(MemoryKind::Personal, "User likes tea").with_importance(0.4))
            .await
            .unwrap();
        store
            .add_memory(
                Memory::new(MemoryKind::Personal, "  user LIKES tea ")
                    .with_importance(0.8)
                    .with_themes(["tea"]),
            )
            .await
            .unwrap();

        let report = consolidator.consolidate().await.unwrap();
        assert_eq!(report.merged, 1);

        let personal = store
            .get_memories(Some(MemoryFilter::kind(MemoryKind::Personal)))
            .await
            .unwrap();
        assert_eq!(personal.len(), 1);
        assert_eq!(personal[0].content, "User likes tea");
        assert!((personal[0].importance - 0.8).abs() < f32::EPSILON);
        assert_eq!(personal[0].themes, vec!["tea".to_string()]);
    }

    #[tokio::test]
    async fn test_forgets_only_stale_unimportant_memories() {
        let dir = TempDir::new().unwrap();
        let (store, consolidator) = setup(&dir).await;
        store.add_memory(aged(MemoryKind::Conversation, "stale chat", 200, 0.1)).await.unwrap();
        store.add_memory(aged(MemoryKind::Conversation, "vital chat", 200, 0.9)).await.unwrap();
        store.add_memory(aged(MemoryKind::Conversation, "fresh chat", 1, 0.1)).await.unwrap();
        store.add_memory(aged(MemoryKind::Core, "old core", 400, 0.0)).await.unwrap();
        let mut recalled = aged(MemoryKind::Personal, "recalled fact", 200, 0.1);
        recalled.touch();
        store.add_memory(recalled).await.unwrap();

        let report = consolidator.consolidate().await.unwrap();
        assert_eq!(report.forgotten, 1);

        let contents: Vec<String> = store.all().await.into_iter().map(|m| m.content).collect();
        assert!(!contents.contains(&"stale chat".to_string()));
        assert!(contents.contains(&"vital chat".to_string()));
        assert!(contents.contains(&"fresh chat".to_string()));
        assert!(contents.contains(&"old core".to_string()));
        assert!(contents.contains(&"recalled fact".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_survives_consolidation() {
        let dir = TempDir::new().unwrap();
        let (store, consolidator) = setup(&dir).await;
        let consolidator = Arc::new(consolidator);

        let mut seeded = store.all().await;
        seeded.extend(
            (0..3000).map(|i| Memory::new(MemoryKind::Conversation, format!("exchange {}", i))),
        );
        seeded.push(Memory::new(MemoryKind::Personal, "User likes tea"));
        seeded.push(Memory::new(MemoryKind::Personal, "user likes TEA"));
        store.replace_all(seeded).await.unwrap();

        for round in 0..20 {
            let pass = tokio::spawn({
                let consolidator = consolidator.clone();
                async move { consolidator.consolidate().await }
            });
            let add = tokio::spawn({
                let store = store.clone();
                async move {
                    store
                        .add_memory(Memory::new(MemoryKind::Personal, format!("marker {}", round)))
                        .await
                }
            });
            pass.await.unwrap().unwrap();
            add.await.unwrap().unwrap();
        }

        let contents: Vec<String> = store.all().await.into_iter().map(|m| m.content).collect();
        for round in 0..20 {
            assert!(
                contents.contains(&format!("marker {}", round)),
                "marker {} lost",
                round
            );
        }
        let tea = contents.iter().filter(|c| c.eq_ignore_ascii_case("user likes tea")).count();
        assert_eq!(tea, 1);

        let reopened = MemoryStore::new(dir.path(), MemoryConfig::default());
        reopened.initialize().await.unwrap();
        assert_eq!(reopened.len().await, store.len().await);
    }

    #[tokio::test]
    async fn test_consolidation_flushes_access_stats() {
        let dir = TempDir::new().unwrap();
        let (store, consolidator) = setup(&dir).await;
        store
            .add_memory(Memory::new(MemoryKind::Personal, "User collects stamps"))
            .await
            .unwrap();
        store.get_relevant_memories("stamps").await.unwrap();

        consolidator.consolidate().await.unwrap();

        let reopened = MemoryStore::new(dir.path(), MemoryConfig::default());
        reopened.initialize().await.unwrap();
        let personal = reopened
            .get_memories(Some(MemoryFilter::kind(MemoryKind::Personal)))
            .await
            .unwrap();
        assert_eq!(personal[0].access_count, 1);
    }

    #[tokio::test]
    async fn test_interval_gating() {
        let dir = TempDir::new().unwrap();
        let (_store, consolidator) = setup(&dir).await;

        assert!(consolidator.consolidate_memories(false).await.unwrap());
        assert!(!consolidator.consolidate_memories(false).await.unwrap());
        assert!(consolidator.consolidate_memories(true).await.unwrap());
        assert!(consolidator.last_consolidation().await.is_some());
        assert!(consolidator.last_report().await.is_some());
    }
}
