//! Recording in-memory test doubles for every port.
//!
//! Each double counts its calls, records the arguments it was given and can
//! be told to fail, so orchestration behavior can be asserted without any
//! real storage or network.

use crate::{
    BackupInfo, ChatMessage, EmotionPort, EmotionalSnapshot, Generator, Memory,
    MemoryAdminPort, MemoryConsolidationPort, MemoryEdit, MemoryFilter, MemoryPort,
    PersonalityPort, PersonalitySummary, SelfAwarenessPort,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

// ============================================================================
// Memory
// ============================================================================

#[derive(Default)]
pub struct MockMemory {
    stored: Mutex<Vec<Memory>>,
    relevant: Mutex<Vec<Memory>>,
    fail_initialize: AtomicBool,
    fail_lookup: AtomicBool,
    fail_add: AtomicBool,
    fail_admin: AtomicBool,
    backups: Mutex<Vec<(BackupInfo, Vec<Memory>)>>,
    initialize_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    add_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memories returned by every `get_relevant_memories` call.
    pub async fn set_relevant(&self, memories: Vec<Memory>) {
        *self.relevant.lock().await = memories;
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Fail both `get_relevant_memories` and `get_memories`.
    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    /// Fail every `MemoryAdminPort` call.
    pub fn fail_admin(&self, fail: bool) {
        self.fail_admin.store(fail, Ordering::SeqCst);
    }

    pub async fn backup_count(&self) -> usize {
        self.backups.lock().await.len()
    }

    /// Every memory passed to `add_memory`, in call order.
    pub async fn added(&self) -> Vec<Memory> {
        self.stored.lock().await.clone()
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemoryPort for MockMemory {
    async fn initialize(&self) -> Result<()> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize.load(Ordering::SeqCst) {
            bail!("Initialization failed");
        }
        Ok(())
    }

    async fn get_relevant_memories(&self, _text: &str) -> Result<Vec<Memory>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            bail!("memory storage unavailable");
        }
        Ok(self.relevant.lock().await.clone())
    }

    async fn add_memory(&self, memory: Memory) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_add.load(Ordering::SeqCst) {
            bail!("memory storage unavailable");
        }
        self.stored.lock().await.push(memory);
        Ok(())
    }

    async fn get_memories(&self, filter: Option<MemoryFilter>) -> Result<Vec<Memory>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            bail!("memory storage unavailable");
        }
        let stored = self.stored.lock().await;
        Ok(filter.unwrap_or_default().apply(stored.iter()))
    }
}

#[async_trait]
impl MemoryAdminPort for MockMemory {
    async fn create_backup(&self, description: Option<String>) -> Result<BackupInfo> {
        if self.fail_admin.load(Ordering::SeqCst) {
            bail!("backup storage unavailable");
        }
        let snapshot = self.stored.lock().await.clone();
        let mut backups = self.backups.lock().await;
        let info = BackupInfo {
            id: format!("backup-{}", backups.len() + 1),
            timestamp: chrono::Utc::now(),
            description,
            memory_count: snapshot.len(),
        };
        backups.push((info.clone(), snapshot));
        Ok(info)
    }

    async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        if self.fail_admin.load(Ordering::SeqCst) {
            bail!("backup storage unavailable");
        }
        let backups = self.backups.lock().await;
        Ok(backups.iter().rev().map(|(info, _)| info.clone()).collect())
    }

    async fn restore_backup(&self, backup_id: &str) -> Result<bool> {
        if self.fail_admin.load(Ordering::SeqCst) {
            bail!("backup storage unavailable");
        }
        let backups = self.backups.lock().await;
        match backups.iter().find(|(info, _)| info.id == backup_id) {
            Some((_, memories)) => {
                *self.stored.lock().await = memories.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn edit_memory(&self, edit: MemoryEdit) -> Result<Option<Memory>> {
        if self.fail_admin.load(Ordering::SeqCst) {
            bail!("memory storage unavailable");
        }
        let mut stored = self.stored.lock().await;
        Ok(stored.iter_mut().find(|m| m.id == edit.memory_id).map(|m| {
            edit.apply(m);
            m.clone()
        }))
    }
}

// ============================================================================
// Consolidation
// ============================================================================

#[derive(Default)]
pub struct MockConsolidation {
    calls: std::sync::Mutex<Vec<bool>>,
    fail: AtomicBool,
}

impl MockConsolidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// The `force` flag of every call, in call order.
    pub fn calls(&self) -> Vec<bool> {
        lock_calls(&self.calls).clone()
    }

    pub fn forced_calls(&self) -> usize {
        self.calls().into_iter().filter(|f| *f).count()
    }
}

#[async_trait]
impl MemoryConsolidationPort for MockConsolidation {
    async fn consolidate_memories(&self, force: bool) -> Result<bool> {
        lock_calls(&self.calls).push(force);
        if self.fail.load(Ordering::SeqCst) {
            bail!("Test error");
        }
        Ok(true)
    }
}

// ============================================================================
// Emotion
// ============================================================================

pub struct MockEmotion {
    analysis: Mutex<EmotionalSnapshot>,
    current: Mutex<EmotionalSnapshot>,
    updates: Mutex<Vec<EmotionalSnapshot>>,
    fail_initialize: AtomicBool,
    fail_analyze: AtomicBool,
    analyze_calls: AtomicUsize,
    current_calls: AtomicUsize,
}

impl Default for MockEmotion {
    fn default() -> Self {
        Self {
            analysis: Mutex::new(EmotionalSnapshot::neutral()),
            current: Mutex::new(EmotionalSnapshot::neutral()),
            updates: Mutex::new(Vec::new()),
            fail_initialize: AtomicBool::new(false),
            fail_analyze: AtomicBool::new(false),
            analyze_calls: AtomicUsize::new(0),
            current_calls: AtomicUsize::new(0),
        }
    }
}

impl MockEmotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot returned by every `analyze_text` call.
    pub async fn set_analysis(&self, snapshot: EmotionalSnapshot) {
        *self.analysis.lock().await = snapshot;
    }

    /// Snapshot returned by `get_current_state`.
    pub async fn set_current(&self, snapshot: EmotionalSnapshot) {
        *self.current.lock().await = snapshot;
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn fail_analyze(&self, fail: bool) {
        self.fail_analyze.store(fail, Ordering::SeqCst);
    }

    /// Every snapshot pushed through `update_emotional_state`.
    pub async fn updates(&self) -> Vec<EmotionalSnapshot> {
        self.updates.lock().await.clone()
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmotionPort for MockEmotion {
    async fn initialize(&self) -> Result<()> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            bail!("Initialization failed");
        }
        Ok(())
    }

    async fn analyze_text(&self, _text: &str) -> Result<EmotionalSnapshot> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_analyze.load(Ordering::SeqCst) {
            bail!("emotion model unavailable");
        }
        Ok(self.analysis.lock().await.clone())
    }

    async fn update_emotional_state(&self, snapshot: EmotionalSnapshot) -> Result<()> {
        self.updates.lock().await.push(snapshot);
        Ok(())
    }

    async fn get_current_state(&self) -> Result<EmotionalSnapshot> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().await.clone())
    }
}

// ============================================================================
// Personality
// ============================================================================

pub struct MockPersonality {
    summary: Mutex<PersonalitySummary>,
    update_calls: std::sync::Mutex<Vec<bool>>,
    summary_calls: AtomicUsize,
    fail_initialize: AtomicBool,
    fail_update: AtomicBool,
    fail_summary: AtomicBool,
}

impl Default for MockPersonality {
    fn default() -> Self {
        let mut summary = PersonalitySummary::new();
        summary.insert(
            "traits".to_string(),
            json!({"openness": 0.7, "conscientiousness": 0.8}),
        );
        summary.insert("development_stage".to_string(), json!("developing"));
        Self {
            summary: Mutex::new(summary),
            update_calls: std::sync::Mutex::new(Vec::new()),
            summary_calls: AtomicUsize::new(0),
            fail_initialize: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_summary: AtomicBool::new(false),
        }
    }
}

impl MockPersonality {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_summary(&self, summary: PersonalitySummary) {
        *self.summary.lock().await = summary;
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn fail_summary(&self, fail: bool) {
        self.fail_summary.store(fail, Ordering::SeqCst);
    }

    /// The `force` flag of every `update_personality` call.
    pub fn update_calls(&self) -> Vec<bool> {
        lock_calls(&self.update_calls).clone()
    }

    pub fn forced_updates(&self) -> usize {
        self.update_calls().into_iter().filter(|f| *f).count()
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersonalityPort for MockPersonality {
    async fn initialize(&self) -> Result<()> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            bail!("Initialization failed");
        }
        Ok(())
    }

    async fn get_personality_summary(&self) -> Result<PersonalitySummary> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_summary.load(Ordering::SeqCst) {
            bail!("personality model unavailable");
        }
        Ok(self.summary.lock().await.clone())
    }

    async fn update_personality(&self, force: bool) -> Result<bool> {
        lock_calls(&self.update_calls).push(force);
        if self.fail_update.load(Ordering::SeqCst) {
            bail!("Test error");
        }
        Ok(true)
    }
}

// ============================================================================
// Self-awareness
// ============================================================================

#[derive(Default)]
pub struct MockSelfAwareness {
    reflect_calls: std::sync::Mutex<Vec<bool>>,
    status_calls: AtomicUsize,
    fail_initialize: AtomicBool,
    fail_reflect: AtomicBool,
}

impl MockSelfAwareness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reflect(&self, fail: bool) {
        self.fail_reflect.store(fail, Ordering::SeqCst);
    }

    /// The `force` flag of every `reflect` call.
    pub fn reflect_calls(&self) -> Vec<bool> {
        lock_calls(&self.reflect_calls).clone()
    }

    pub fn forced_reflections(&self) -> usize {
        self.reflect_calls().into_iter().filter(|f| *f).count()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelfAwarenessPort for MockSelfAwareness {
    async fn initialize(&self) -> Result<()> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            bail!("Initialization failed");
        }
        Ok(())
    }

    async fn reflect(&self, force: bool) -> Result<bool> {
        lock_calls(&self.reflect_calls).push(force);
        if self.fail_reflect.load(Ordering::SeqCst) {
            bail!("Test error");
        }
        Ok(true)
    }

    async fn get_status(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut status = serde_json::Map::new();
        status.insert(
            "reflections".to_string(),
            json!(lock_calls(&self.reflect_calls).len()),
        );
        Ok(status)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Scripted generator. Queued responses are returned first, then the default.
pub struct MockGenerator {
    default_response: Mutex<String>,
    queued: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn with_response(text: &str) -> Self {
        Self {
            default_response: Mutex::new(text.to_string()),
            queued: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_response(&self, text: &str) {
        *self.default_response.lock().await = text.to_string();
    }

    pub async fn queue_response(&self, text: &str) {
        self.queued.lock().await.push(text.to_string());
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in call order.
    pub async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(messages.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            bail!("Test error");
        }
        let mut queued = self.queued.lock().await;
        if !queued.is_empty() {
            return Ok(queued.remove(0));
        }
        Ok(self.default_response.lock().await.clone())
    }
}

/// Call logs are only pushed to and cloned, so a poisoned lock still holds
/// consistent data.
fn lock_calls(calls: &std::sync::Mutex<Vec<bool>>) -> std::sync::MutexGuard<'_, Vec<bool>> {
    calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKind;

    #[tokio::test]
    async fn test_mock_generator_queue_then_default() {
        let g = MockGenerator::with_response("default");
        g.queue_response("first").await;
        let msgs = vec![ChatMessage::user("hi")];
        assert_eq!(g.generate_response(&msgs).await.unwrap(), "first");
        assert_eq!(g.generate_response(&msgs).await.unwrap(), "default");
        assert_eq!(g.calls(), 2);
        assert_eq!(g.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_generator_failure() {
        let g = MockGenerator::with_response("x");
        g.set_failing(true);
        assert!(g.generate_response(&[]).await.is_err());
        assert_eq!(g.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_memory_records() {
        let m = MockMemory::new();
        m.add_memory(Memory::new(MemoryKind::Personal, "a")).await.unwrap();
        assert_eq!(m.add_calls(), 1);
        assert_eq!(m.get_memories(None).await.unwrap().len(), 1);
        m.fail_lookup(true);
        assert!(m.get_relevant_memories("a").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_personality_records_force_flags() {
        let p = MockPersonality::new();
        p.update_personality(false).await.unwrap();
        p.update_personality(true).await.unwrap();
        assert_eq!(p.update_calls(), vec![false, true]);
        assert_eq!(p.forced_updates(), 1);
    }
}
