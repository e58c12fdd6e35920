use crate::retrieval;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ava_core::config::MemoryConfig;
use ava_core::{
    BackupInfo, Memory, MemoryAdminPort, MemoryEdit, MemoryFilter, MemoryKind, MemoryPort,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

const STORE_FILE: &str = "memories.json";
const BACKUP_DIR: &str = "backups";
const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    memories: Vec<Memory>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupFile {
    #[serde(flatten)]
    info: BackupInfo,
    version: u32,
    memories: Vec<Memory>,
}

/// Descriptor part of a backup file; the memories are skipped.
#[derive(Debug, Deserialize)]
struct BackupHeader {
    #[serde(flatten)]
    info: BackupInfo,
}

/// JSON-file backed memory store.
///
/// All memories are held in memory and rewritten to `memories.json` on
/// every mutation. Writes go to a temp file first and are renamed into
/// place so a crash never leaves a half-written store.
///
/// Retrieval only marks access statistics dirty; they reach disk with the
/// next mutation, the next compaction or an explicit [`MemoryStore::flush`].
pub struct MemoryStore {
    dir: PathBuf,
    config: MemoryConfig,
    memories: RwLock<Vec<Memory>>,
    persist_lock: Mutex<()>,
    dirty: AtomicBool,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>, config: MemoryConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            memories: RwLock::new(Vec::new()),
            persist_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.join(BACKUP_DIR)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub async fn len(&self) -> usize {
        self.memories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memories.read().await.is_empty()
    }

    /// Snapshot of every stored memory, in insertion order.
    pub async fn all(&self) -> Vec<Memory> {
        self.memories.read().await.clone()
    }

    /// Replace the full memory set and persist it.
    pub async fn replace_all(&self, memories: Vec<Memory>) -> Result<()> {
        *self.memories.write().await = memories;
        self.persist().await
    }

    /// Rewrite the memory set in place under the write lock, so no add or
    /// retrieval can interleave with `f`. Persists when `f` changed the
    /// number of memories or access statistics are pending.
    pub async fn compact<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<Memory>) -> R,
    {
        let (result, changed) = {
            let mut guard = self.memories.write().await;
            let before = guard.len();
            let result = f(&mut *guard);
            (result, guard.len() != before)
        };
        if changed || self.dirty.load(Ordering::SeqCst) {
            self.persist().await?;
        }
        Ok(result)
    }

    /// Write pending access statistics, if any.
    pub async fn flush(&self) -> Result<()> {
        if self.dirty.load(Ordering::SeqCst) {
            self.persist().await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Memory>> {
        let path = self.path();
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let file: StoreFile = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt memory store at {}", path.display()))?;
                if file.version > STORE_VERSION {
                    tracing::warn!(
                        "Memory store version {} is newer than supported {}",
                        file.version,
                        STORE_VERSION
                    );
                }
                Ok(file.memories)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        self.dirty.store(false, Ordering::SeqCst);
        let snapshot = StoreFile {
            version: STORE_VERSION,
            memories: self.memories.read().await.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Err(e) = write_atomic(&self.path(), json.as_bytes()).await {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    fn backup_path(&self, id: &str) -> PathBuf {
        self.backup_dir().join(format!("memories-{}.json", id))
    }
}

/// Backup ids are generated as `<timestamp>-<hex>`; anything else cannot
/// name a backup file.
fn is_valid_backup_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn new_backup_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%dT%H%M%S"), &suffix[..8])
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl MemoryPort for MemoryStore {
    async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let loaded = self.load().await?;
        let count = loaded.len();
        *self.memories.write().await = loaded;

        if count == 0 {
            let identity = Memory::new(
                MemoryKind::Core,
                "I am Ava, a companion who remembers our conversations and grows with them.",
            )
            .with_importance(1.0)
            .with_themes(["identity"]);
            self.memories.write().await.push(identity);
            self.persist().await?;
        }

        tracing::info!(
            "Memory store ready at {} ({} memories)",
            self.dir.display(),
            self.len().await
        );
        Ok(())
    }

    async fn get_relevant_memories(&self, text: &str) -> Result<Vec<Memory>> {
        let selected = {
            let mut guard = self.memories.write().await;
            let ranked = retrieval::rank(text, &guard, self.config.retrieval_limit);
            ranked
                .into_iter()
                .map(|i| {
                    guard[i].touch();
                    guard[i].clone()
                })
                .collect::<Vec<_>>()
        };

        if !selected.is_empty() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        tracing::debug!("Retrieved {} relevant memories", selected.len());
        Ok(selected)
    }

    async fn add_memory(&self, memory: Memory) -> Result<()> {
        tracing::debug!("Storing {} memory {}", memory.kind, memory.id);
        self.memories.write().await.push(memory);
        self.persist().await
    }

    async fn get_memories(&self, filter: Option<MemoryFilter>) -> Result<Vec<Memory>> {
        let guard = self.memories.read().await;
        Ok(filter.unwrap_or_default().apply(guard.iter()))
    }
}

#[async_trait]
impl MemoryAdminPort for MemoryStore {
    async fn create_backup(&self, description: Option<String>) -> Result<BackupInfo> {
        let dir = self.backup_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let memories = self.all().await;
        let now = Utc::now();
        let info = BackupInfo {
            id: new_backup_id(now),
            timestamp: now,
            description,
            memory_count: memories.len(),
        };
        let file = BackupFile {
            info: info.clone(),
            version: STORE_VERSION,
            memories,
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.backup_path(&info.id), json.as_bytes()).await?;

        tracing::info!("Created memory backup {} ({} memories)", info.id, info.memory_count);
        Ok(info)
    }

    async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let dir = self.backup_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("failed to list {}", dir.display())),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<BackupHeader>(&raw) {
                Ok(header) => backups.push(header.info),
                Err(e) => tracing::warn!("Skipping unreadable backup {}: {}", path.display(), e),
            }
        }
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    async fn restore_backup(&self, backup_id: &str) -> Result<bool> {
        if !is_valid_backup_id(backup_id) {
            return Ok(false);
        }
        let path = self.backup_path(backup_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        let file: BackupFile = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt backup at {}", path.display()))?;

        let count = file.memories.len();
        self.replace_all(file.memories).await?;
        tracing::info!("Restored memory backup {} ({} memories)", backup_id, count);
        Ok(true)
    }

    async fn edit_memory(&self, edit: MemoryEdit) -> Result<Option<Memory>> {
        let edited = {
            let mut guard = self.memories.write().await;
            guard.iter_mut().find(|m| m.id == edit.memory_id).map(|m| {
                edit.apply(m);
                m.clone()
            })
        };
        if edited.is_some() {
            self.persist().await?;
            tracing::info!("Edited memory {}", edit.memory_id);
        }
        Ok(edited)
    }
}
