//! # Ava Core
//!
//! Shared vocabulary for the Ava runtime: the data model exchanged between
//! subsystems, the port traits every subsystem implements, configuration,
//! and the lexicon sentiment used by the emotion subsystem.
//!
//! The orchestration layer only ever talks to subsystems through the traits
//! defined here. Each port implementation owns its own internal locking.

pub mod config;
pub mod conversation;
pub mod emotion;
pub mod error_log;
pub mod memory;
pub mod mock;
pub mod sentiment;

pub use config::{AvaConfig, ConfigError};
pub use conversation::{ChatMessage, ConversationContext, Role, TurnRecord};
pub use emotion::EmotionalSnapshot;
pub use error_log::{ErrorEvent, ErrorLog, Severity};
pub use memory::{BackupInfo, Memory, MemoryEdit, MemoryFilter, MemoryKind};

use anyhow::Result;
use async_trait::async_trait;

/// Free-form personality description (trait scores, development stage, ...).
pub type PersonalitySummary = serde_json::Map<String, serde_json::Value>;

/// Long-term memory storage and retrieval.
#[async_trait]
pub trait MemoryPort: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    /// Memories relevant to `text`, most relevant first.
    async fn get_relevant_memories(&self, text: &str) -> Result<Vec<Memory>>;

    async fn add_memory(&self, memory: Memory) -> Result<()>;

    /// Memories matching `filter`, newest first. `None` returns everything.
    async fn get_memories(&self, filter: Option<MemoryFilter>) -> Result<Vec<Memory>>;
}

/// Operator maintenance of the memory store: backups and manual edits.
#[async_trait]
pub trait MemoryAdminPort: Send + Sync {
    /// Save a copy of every memory and return its descriptor.
    async fn create_backup(&self, description: Option<String>) -> Result<BackupInfo>;

    /// Saved backups, newest first.
    async fn list_backups(&self) -> Result<Vec<BackupInfo>>;

    /// Replace every memory with the backup's content. `false` when no
    /// backup has that id.
    async fn restore_backup(&self, backup_id: &str) -> Result<bool>;

    /// Apply `edit` and return the updated memory, or `None` when no memory
    /// has that id.
    async fn edit_memory(&self, edit: MemoryEdit) -> Result<Option<Memory>>;
}

/// Periodic compaction of the memory store.
#[async_trait]
pub trait MemoryConsolidationPort: Send + Sync {
    /// Returns `true` when a consolidation pass actually ran.
    /// Without `force` the pass is skipped until its interval has elapsed.
    async fn consolidate_memories(&self, force: bool) -> Result<bool>;
}

/// Emotion inference and the running emotional state.
#[async_trait]
pub trait EmotionPort: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn analyze_text(&self, text: &str) -> Result<EmotionalSnapshot>;
    async fn update_emotional_state(&self, snapshot: EmotionalSnapshot) -> Result<()>;
    async fn get_current_state(&self) -> Result<EmotionalSnapshot>;
}

/// Personality model.
#[async_trait]
pub trait PersonalityPort: Send + Sync {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn get_personality_summary(&self) -> Result<PersonalitySummary>;

    /// Returns `true` when the traits were updated.
    async fn update_personality(&self, force: bool) -> Result<bool>;
}

/// Self-reflection module.
#[async_trait]
pub trait SelfAwarenessPort: Send + Sync {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Returns `true` when a reflection was produced.
    async fn reflect(&self, force: bool) -> Result<bool>;

    async fn get_status(&self) -> Result<serde_json::Map<String, serde_json::Value>>;
}

/// Generative backend. Any error is a generation failure; callers do not
/// distinguish error kinds.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String>;
}
