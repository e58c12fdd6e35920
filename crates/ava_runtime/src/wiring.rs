use anyhow::Result;
use ava_core::{
    AvaConfig, EmotionPort, Generator, MemoryAdminPort, MemoryConsolidationPort, MemoryPort,
    PersonalityPort, SelfAwarenessPort,
};
use ava_limbic::EmotionalSystem;
use ava_memory::{MemoryConsolidator, MemoryStore};
use ava_persona::{PersonalitySystem, SelfAwareness};
use ava_reasoning::build_generator;
use std::sync::Arc;

/// The subsystem instances shared by the pipeline, the background jobs and
/// the status queries.
#[derive(Clone)]
pub struct Subsystems {
    pub memory: Arc<dyn MemoryPort>,
    /// Same store as `memory`, seen through its maintenance operations.
    pub admin: Arc<dyn MemoryAdminPort>,
    pub consolidation: Arc<dyn MemoryConsolidationPort>,
    pub emotion: Arc<dyn EmotionPort>,
    pub personality: Arc<dyn PersonalityPort>,
    pub self_awareness: Arc<dyn SelfAwarenessPort>,
    pub generator: Arc<dyn Generator>,
}

/// Wire the production collaborators from configuration.
///
/// Nothing is initialized here; that happens in `Orchestrator::start`.
pub fn build_subsystems(config: &AvaConfig) -> Result<Subsystems> {
    let store = Arc::new(MemoryStore::new(config.memory_dir(), config.memory.clone()));
    let memory: Arc<dyn MemoryPort> = store.clone();
    let admin: Arc<dyn MemoryAdminPort> = store.clone();
    let consolidation = Arc::new(MemoryConsolidator::new(store));
    let emotion: Arc<dyn EmotionPort> = Arc::new(EmotionalSystem::new(config.emotional.clone()));
    let personality = Arc::new(PersonalitySystem::new(
        config.personality.clone(),
        memory.clone(),
    ));
    let self_awareness = Arc::new(SelfAwareness::new(
        config.self_awareness.clone(),
        memory.clone(),
        emotion.clone(),
    ));
    let generator = build_generator(&config.llm)?;

    tracing::debug!(
        "Subsystems wired (memory at {}, provider {})",
        config.memory_dir().display(),
        config.llm.provider
    );

    Ok(Subsystems {
        memory,
        admin,
        consolidation,
        emotion,
        personality,
        self_awareness,
        generator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_with_mock_provider() {
        let dir = TempDir::new().unwrap();
        let mut config = AvaConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.llm.provider = "mock".into();

        let subsystems = build_subsystems(&config).unwrap();
        subsystems.memory.initialize().await.unwrap();
        assert!(config.memory_dir().join("memories.json").exists());

        let reply = subsystems
            .generator
            .generate_response(&[ava_core::ChatMessage::user("ping")])
            .await
            .unwrap();
        assert!(reply.contains("ping"));
    }

    #[test]
    fn test_unknown_provider_fails() {
        let mut config = AvaConfig::default();
        config.llm.provider = "nope".into();
        assert!(build_subsystems(&config).is_err());
    }
}
