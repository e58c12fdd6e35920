use anyhow::Result;
use async_trait::async_trait;
use ava_core::config::PersonalityConfig;
use ava_core::{MemoryFilter, MemoryKind, MemoryPort, PersonalityPort, PersonalitySummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How many emotional memories one update looks at.
const EVIDENCE_WINDOW: usize = 20;

/// Big Five trait scores, each 0.0 to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    pub openness: f32,
    pub conscientiousness: f32,
    pub extraversion: f32,
    pub agreeableness: f32,
    pub neuroticism: f32,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            openness: 0.7,
            conscientiousness: 0.6,
            extraversion: 0.5,
            agreeableness: 0.75,
            neuroticism: 0.3,
        }
    }
}

impl Traits {
    fn clamp(&mut self) {
        for t in [
            &mut self.openness,
            &mut self.conscientiousness,
            &mut self.extraversion,
            &mut self.agreeableness,
            &mut self.neuroticism,
        ] {
            *t = t.clamp(0.0, 1.0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentStage {
    Nascent,
    Developing,
    Established,
}

impl DevelopmentStage {
    pub fn from_updates(count: u32) -> Self {
        match count {
            0..=4 => DevelopmentStage::Nascent,
            5..=19 => DevelopmentStage::Developing,
            _ => DevelopmentStage::Established,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DevelopmentStage::Nascent => "nascent",
            DevelopmentStage::Developing => "developing",
            DevelopmentStage::Established => "established",
        }
    }
}

#[derive(Debug, Default)]
struct PersonaState {
    traits: Traits,
    update_count: u32,
    last_update: Option<DateTime<Utc>>,
}

/// Aggregate of recent emotional memories.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Evidence {
    mean_valence: f32,
    mean_arousal: f32,
    /// Distinct emotion labels seen, 0.0 (one label) to 1.0 (five or more)
    variety: f32,
}

impl Evidence {
    fn gather(memories: &[ava_core::Memory]) -> Option<Self> {
        let readings: Vec<_> = memories
            .iter()
            .filter_map(|m| m.emotional_context.as_ref())
            .collect();
        if readings.is_empty() {
            return None;
        }
        let n = readings.len() as f32;
        let labels: HashSet<&str> = readings.iter().map(|r| r.primary.as_str()).collect();
        Some(Self {
            mean_valence: readings.iter().map(|r| r.valence).sum::<f32>() / n,
            mean_arousal: readings.iter().map(|r| r.arousal).sum::<f32>() / n,
            variety: ((labels.len() as f32 - 1.0) / 4.0).clamp(0.0, 1.0),
        })
    }
}

/// Production personality model.
///
/// Traits drift by at most `max_trait_step` per update, driven by the
/// valence and arousal of recently recorded emotional memories.
pub struct PersonalitySystem {
    config: PersonalityConfig,
    memory: Arc<dyn MemoryPort>,
    state: RwLock<PersonaState>,
}

impl PersonalitySystem {
    pub fn new(config: PersonalityConfig, memory: Arc<dyn MemoryPort>) -> Self {
        Self {
            config,
            memory,
            state: RwLock::new(PersonaState::default()),
        }
    }

    pub async fn traits(&self) -> Traits {
        self.state.read().await.traits.clone()
    }

    pub async fn stage(&self) -> DevelopmentStage {
        DevelopmentStage::from_updates(self.state.read().await.update_count)
    }

    async fn is_update_due(&self) -> bool {
        let interval = Duration::seconds(self.config.update_interval_secs.min(u32::MAX as u64) as i64);
        match self.state.read().await.last_update {
            Some(last) => Utc::now() - last >= interval,
            None => true,
        }
    }

    fn apply(&self, traits: &mut Traits, evidence: Evidence) {
        let step = self.config.max_trait_step;
        traits.agreeableness += step * evidence.mean_valence;
        traits.neuroticism -= step * evidence.mean_valence;
        traits.extraversion += step * (evidence.mean_arousal * 2.0 - 1.0);
        traits.openness += step * (evidence.variety * 2.0 - 1.0);
        traits.clamp();
    }
}

#[async_trait]
impl PersonalityPort for PersonalitySystem {
    async fn initialize(&self) -> Result<()> {
        tracing::info!("Personality system ready ({})", self.stage().await.as_str());
        Ok(())
    }

    async fn get_personality_summary(&self) -> Result<PersonalitySummary> {
        let state = self.state.read().await;
        let mut summary = PersonalitySummary::new();
        summary.insert("traits".into(), serde_json::to_value(&state.traits)?);
        summary.insert(
            "development_stage".into(),
            json!(DevelopmentStage::from_updates(state.update_count).as_str()),
        );
        summary.insert("update_count".into(), json!(state.update_count));
        summary.insert("last_update".into(), json!(state.last_update));
        Ok(summary)
    }

    async fn update_personality(&self, force: bool) -> Result<bool> {
        if !force && !self.is_update_due().await {
            return Ok(false);
        }

        let recent = self
            .memory
            .get_memories(Some(
                MemoryFilter::kind(MemoryKind::Emotional).with_limit(EVIDENCE_WINDOW),
            ))
            .await?;

        let mut state = self.state.write().await;
        state.last_update = Some(Utc::now());
        let Some(evidence) = Evidence::gather(&recent) else {
            tracing::debug!("No emotional evidence, personality unchanged");
            return Ok(false);
        };

        let mut traits = state.traits.clone();
        self.apply(&mut traits, evidence);
        state.traits = traits;
        state.update_count += 1;
        tracing::info!(
            "Personality updated (#{}, stage {})",
            state.update_count,
            DevelopmentStage::from_updates(state.update_count).as_str()
        );
        Ok(true)
    }
}
