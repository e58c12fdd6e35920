use crate::dynamics;
use anyhow::Result;
use async_trait::async_trait;
use ava_core::config::EmotionalConfig;
use ava_core::{sentiment, EmotionPort, EmotionalSnapshot};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{watch, RwLock};

#[derive(Debug, Clone)]
struct Anchored {
    state: EmotionalSnapshot,
    at: DateTime<Utc>,
}

/// Production emotion subsystem.
///
/// The running state is stored together with the instant it was last
/// written; decay is applied lazily on read so no background ticker is
/// needed.
pub struct EmotionalSystem {
    config: EmotionalConfig,
    state: RwLock<Anchored>,
    state_tx: watch::Sender<EmotionalSnapshot>,
}

impl EmotionalSystem {
    pub fn new(config: EmotionalConfig) -> Self {
        let (state_tx, _) = watch::channel(EmotionalSnapshot::neutral());
        Self {
            config,
            state: RwLock::new(Anchored {
                state: EmotionalSnapshot::neutral(),
                at: Utc::now(),
            }),
            state_tx,
        }
    }

    /// Subscribe to state updates (sent after every `update_emotional_state`).
    pub fn subscribe(&self) -> watch::Receiver<EmotionalSnapshot> {
        self.state_tx.subscribe()
    }

    /// The state as it would read at `now`.
    pub async fn state_at(&self, now: DateTime<Utc>) -> EmotionalSnapshot {
        let anchored = self.state.read().await;
        let minutes = (now - anchored.at).num_milliseconds() as f32 / 60_000.0;
        dynamics::decay(&anchored.state, &self.config.decay_rates, minutes)
    }

    /// Lexicon analysis without touching the running state.
    pub fn analyze(&self, text: &str) -> EmotionalSnapshot {
        let Some(reading) = sentiment::analyze(text) else {
            return EmotionalSnapshot::neutral().with_context("source", json!("lexicon"));
        };
        if reading.intensity < self.config.confidence_threshold {
            tracing::debug!(
                "Reading {} below confidence threshold ({:.2} < {:.2})",
                reading.label,
                reading.intensity,
                self.config.confidence_threshold
            );
            return EmotionalSnapshot::neutral().with_context("source", json!("lexicon"));
        }
        EmotionalSnapshot::new(reading.label, reading.intensity, reading.valence, reading.arousal)
            .with_context("source", json!("lexicon"))
            .with_context("triggers", json!(reading.triggers))
    }

    /// Overwrite the running state. Intended for restoring persisted state.
    pub async fn set_state(&self, snapshot: EmotionalSnapshot) {
        let mut anchored = self.state.write().await;
        anchored.state = snapshot.clone();
        anchored.at = Utc::now();
        self.state_tx.send_replace(snapshot);
    }
}

#[async_trait]
impl EmotionPort for EmotionalSystem {
    async fn initialize(&self) -> Result<()> {
        tracing::info!(
            "Emotional system ready (confidence_threshold={:.2}, blend_factor={:.2})",
            self.config.confidence_threshold,
            self.config.blend_factor
        );
        Ok(())
    }

    async fn analyze_text(&self, text: &str) -> Result<EmotionalSnapshot> {
        Ok(self.analyze(text))
    }

    async fn update_emotional_state(&self, snapshot: EmotionalSnapshot) -> Result<()> {
        let now = Utc::now();
        let mut anchored = self.state.write().await;
        let minutes = (now - anchored.at).num_milliseconds() as f32 / 60_000.0;
        let decayed = dynamics::decay(&anchored.state, &self.config.decay_rates, minutes);
        let next = dynamics::blend(&decayed, &snapshot, self.config.blend_factor);

        tracing::debug!("Emotional state: {} -> {}", decayed.primary, next.primary);
        anchored.state = next.clone();
        anchored.at = now;
        self.state_tx.send_replace(next);
        Ok(())
    }

    async fn get_current_state(&self) -> Result<EmotionalSnapshot> {
        Ok(self.state_at(Utc::now()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn system() -> EmotionalSystem {
        EmotionalSystem::new(EmotionalConfig::default())
    }

    #[tokio::test]
    async fn test_starts_neutral() {
        let sys = system();
        sys.initialize().await.unwrap();
        assert!(sys.get_current_state().await.unwrap().is_neutral());
    }

    #[tokio::test]
    async fn test_analyze_text() {
        let sys = system();
        let joy = sys.analyze_text("I'm so happy today!").await.unwrap();
        assert_eq!(joy.primary, "joy");
        assert!(joy.valence > 0.0);
        assert_eq!(joy.context["triggers"], json!(["happy"]));

        let flat = sys.analyze_text("The report is due Friday").await.unwrap();
        assert!(flat.is_neutral());
        assert_eq!(flat.intensity, 0.5);
    }

    #[tokio::test]
    async fn test_high_threshold_yields_neutral() {
        let sys = EmotionalSystem::new(EmotionalConfig {
            confidence_threshold: 0.95,
            ..EmotionalConfig::default()
        });
        assert!(sys.analyze("I am happy").is_neutral());
    }

    #[tokio::test]
    async fn test_update_blends_and_broadcasts() {
        let sys = system();
        let mut rx = sys.subscribe();
        let reading = sys.analyze("I am really angry and furious!");
        sys.update_emotional_state(reading).await.unwrap();

        let state = sys.get_current_state().await.unwrap();
        assert_eq!(state.primary, "anger");
        assert!(state.valence < 0.0);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().primary, "anger");
    }

    #[tokio::test]
    async fn test_state_decays_over_time() {
        let sys = system();
        sys.set_state(EmotionalSnapshot::new("sadness", 0.9, -0.8, 0.6)).await;

        let soon = sys.state_at(Utc::now() + Duration::minutes(2)).await;
        assert_eq!(soon.primary, "sadness");
        assert!(soon.valence > -0.8);

        let days_later = sys.state_at(Utc::now() + Duration::days(2)).await;
        assert!(days_later.is_neutral());
    }
}
