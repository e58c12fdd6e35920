//! Point-in-time emotional reading.
//!
//! Emotions are carried both as a discrete label (`primary`) and as
//! continuous circumplex coordinates (valence × arousal) plus an intensity.

use serde::{Deserialize, Serialize};

/// A point-in-time read of the emotion subsystem's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalSnapshot {
    /// Discrete emotion label ("joy", "sadness", "neutral", ...)
    pub primary: String,

    /// How strongly the emotion is felt (0.0 to 1.0)
    pub intensity: f32,

    /// Positive/negative (-1.0 to 1.0)
    pub valence: f32,

    /// Calm/activated (0.0 to 1.0)
    pub arousal: f32,

    /// Free-form annotations (source text, trigger words, ...)
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl Default for EmotionalSnapshot {
    fn default() -> Self {
        Self::neutral()
    }
}

impl EmotionalSnapshot {
    /// Build a snapshot, clamping every dimension into its range.
    pub fn new(primary: &str, intensity: f32, valence: f32, arousal: f32) -> Self {
        Self {
            primary: primary.to_string(),
            intensity: clamp_finite(intensity, 0.0, 1.0, 0.5),
            valence: clamp_finite(valence, -1.0, 1.0, 0.0),
            arousal: clamp_finite(arousal, 0.0, 1.0, 0.0),
            context: serde_json::Map::new(),
        }
    }

    /// The safe default used whenever an emotional reading is unavailable.
    pub fn neutral() -> Self {
        Self::new("neutral", 0.5, 0.0, 0.0)
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn is_neutral(&self) -> bool {
        self.primary == "neutral"
    }

    /// Short natural-language rendering for prompt injection.
    pub fn describe(&self) -> String {
        let strength = if self.intensity > 0.75 {
            "strongly"
        } else if self.intensity > 0.4 {
            "moderately"
        } else {
            "slightly"
        };
        let tone = if self.valence > 0.2 {
            "positive"
        } else if self.valence < -0.2 {
            "negative"
        } else {
            "balanced"
        };
        format!(
            "{} {} (valence {:+.2}, arousal {:.2}, overall {})",
            strength, self.primary, self.valence, self.arousal, tone
        )
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_defaults() {
        let n = EmotionalSnapshot::neutral();
        assert_eq!(n.primary, "neutral");
        assert!((n.intensity - 0.5).abs() < f32::EPSILON);
        assert_eq!(n.valence, 0.0);
        assert_eq!(n.arousal, 0.0);
        assert!(n.context.is_empty());
        assert_eq!(EmotionalSnapshot::default(), n);
    }

    #[test]
    fn test_new_clamps_out_of_range() {
        let s = EmotionalSnapshot::new("joy", 3.0, -4.0, f32::NAN);
        assert_eq!(s.intensity, 1.0);
        assert_eq!(s.valence, -1.0);
        assert_eq!(s.arousal, 0.0);
    }

    #[test]
    fn test_describe_mentions_label() {
        let s = EmotionalSnapshot::new("joy", 0.9, 0.7, 0.6);
        let text = s.describe();
        assert!(text.contains("strongly joy"));
        assert!(text.contains("positive"));
    }

    #[test]
    fn test_context_missing_deserializes_empty() {
        let json = r#"{"primary":"calm","intensity":0.6,"valence":0.3,"arousal":0.1}"#;
        let s: EmotionalSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(s.primary, "calm");
        assert!(s.context.is_empty());
    }
}
