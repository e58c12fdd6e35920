//! Pure state arithmetic: blending new readings in and decaying toward baseline.

use ava_core::config::DecayRates;
use ava_core::EmotionalSnapshot;

/// Deviation from the neutral baseline below which the label resets to "neutral".
const SETTLED_EPSILON: f32 = 0.05;

/// Fold `incoming` into `current`.
///
/// The incoming reading pulls with weight `incoming.intensity * blend_factor`.
/// The label follows whichever side contributes the larger weighted intensity.
pub fn blend(
    current: &EmotionalSnapshot,
    incoming: &EmotionalSnapshot,
    blend_factor: f32,
) -> EmotionalSnapshot {
    let w = (incoming.intensity * blend_factor).clamp(0.0, 1.0);
    let lerp = |a: f32, b: f32| a + (b - a) * w;

    let incoming_pull = w * incoming.intensity;
    let current_pull = (1.0 - w) * current.intensity;
    let primary = if incoming_pull >= current_pull || current.is_neutral() {
        &incoming.primary
    } else {
        &current.primary
    };

    let mut out = EmotionalSnapshot::new(
        primary,
        lerp(current.intensity, incoming.intensity),
        lerp(current.valence, incoming.valence),
        lerp(current.arousal, incoming.arousal),
    );
    out.context = incoming.context.clone();
    out
}

/// Exponential decay toward the neutral baseline after `minutes` elapsed.
pub fn decay(state: &EmotionalSnapshot, rates: &DecayRates, minutes: f32) -> EmotionalSnapshot {
    if minutes <= 0.0 || state.is_neutral() {
        return state.clone();
    }
    let baseline = EmotionalSnapshot::neutral();
    let toward = |value: f32, base: f32, rate: f32| {
        base + (value - base) * (1.0 - rate.clamp(0.0, 1.0)).powf(minutes)
    };

    let intensity = toward(state.intensity, baseline.intensity, rates.intensity);
    let valence = toward(state.valence, baseline.valence, rates.valence);
    let arousal = toward(state.arousal, baseline.arousal, rates.arousal);

    let settled = (intensity - baseline.intensity).abs() < SETTLED_EPSILON
        && valence.abs() < SETTLED_EPSILON
        && arousal.abs() < SETTLED_EPSILON;
    if settled {
        return baseline;
    }

    let mut out = EmotionalSnapshot::new(&state.primary, intensity, valence, arousal);
    out.context = state.context.clone();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_moves_toward_incoming() {
        let current = EmotionalSnapshot::neutral();
        let joy = EmotionalSnapshot::new("joy", 0.8, 0.7, 0.6);
        let out = blend(&current, &joy, 0.6);
        assert_eq!(out.primary, "joy");
        assert!(out.valence > 0.0 && out.valence < 0.7);
        assert!(out.arousal > 0.0 && out.arousal < 0.6);
    }

    #[test]
    fn test_weak_reading_keeps_strong_label() {
        let current = EmotionalSnapshot::new("anger", 0.9, -0.7, 0.8);
        let faint = EmotionalSnapshot::new("joy", 0.2, 0.3, 0.2);
        let out = blend(&current, &faint, 0.6);
        assert_eq!(out.primary, "anger");
    }

    #[test]
    fn test_decay_converges_to_neutral() {
        let state = EmotionalSnapshot::new("sadness", 0.9, -0.8, 0.5);
        let rates = DecayRates::default();
        let later = decay(&state, &rates, 5.0);
        assert!(later.valence > state.valence);
        assert!(later.arousal < state.arousal);
        assert_eq!(later.primary, "sadness");

        let much_later = decay(&state, &rates, 10_000.0);
        assert!(much_later.is_neutral());
    }

    #[test]
    fn test_zero_elapsed_is_identity() {
        let state = EmotionalSnapshot::new("fear", 0.7, -0.5, 0.7);
        assert_eq!(decay(&state, &DecayRates::default(), 0.0), state);
    }
}
