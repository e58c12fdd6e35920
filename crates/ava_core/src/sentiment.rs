//! Simple keyword-based English emotion detection.
//!
//! Shared by the emotion subsystem and the CLI `analyze` command.
//! In production, this should be replaced with an ML model.

/// (label, valence, arousal, keywords)
const CATEGORIES: &[(&str, f32, f32, &[&str])] = &[
    (
        "joy",
        0.8,
        0.6,
        &[
            "happy", "glad", "joy", "great", "love", "wonderful", "excited", "awesome", "thanks",
            "thank", "delighted", "amazing", "good", "fantastic", "pleased", "yay",
        ],
    ),
    (
        "sadness",
        -0.7,
        0.2,
        &[
            "sad", "unhappy", "lonely", "depressed", "miss", "cry", "crying", "down", "upset",
            "heartbroken", "disappointed", "tired",
        ],
    ),
    (
        "anger",
        -0.8,
        0.9,
        &[
            "angry", "mad", "furious", "hate", "annoyed", "frustrated", "irritated", "outraged",
        ],
    ),
    (
        "fear",
        -0.6,
        0.8,
        &[
            "afraid", "scared", "worried", "anxious", "nervous", "fear", "terrified", "panic",
        ],
    ),
    (
        "surprise",
        0.2,
        0.9,
        &["surprised", "wow", "unexpected", "shocked", "astonished", "whoa"],
    ),
];

const INTENSIFIERS: &[&str] = &[
    "really", "very", "so", "extremely", "incredibly", "totally", "super", "absolutely",
];

/// Result of lexicon analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionReading {
    pub label: &'static str,
    /// 0.1 to 1.0
    pub intensity: f32,
    /// -1.0 to 1.0
    pub valence: f32,
    /// 0.0 to 1.0
    pub arousal: f32,
    /// Keywords that triggered the label
    pub triggers: Vec<String>,
}

/// Detect the dominant emotion in `text`.
///
/// Returns `None` when no emotion keyword matches; callers treat that as neutral.
pub fn analyze(text: &str) -> Option<EmotionReading> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(usize, Vec<String>)> = None;
    for (idx, (_, _, _, keywords)) in CATEGORIES.iter().enumerate() {
        let hits: Vec<String> = words
            .iter()
            .filter(|w| keywords.contains(w))
            .map(|w| w.to_string())
            .collect();
        if hits.is_empty() {
            continue;
        }
        let better = match &best {
            Some((_, prev)) => hits.len() > prev.len(),
            None => true,
        };
        if better {
            best = Some((idx, hits));
        }
    }

    let (idx, triggers) = best?;
    let (label, base_valence, base_arousal, _) = CATEGORIES[idx];

    let boosters = words.iter().filter(|w| INTENSIFIERS.contains(w)).count() as f32;
    let exclaim = if text.contains('!') { 0.1 } else { 0.0 };
    let intensity =
        (0.5 + 0.15 * (triggers.len() as f32 - 1.0) + 0.1 * boosters + exclaim).clamp(0.1, 1.0);
    let scale = 0.6 + 0.4 * intensity;

    Some(EmotionReading {
        label,
        intensity,
        valence: (base_valence * scale).clamp(-1.0, 1.0),
        arousal: (base_arousal * scale).clamp(0.0, 1.0),
        triggers,
    })
}
