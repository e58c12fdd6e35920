use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AvaConfig {
    pub env: String,
    pub debug: bool,
    pub data_dir: PathBuf,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub emotional: EmotionalConfig,
    pub personality: PersonalityConfig,
    pub self_awareness: SelfAwarenessConfig,
    pub tasks: TaskIntervals,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
}

impl Default for AvaConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            debug: false,
            data_dir: PathBuf::from("data"),
            llm: LlmConfig::default(),
            memory: MemoryConfig::default(),
            emotional: EmotionalConfig::default(),
            personality: PersonalityConfig::default(),
            self_awareness: SelfAwarenessConfig::default(),
            tasks: TaskIntervals::default(),
            conversation: ConversationConfig::default(),
            logging: LoggingConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl AvaConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and the result is validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AvaConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist or is invalid, return
    /// defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                if let Err(e) = cfg.validate() {
                    tracing::warn!("Ignoring env overrides, they produce an invalid config: {}", e);
                    cfg = Self::default();
                }
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    pub fn apply_env_overrides(&mut self) {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("AVA_"))
            .collect();
        self.apply_overrides(&vars);
    }

    fn apply_overrides(&mut self, vars: &HashMap<String, String>) {
        let get = |key: &str| vars.get(key).map(|s| s.trim().to_string());

        if let Some(v) = get("AVA_ENV") {
            self.env = v;
        }
        if let Some(v) = get("AVA_DEBUG") {
            self.debug = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("AVA_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("AVA_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = get("AVA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("AVA_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(n) = get("AVA_EMOTIONAL__CONFIDENCE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.emotional.confidence_threshold = n;
        }
        if let Some(n) = get("AVA_MEMORY__MAX_MEMORY_AGE_DAYS").and_then(|v| v.parse().ok()) {
            self.memory.max_memory_age_days = n;
        }
        if let Some(n) = get("AVA_MEMORY__RETRIEVAL_LIMIT").and_then(|v| v.parse().ok()) {
            self.memory.retrieval_limit = n;
        }
        if let Some(v) = get("AVA_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Reject values the subsystems cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.emotional;
        if !(e.confidence_threshold > 0.0 && e.confidence_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "emotional.confidence_threshold",
                reason: format!("{} is not in (0, 1]", e.confidence_threshold),
            });
        }
        for (name, rate) in [
            ("intensity", e.decay_rates.intensity),
            ("valence", e.decay_rates.valence),
            ("arousal", e.decay_rates.arousal),
        ] {
            if !(rate > 0.0 && rate < 1.0) {
                return Err(ConfigError::Invalid {
                    field: "emotional.decay_rates",
                    reason: format!("{} rate {} is not in (0, 1)", name, rate),
                });
            }
        }
        if self.memory.max_memory_age_days == 0 {
            return Err(ConfigError::Invalid {
                field: "memory.max_memory_age_days",
                reason: "must be positive".to_string(),
            });
        }
        if self.memory.retrieval_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "memory.retrieval_limit",
                reason: "must be positive".to_string(),
            });
        }
        let t = &self.tasks;
        for (field, secs) in [
            ("tasks.consolidation_secs", t.consolidation_secs),
            ("tasks.reflection_secs", t.reflection_secs),
            ("tasks.personality_secs", t.personality_secs),
            ("tasks.health_check_secs", t.health_check_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("interval {} must be positive", secs),
                });
            }
        }
        if self.conversation.max_history_turns == 0 {
            return Err(ConfigError::Invalid {
                field: "conversation.max_history_turns",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }

    /// Create the data, memory and log directories.
    pub fn setup_directories(&self) -> Result<(), ConfigError> {
        for dir in [self.data_dir.clone(), self.memory_dir(), self.log_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Directory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" or "mock"
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 60,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum memories returned by a relevance lookup.
    pub retrieval_limit: usize,
    /// Unimportant, never-accessed memories older than this are forgotten.
    pub max_memory_age_days: u32,
    pub forget_threshold: f32,
    pub consolidation_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 5,
            max_memory_age_days: 90,
            forget_threshold: 0.3,
            consolidation_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecayRates {
    pub intensity: f32,
    pub valence: f32,
    pub arousal: f32,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            intensity: 0.1,
            valence: 0.05,
            arousal: 0.15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmotionalConfig {
    /// Fraction lost per minute while drifting back to baseline.
    pub decay_rates: DecayRates,
    /// Readings below this intensity are reported as neutral.
    pub confidence_threshold: f32,
    /// How strongly a new reading pulls the running state (0.0 to 1.0).
    pub blend_factor: f32,
}

impl Default for EmotionalConfig {
    fn default() -> Self {
        Self {
            decay_rates: DecayRates::default(),
            confidence_threshold: 0.3,
            blend_factor: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersonalityConfig {
    pub update_interval_secs: u64,
    /// Largest change to a single trait per update.
    pub max_trait_step: f32,
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 6 * 3600,
            max_trait_step: 0.02,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelfAwarenessConfig {
    pub reflection_interval_secs: u64,
    /// How many recent conversation memories a reflection looks at.
    pub reflection_window: usize,
}

impl Default for SelfAwarenessConfig {
    fn default() -> Self {
        Self {
            reflection_interval_secs: 3600,
            reflection_window: 20,
        }
    }
}

/// Periods of the background maintenance jobs, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskIntervals {
    pub consolidation_secs: f64,
    pub reflection_secs: f64,
    pub personality_secs: f64,
    pub health_check_secs: f64,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            consolidation_secs: 3600.0,
            reflection_secs: 1800.0,
            personality_secs: 3600.0,
            health_check_secs: 300.0,
        }
    }
}

impl TaskIntervals {
    /// Same period for every job. Handy for tests.
    pub fn uniform(interval: Duration) -> Self {
        let secs = interval.as_secs_f64();
        Self {
            consolidation_secs: secs,
            reflection_secs: secs,
            personality_secs: secs,
            health_check_secs: secs,
        }
    }

    pub fn consolidation(&self) -> Duration {
        Duration::from_secs_f64(self.consolidation_secs)
    }

    pub fn reflection(&self) -> Duration {
        Duration::from_secs_f64(self.reflection_secs)
    }

    pub fn personality(&self) -> Duration {
        Duration::from_secs_f64(self.personality_secs)
    }

    pub fn health_check(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Turns kept in the in-memory history; the oldest is dropped beyond this.
    pub max_history_turns: usize,
    /// Turns replayed into each generator request.
    pub prompt_history_turns: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history_turns: 200,
            prompt_history_turns: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file directory; defaults to `<data_dir>/logs` when file logging is on.
    pub log_dir: Option<PathBuf>,
    pub file: bool,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file: false,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8642,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AvaConfig::default();
        assert_eq!(cfg.env, "development");
        assert!(!cfg.debug);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.llm.provider, "openai");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_emotional_defaults_in_range() {
        let cfg = EmotionalConfig::default();
        assert!(0.0 < cfg.decay_rates.intensity && cfg.decay_rates.intensity < 1.0);
        assert!(0.0 < cfg.decay_rates.valence && cfg.decay_rates.valence < 1.0);
        assert!(0.0 < cfg.decay_rates.arousal && cfg.decay_rates.arousal < 1.0);
        assert!(0.0 < cfg.confidence_threshold && cfg.confidence_threshold < 1.0);
    }

    #[test]
    fn test_memory_defaults_positive() {
        let cfg = MemoryConfig::default();
        assert!(cfg.max_memory_age_days > 0);
        assert!(cfg.retrieval_limit > 0);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[llm]
provider = "mock"
model = "test-model"
"#;
        let cfg: AvaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.model, "test-model");
        // Defaults for unspecified fields
        assert_eq!(cfg.llm.max_tokens, 1024);
        assert_eq!(cfg.memory.retrieval_limit, 5);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
env = "production"
debug = true
data_dir = "/var/lib/ava"

[llm]
provider = "openai"
model = "gpt-4o"
base_url = "http://localhost:11434/v1"
max_tokens = 2048
temperature = 0.9

[memory]
retrieval_limit = 8
max_memory_age_days = 30

[emotional]
confidence_threshold = 0.5
decay_rates = { intensity = 0.2, valence = 0.1, arousal = 0.3 }

[tasks]
consolidation_secs = 60
reflection_secs = 30
personality_secs = 45
health_check_secs = 5

[conversation]
max_history_turns = 20
prompt_history_turns = 4

[logging]
level = "debug"
file = true
json = true

[gateway]
port = 9000
"#;
        let cfg: AvaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.env, "production");
        assert!(cfg.debug);
        assert_eq!(cfg.llm.max_tokens, 2048);
        assert_eq!(cfg.memory.max_memory_age_days, 30);
        assert!((cfg.emotional.decay_rates.arousal - 0.3).abs() < 1e-6);
        assert_eq!(cfg.tasks.health_check(), Duration::from_secs(5));
        assert_eq!(cfg.conversation.prompt_history_turns, 4);
        assert!(cfg.logging.json);
        assert_eq!(cfg.gateway.port, 9000);
        assert_eq!(cfg.memory_dir(), PathBuf::from("/var/lib/ava/memory"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<String, String> = [
            ("AVA_ENV", "production"),
            ("AVA_DEBUG", "true"),
            ("AVA_LLM_MODEL", "gpt-4o"),
            ("AVA_EMOTIONAL__CONFIDENCE_THRESHOLD", "0.8"),
            ("AVA_MEMORY__MAX_MEMORY_AGE_DAYS", "120"),
            ("AVA_MEMORY__RETRIEVAL_LIMIT", "not-a-number"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut cfg = AvaConfig::default();
        cfg.apply_overrides(&vars);

        assert_eq!(cfg.env, "production");
        assert!(cfg.debug);
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert!((cfg.emotional.confidence_threshold - 0.8).abs() < 1e-6);
        assert_eq!(cfg.memory.max_memory_age_days, 120);
        // Unparseable values are ignored
        assert_eq!(cfg.memory.retrieval_limit, 5);
    }

    #[test]
    fn test_invalid_settings() {
        let mut cfg = AvaConfig::default();
        cfg.emotional.confidence_threshold = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "emotional.confidence_threshold", .. })
        ));

        let mut cfg = AvaConfig::default();
        cfg.memory.retrieval_limit = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AvaConfig::default();
        cfg.memory.max_memory_age_days = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AvaConfig::default();
        cfg.tasks.reflection_secs = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ava.toml");
        std::fs::write(&path, "[memory]\nretrieval_limit = 0\n").unwrap();
        assert!(matches!(
            AvaConfig::load(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = AvaConfig::load_or_default("/nonexistent/path/ava.toml");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_setup_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AvaConfig {
            data_dir: dir.path().join("data"),
            ..AvaConfig::default()
        };
        cfg.setup_directories().unwrap();
        assert!(cfg.data_dir.exists());
        assert!(cfg.memory_dir().exists());
        assert!(cfg.log_dir().exists());
    }
}
