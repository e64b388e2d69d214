use crate::composer::DEFAULT_PERSONA;
use crate::error::{KnowledgeError, Result};
use crate::extractor::ExtractorConfig;
use crate::fingerprint::FingerprintAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration. Every field has a default, so an empty TOML
/// document is valid.
///
/// ```toml
/// cache_ttl_ms = 300000
/// sweep_interval_ms = 120000
/// fingerprint_algorithm = "polynomial32"
///
/// [extractor]
/// max_chars = 3000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Maximum age of a cached knowledge base, in milliseconds. Default: 300000.
    pub cache_ttl_ms: u64,
    /// How often the janitor sweeps, in milliseconds. Default: 120000.
    pub sweep_interval_ms: u64,
    pub fingerprint_algorithm: FingerprintAlgorithm,
    /// Persona used when a tenant has no behavior instruction.
    pub default_persona: String,
    pub extractor: ExtractorConfig,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 300_000,
            sweep_interval_ms: 120_000,
            fingerprint_algorithm: FingerprintAlgorithm::default(),
            default_persona: DEFAULT_PERSONA.to_string(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl KnowledgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_ms == 0 {
            return Err(KnowledgeError::Config("cache_ttl_ms must be > 0".into()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(KnowledgeError::Config("sweep_interval_ms must be > 0".into()));
        }
        if self.extractor.max_chars == 0 {
            return Err(KnowledgeError::Config("extractor.max_chars must be > 0".into()));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Rounds up to whole milliseconds so a non-zero duration never
    /// becomes a zero TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = duration_to_ms(ttl);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = duration_to_ms(interval);
        self
    }

    pub fn with_fingerprint_algorithm(mut self, algorithm: FingerprintAlgorithm) -> Self {
        self.fingerprint_algorithm = algorithm;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    let ms = d.as_nanos().div_ceil(1_000_000);
    u64::try_from(ms).unwrap_or(u64::MAX)
}
