pub mod types;
pub mod error;
pub mod clock;
pub mod fingerprint;
pub mod cache;
pub mod composer;
pub mod extractor;
pub mod source;
pub mod config;
pub mod engine;

pub use error::{KnowledgeError, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::{
    fingerprint, fingerprint_with, ContentItem, Fingerprint, FingerprintAlgorithm,
    FingerprintHasher, Fingerprints,
};
pub use cache::{
    CacheEntry, CacheEntrySummary, CacheStats, CacheStore, Janitor, JanitorHandle, Resolution,
    StaleReason, SweepReport,
};
pub use composer::{render_knowledge_base, KnowledgeComposer, DEFAULT_PERSONA};
pub use extractor::{ExtractorConfig, RelevanceExtractor, Topic};
pub use source::{InMemorySource, KnowledgeSource};
pub use config::KnowledgeConfig;
pub use engine::{ContentChange, EngineStats, KnowledgeEngine};
