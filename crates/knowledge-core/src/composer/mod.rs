pub mod render;

pub use render::{render_knowledge_base, DEFAULT_PERSONA};

use crate::cache::{CacheEntry, CacheStore, Resolution};
use crate::clock::Clock;
use crate::fingerprint::{FingerprintAlgorithm, Fingerprints};
use crate::types::{Document, Integration, SiteContentItem};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Builds tenant knowledge bases, serving cached text while the tenant's
/// documents and site content are unchanged.
pub struct KnowledgeComposer {
    store: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    algorithm: FingerprintAlgorithm,
    default_persona: String,
    rebuilds: AtomicU64,
}

impl KnowledgeComposer {
    pub fn new(store: Arc<CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            algorithm: FingerprintAlgorithm::default(),
            default_persona: DEFAULT_PERSONA.to_string(),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn with_algorithm(mut self, algorithm: FingerprintAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_default_persona(mut self, persona: impl Into<String>) -> Self {
        self.default_persona = persona.into();
        self
    }

    /// Return the tenant's knowledge base, rebuilding only when the cached
    /// entry is missing, expired, or was built from different content.
    pub fn compose(
        &self,
        integration: &Integration,
        documents: &[Document],
        site_content: &[SiteContentItem],
    ) -> Arc<str> {
        let fingerprints = Fingerprints::compute(self.algorithm, documents, site_content);
        let now = self.clock.now();

        let reason = match self.store.resolve(integration.id, &fingerprints, now) {
            Resolution::Cached(entry) => {
                log::debug!("Knowledge base cache hit for tenant {}", integration.id);
                return entry.composed_text.clone();
            }
            Resolution::Stale(reason) => reason,
        };

        log::debug!(
            "Rebuilding knowledge base for tenant {} ({}): docs={} site={}",
            integration.id,
            reason,
            fingerprints.documents,
            fingerprints.site_content
        );

        let text = render_knowledge_base(
            integration,
            &self.default_persona,
            documents,
            site_content,
        );
        self.rebuilds.fetch_add(1, Ordering::Relaxed);

        // Racing rebuilds for one tenant produce identical text; last write wins.
        let entry = self
            .store
            .put(CacheEntry::new(integration.id, text, fingerprints, now));
        entry.composed_text.clone()
    }

    /// Number of full compositions performed.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }
}
