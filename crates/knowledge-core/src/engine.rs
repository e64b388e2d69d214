use crate::cache::{CacheEntrySummary, CacheStats, CacheStore, Janitor, JanitorHandle, SweepReport};
use crate::clock::{Clock, SystemClock};
use crate::composer::KnowledgeComposer;
use crate::config::KnowledgeConfig;
use crate::error::{KnowledgeError, Result};
use crate::extractor::RelevanceExtractor;
use crate::source::KnowledgeSource;
use crate::types::{Document, Integration, IntegrationId, SiteContentItem};
use std::sync::{Arc, Mutex, PoisonError};

/// A write to a tenant's source material. Every variant invalidates the
/// tenant's cached knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChange {
    DocumentCreated(IntegrationId),
    DocumentUpdated(IntegrationId),
    DocumentDeleted(IntegrationId),
    SiteContentCreated(IntegrationId),
    SiteContentUpdated(IntegrationId),
    SiteContentDeleted(IntegrationId),
    /// Name, description or behavior instruction changed. Not covered by
    /// content fingerprints.
    IntegrationUpdated(IntegrationId),
}

impl ContentChange {
    pub fn tenant_id(&self) -> IntegrationId {
        match *self {
            ContentChange::DocumentCreated(id)
            | ContentChange::DocumentUpdated(id)
            | ContentChange::DocumentDeleted(id)
            | ContentChange::SiteContentCreated(id)
            | ContentChange::SiteContentUpdated(id)
            | ContentChange::SiteContentDeleted(id)
            | ContentChange::IntegrationUpdated(id) => id,
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub rebuilds: u64,
    pub janitor_running: bool,
}

/// Knowledge-base engine for the chat path: composition with caching,
/// relevance extraction, invalidation, and the background janitor.
///
/// # Example
/// ```rust,no_run
/// use knowledge_core::{Document, Integration, KnowledgeConfig, KnowledgeEngine};
///
/// # async fn run() -> knowledge_core::Result<()> {
/// let engine = KnowledgeEngine::start(KnowledgeConfig::default())?;
/// let acme = Integration::new(7, "Acme").with_behavior_instruction("Be concise.");
/// let docs = vec![Document::new("FAQ.pdf", "Q: Refunds? A: 30 days.")];
///
/// let kb = engine.compose_knowledge_base(&acme, &docs, &[]);
/// let excerpt = engine.extract_relevant("what plans do you have?", &kb);
/// engine.close().await;
/// # Ok(())
/// # }
/// ```
pub struct KnowledgeEngine {
    store: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    composer: KnowledgeComposer,
    extractor: RelevanceExtractor,
    config: KnowledgeConfig,
    janitor: Mutex<Option<JanitorHandle>>,
}

impl KnowledgeEngine {
    /// Build an engine without a background janitor. Expired entries are
    /// still rebuilt on access; call [`sweep_expired`](Self::sweep_expired)
    /// to reclaim memory.
    pub fn new(config: KnowledgeConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: KnowledgeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(CacheStore::new(config.cache_ttl()));
        let composer = KnowledgeComposer::new(store.clone(), clock.clone())
            .with_algorithm(config.fingerprint_algorithm)
            .with_default_persona(config.default_persona.clone());
        let extractor = RelevanceExtractor::new(config.extractor.clone());

        Ok(Self {
            store,
            clock,
            composer,
            extractor,
            config,
            janitor: Mutex::new(None),
        })
    }

    /// Build an engine and start its janitor on the current tokio runtime.
    pub fn start(config: KnowledgeConfig) -> Result<Self> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    pub fn start_with_clock(config: KnowledgeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let engine = Self::with_clock(config, clock)?;
        engine.start_janitor()?;
        Ok(engine)
    }

    /// Start the janitor if it is not already running.
    pub fn start_janitor(&self) -> Result<()> {
        let mut slot = self.janitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        let handle = Janitor::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.sweep_interval(),
        )
        .spawn()?;
        *slot = Some(handle);
        Ok(())
    }

    /// Stop the janitor and wait for it. Safe to call more than once.
    pub async fn close(&self) {
        let handle = self
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// The tenant's knowledge base, served from cache while its documents
    /// and site content are unchanged and the entry is younger than the TTL.
    pub fn compose_knowledge_base(
        &self,
        integration: &Integration,
        documents: &[Document],
        site_content: &[SiteContentItem],
    ) -> Arc<str> {
        self.composer.compose(integration, documents, site_content)
    }

    /// A bounded excerpt of `knowledge_base` biased toward the message's topic.
    pub fn extract_relevant(&self, message: &str, knowledge_base: &str) -> String {
        self.extractor.extract(message, knowledge_base)
    }

    /// Read the tenant's material from `source` and compose it.
    pub fn knowledge_base_for<S: KnowledgeSource + ?Sized>(
        &self,
        source: &S,
        tenant_id: IntegrationId,
    ) -> Result<Arc<str>> {
        let integration = source
            .integration(tenant_id)?
            .ok_or(KnowledgeError::IntegrationNotFound(tenant_id))?;
        let documents = source.documents(tenant_id)?;
        let site_content = source.site_content(tenant_id)?;
        Ok(self.compose_knowledge_base(&integration, &documents, &site_content))
    }

    /// Compose the tenant's knowledge base and extract the part relevant to `message`.
    pub fn relevant_context_for<S: KnowledgeSource + ?Sized>(
        &self,
        source: &S,
        tenant_id: IntegrationId,
        message: &str,
    ) -> Result<String> {
        let kb = self.knowledge_base_for(source, tenant_id)?;
        Ok(self.extract_relevant(message, &kb))
    }

    /// Write-side hook for document, site-content and integration changes.
    pub fn content_changed(&self, change: ContentChange) {
        let tenant_id = change.tenant_id();
        if self.store.invalidate(tenant_id) {
            log::debug!("Invalidated knowledge base for tenant {} ({:?})", tenant_id, change);
        }
    }

    pub fn invalidate_tenant(&self, tenant_id: IntegrationId) -> bool {
        self.store.invalidate(tenant_id)
    }

    pub fn clear_all(&self) {
        let n = self.store.len();
        self.store.clear();
        log::info!("Cleared {} cached knowledge bases", n);
    }

    /// Run one janitor pass now, on the calling thread.
    pub fn sweep_expired(&self) -> SweepReport {
        self.store.sweep_at(self.clock.as_ref())
    }

    pub fn cached_entries(&self) -> Vec<CacheEntrySummary> {
        self.store.entries(self.clock.now())
    }

    pub fn stats(&self) -> EngineStats {
        let janitor_running = self
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished());
        EngineStats {
            cache: self.store.stats(),
            rebuilds: self.composer.rebuilds(),
            janitor_running,
        }
    }
}
