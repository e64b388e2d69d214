pub mod janitor;

pub use janitor::{Janitor, JanitorHandle};

use crate::clock::Clock;
use crate::fingerprint::{Fingerprint, Fingerprints};
use crate::types::IntegrationId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// A composed knowledge base and the fingerprints it was built from.
/// Never mutated; a rebuild replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub tenant_id: IntegrationId,
    pub composed_text: Arc<str>,
    pub fingerprints: Fingerprints,
    /// Monotonic creation time, used for TTL checks.
    pub created_at: Instant,
    /// Wall-clock build time, for admin listings only.
    pub built_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        tenant_id: IntegrationId,
        composed_text: impl Into<Arc<str>>,
        fingerprints: Fingerprints,
        created_at: Instant,
    ) -> Self {
        Self {
            tenant_id,
            composed_text: composed_text.into(),
            fingerprints,
            created_at,
            built_at: Utc::now(),
        }
    }

    /// Age at `now`. A clock reading before creation counts as zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Outcome of checking a tenant's entry against its current content.
#[derive(Debug, Clone)]
pub enum Resolution {
    Cached(Arc<CacheEntry>),
    Stale(StaleReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Missing,
    Expired,
    DocumentsChanged,
    SiteContentChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaleReason::Missing => "missing",
            StaleReason::Expired => "expired",
            StaleReason::DocumentsChanged => "documents changed",
            StaleReason::SiteContentChanged => "site content changed",
        };
        f.write_str(s)
    }
}

/// Result of one janitor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub evicted: usize,
    /// Entries whose age could not be computed.
    pub skipped: usize,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

/// One row of the admin listing.
#[derive(Debug, Clone)]
pub struct CacheEntrySummary {
    pub tenant_id: IntegrationId,
    pub documents_fingerprint: Fingerprint,
    pub site_content_fingerprint: Fingerprint,
    pub chars: usize,
    pub age: Duration,
    pub built_at: DateTime<Utc>,
}

/// Per-tenant store of composed knowledge bases.
///
/// Reads share a read lock; `put`, `invalidate`, `clear` and `sweep` take the
/// write lock. Entries are immutable `Arc` snapshots, so a poisoned lock
/// still guards a consistent map and is recovered instead of propagated.
pub struct CacheStore {
    entries: RwLock<HashMap<IntegrationId, Arc<CacheEntry>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<IntegrationId, Arc<CacheEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<IntegrationId, Arc<CacheEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, tenant_id: IntegrationId) -> Option<Arc<CacheEntry>> {
        self.read().get(&tenant_id).cloned()
    }

    /// Store an entry under its own tenant id, replacing any previous one.
    pub fn put(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        self.write().insert(entry.tenant_id, entry.clone());
        entry
    }

    /// Drop a tenant's entry. Returns whether one existed.
    pub fn invalidate(&self, tenant_id: IntegrationId) -> bool {
        let removed = self.write().remove(&tenant_id).is_some();
        if removed {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.write();
        let n = entries.len() as u64;
        entries.clear();
        self.invalidations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Decide whether the tenant's entry can be served for the given
    /// fingerprints at `now`. Valid iff the tenant matches, both
    /// fingerprints match and the entry is younger than the TTL.
    pub fn resolve(
        &self,
        tenant_id: IntegrationId,
        fingerprints: &Fingerprints,
        now: Instant,
    ) -> Resolution {
        let resolution = match self.get(tenant_id) {
            None => Resolution::Stale(StaleReason::Missing),
            Some(entry) if entry.tenant_id != tenant_id => {
                Resolution::Stale(StaleReason::Missing)
            }
            Some(entry) if entry.age(now) >= self.ttl => Resolution::Stale(StaleReason::Expired),
            Some(entry) if entry.fingerprints.documents != fingerprints.documents => {
                Resolution::Stale(StaleReason::DocumentsChanged)
            }
            Some(entry) if entry.fingerprints.site_content != fingerprints.site_content => {
                Resolution::Stale(StaleReason::SiteContentChanged)
            }
            Some(entry) => Resolution::Cached(entry),
        };

        match resolution {
            Resolution::Cached(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            Resolution::Stale(_) => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        resolution
    }

    /// Evict every entry whose age has reached the TTL. Entries whose age
    /// cannot be computed are logged and left for the next pass.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let mut entries = self.write();
        self.sweep_locked(&mut entries, now)
    }

    /// Sweep against `clock`, read only once the write lock is held so no
    /// entry put during the sweep can be newer than the sweep time.
    pub fn sweep_at(&self, clock: &dyn Clock) -> SweepReport {
        let mut entries = self.write();
        let now = clock.now();
        self.sweep_locked(&mut entries, now)
    }

    fn sweep_locked(
        &self,
        entries: &mut HashMap<IntegrationId, Arc<CacheEntry>>,
        now: Instant,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        entries.retain(|tenant_id, entry| {
            report.examined += 1;
            match now.checked_duration_since(entry.created_at) {
                Some(age) if age >= self.ttl => {
                    report.evicted += 1;
                    false
                }
                Some(_) => true,
                None => {
                    log::debug!(
                        "Cache sweep: skipping tenant {}: entry created after sweep time",
                        tenant_id
                    );
                    report.skipped += 1;
                    true
                }
            }
        });

        self.evictions
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
        report
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Summaries of all live entries, ordered by tenant id.
    pub fn entries(&self, now: Instant) -> Vec<CacheEntrySummary> {
        let mut out: Vec<CacheEntrySummary> = self
            .read()
            .values()
            .map(|e| CacheEntrySummary {
                tenant_id: e.tenant_id,
                documents_fingerprint: e.fingerprints.documents.clone(),
                site_content_fingerprint: e.fingerprints.site_content.clone(),
                chars: e.composed_text.chars().count(),
                age: e.age(now),
                built_at: e.built_at,
            })
            .collect();
        out.sort_by_key(|s| s.tenant_id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fingerprint::fingerprint;
    use crate::types::{Document, SiteContentItem};

    const TTL: Duration = Duration::from_secs(300);

    fn fps(doc: &str, site: &str) -> Fingerprints {
        Fingerprints {
            documents: fingerprint(&[Document::new("d", doc)]),
            site_content: fingerprint(&[SiteContentItem::new("s", "https://a.test", site)]),
        }
    }

    #[test]
    fn test_put_get_invalidate() {
        let store = CacheStore::new(TTL);
        let now = Instant::now();
        assert!(store.get(7).is_none());

        store.put(CacheEntry::new(7, "kb", fps("a", "b"), now));
        assert_eq!(&*store.get(7).unwrap().composed_text, "kb");
        assert_eq!(store.len(), 1);

        assert!(store.invalidate(7));
        assert!(!store.invalidate(7));
        assert!(store.get(7).is_none());
        assert_eq!(store.stats().invalidations, 1);
    }

    #[test]
    fn test_put_replaces_whole_entry() {
        let store = CacheStore::new(TTL);
        let now = Instant::now();
        let first = store.put(CacheEntry::new(7, "old", fps("a", "b"), now));
        store.put(CacheEntry::new(7, "new", fps("c", "b"), now));

        assert_eq!(store.len(), 1);
        assert_eq!(&*store.get(7).unwrap().composed_text, "new");
        // Earlier snapshot is untouched.
        assert_eq!(&*first.composed_text, "old");
    }

    #[test]
    fn test_clear() {
        let store = CacheStore::new(TTL);
        let now = Instant::now();
        for id in 1..=3 {
            store.put(CacheEntry::new(id, "kb", fps("a", "b"), now));
        }
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().invalidations, 3);
    }

    #[test]
    fn test_resolve_reasons() {
        let store = CacheStore::new(TTL);
        let now = Instant::now();
        let current = fps("a", "b");

        assert!(matches!(
            store.resolve(7, &current, now),
            Resolution::Stale(StaleReason::Missing)
        ));

        store.put(CacheEntry::new(7, "kb", current.clone(), now));
        assert!(matches!(store.resolve(7, &current, now), Resolution::Cached(_)));
        assert!(matches!(
            store.resolve(7, &fps("changed", "b"), now),
            Resolution::Stale(StaleReason::DocumentsChanged)
        ));
        assert!(matches!(
            store.resolve(7, &fps("a", "changed"), now),
            Resolution::Stale(StaleReason::SiteContentChanged)
        ));
        assert!(matches!(
            store.resolve(7, &current, now + TTL),
            Resolution::Stale(StaleReason::Expired)
        ));
        assert!(matches!(
            store.resolve(8, &current, now),
            Resolution::Stale(StaleReason::Missing)
        ));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 5);
    }

    #[test]
    fn test_sweep_evicts_only_expired() {
        let store = CacheStore::new(TTL);
        let t0 = Instant::now();
        store.put(CacheEntry::new(1, "old", fps("a", "b"), t0));
        store.put(CacheEntry::new(2, "young", fps("a", "b"), t0 + Duration::from_secs(200)));

        let report = store.sweep(t0 + Duration::from_secs(301));
        assert_eq!(report.examined, 2);
        assert_eq!(report.evicted, 1);
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_sweep_skips_entries_from_the_future() {
        let store = CacheStore::new(TTL);
        let t0 = Instant::now();
        store.put(CacheEntry::new(1, "future", fps("a", "b"), t0 + Duration::from_secs(60)));
        store.put(CacheEntry::new(2, "old", fps("a", "b"), t0));

        let report = store.sweep(t0 + Duration::from_secs(30));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.evicted, 0);

        // The skip did not stop the rest of the sweep from running.
        let report = store.sweep(t0 + Duration::from_secs(300));
        assert_eq!(report.evicted, 1);
        assert!(store.get(2).is_none());
        assert!(store.get(1).is_some());
    }

    #[test]
    fn test_sweep_at_reads_clock_under_lock() {
        let clock = ManualClock::new();
        let store = CacheStore::new(TTL);
        store.put(CacheEntry::new(1, "old", fps("a", "b"), clock.now()));
        clock.advance(TTL);
        store.put(CacheEntry::new(2, "fresh", fps("a", "b"), clock.now()));

        let report = store.sweep_at(&clock);
        assert_eq!(report.examined, 2);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.skipped, 0);
        assert!(store.get(2).is_some());
    }

    #[test]
    fn test_entries_listing() {
        let store = CacheStore::new(TTL);
        let t0 = Instant::now();
        store.put(CacheEntry::new(9, "héllo", fps("a", "b"), t0));
        store.put(CacheEntry::new(3, "kb", fps("a", "b"), t0));

        let listing = store.entries(t0 + Duration::from_secs(5));
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].tenant_id, 3);
        assert_eq!(listing[1].chars, 5);
        assert_eq!(listing[1].age, Duration::from_secs(5));
    }

    #[test]
    fn test_concurrent_puts_for_same_tenant() {
        let store = Arc::new(CacheStore::new(TTL));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.put(CacheEntry::new(7, format!("kb-{i}"), fps("a", "b"), now));
                        let _ = store.resolve(7, &fps("a", "b"), now);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 1);
        assert!(store.get(7).unwrap().composed_text.starts_with("kb-"));
    }
}
