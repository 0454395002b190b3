//! Vocabulary snapshot and its cache.
//!
//! The vocabulary is a slowly-changing reference dataset. The cache loads it
//! from the catalog on first use and keeps it until it is invalidated or its
//! optional TTL expires. Loading is single-flight: concurrent first callers
//! wait for one catalog query instead of issuing their own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::metrics::SubstitutionMetrics;
use crate::types::VocabularyEntry;

/// Immutable set of known ingredients.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    names: Vec<String>,
    entries: HashMap<String, VocabularyEntry>,
}

impl Vocabulary {
    /// Build a vocabulary from catalog entries.
    ///
    /// Names are lower-cased; the first entry wins on duplicate keys and
    /// entries with blank names are skipped.
    #[must_use]
    pub fn from_entries(entries: Vec<VocabularyEntry>) -> Self {
        let mut names = Vec::with_capacity(entries.len());
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = entry.key();
            if key.is_empty() || map.contains_key(&key) {
                continue;
            }
            names.push(key.clone());
            map.insert(key, entry);
        }
        Self { names, entries: map }
    }

    /// Lower-cased canonical names in catalog order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Metadata for a name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VocabularyEntry> {
        self.entries.get(&name.trim().to_lowercase())
    }

    /// Number of known ingredients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the vocabulary is empty (also the degraded state).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

struct Snapshot {
    vocabulary: Arc<Vocabulary>,
    loaded_at: Instant,
}

/// Lazily-populated vocabulary cache owned by the composition root.
pub struct VocabularyCache {
    store: Arc<dyn CatalogStore>,
    metrics: Arc<SubstitutionMetrics>,
    ttl: Option<Duration>,
    slot: Mutex<Option<Snapshot>>,
}

impl std::fmt::Debug for VocabularyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VocabularyCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl VocabularyCache {
    /// Create a cache over `store`. A `ttl` of `None` keeps snapshots until
    /// [`invalidate`](Self::invalidate) is called.
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>, metrics: Arc<SubstitutionMetrics>, ttl: Option<Duration>) -> Self {
        Self {
            store,
            metrics,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached vocabulary, loading it if needed.
    ///
    /// A failed load yields an empty vocabulary that is not cached, so the
    /// next call tries the store again.
    pub async fn ensure_loaded(&self) -> Arc<Vocabulary> {
        let mut slot = self.slot.lock().await;

        if let Some(snapshot) = slot.as_ref() {
            let fresh = self.ttl.is_none_or(|ttl| snapshot.loaded_at.elapsed() < ttl);
            if fresh {
                return Arc::clone(&snapshot.vocabulary);
            }
            debug!("Vocabulary snapshot expired");
        }

        match self.store.all_ingredients().await {
            Ok(entries) => {
                let vocabulary = Arc::new(Vocabulary::from_entries(entries));
                info!(ingredients = vocabulary.len(), "Vocabulary loaded");
                *slot = Some(Snapshot {
                    vocabulary: Arc::clone(&vocabulary),
                    loaded_at: Instant::now(),
                });
                vocabulary
            }
            Err(e) => {
                self.metrics.record_store_error();
                warn!(error = %e, "Vocabulary load failed, matching nothing until the store recovers");
                Arc::new(Vocabulary::default())
            }
        }
    }

    /// Drop the cached snapshot; the next call reloads from the store.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
        debug!("Vocabulary invalidated");
    }

    /// Whether a snapshot is currently cached.
    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::{PantryError, Result};
    use crate::types::{IngredientRecord, SubstitutionLogEntry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingStore {
        inner: InMemoryCatalog,
        queries: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingStore {
        fn new(names: &[&str]) -> Self {
            Self {
                inner: InMemoryCatalog::with_records(
                    names
                        .iter()
                        .map(|n| IngredientRecord::new(VocabularyEntry::new(*n), vec![]))
                        .collect(),
                    vec![],
                ),
                queries: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl CatalogStore for CountingStore {
        async fn all_ingredients(&self) -> Result<Vec<VocabularyEntry>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(PantryError::Store("connection refused".into()));
            }
            self.inner.all_ingredients().await
        }

        async fn stored_substitutes(&self, name: &str) -> Result<Vec<String>> {
            self.inner.stored_substitutes(name).await
        }

        async fn picked_logs(&self) -> Result<Vec<SubstitutionLogEntry>> {
            self.inner.picked_logs().await
        }
    }

    fn cache(store: Arc<CountingStore>, ttl: Option<Duration>) -> VocabularyCache {
        VocabularyCache::new(store, Arc::new(SubstitutionMetrics::new()), ttl)
    }

    #[test]
    fn from_entries_lowercases_and_dedupes() {
        let vocab = Vocabulary::from_entries(vec![
            VocabularyEntry::new("Butter"),
            VocabularyEntry::new("BUTTER"),
            VocabularyEntry::new(" "),
            VocabularyEntry::new("Oat Milk"),
        ]);
        assert_eq!(vocab.names(), &["butter".to_string(), "oat milk".to_string()]);
        assert_eq!(vocab.get("Oat milk").map(|e| e.canonical_name.as_str()), Some("Oat Milk"));
        assert_eq!(vocab.get("butter").map(|e| e.canonical_name.as_str()), Some("Butter"));
    }

    #[tokio::test]
    async fn second_load_is_a_no_op() {
        let store = Arc::new(CountingStore::new(&["butter", "milk"]));
        let cache = cache(Arc::clone(&store), None);

        let first = cache.ensure_loaded().await;
        let second = cache.ensure_loaded().await;

        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_first_loads_query_once() {
        let store = Arc::new(CountingStore::new(&["butter"]));
        let cache = Arc::new(cache(Arc::clone(&store), None));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded().await.len() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.expect("task"), 1);
        }
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_degrades_and_is_retried() {
        let store = Arc::new(CountingStore::new(&["butter"]));
        store.failing.store(true, Ordering::SeqCst);
        let metrics = Arc::new(SubstitutionMetrics::new());
        let cache = VocabularyCache::new(Arc::clone(&store) as Arc<dyn CatalogStore>, Arc::clone(&metrics), None);

        assert!(cache.ensure_loaded().await.is_empty());
        assert!(!cache.is_loaded().await);
        assert_eq!(metrics.store_errors(), 1);

        store.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.ensure_loaded().await.len(), 1);
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let store = Arc::new(CountingStore::new(&["butter"]));
        let cache = cache(Arc::clone(&store), None);

        cache.ensure_loaded().await;
        cache.invalidate().await;
        assert!(!cache.is_loaded().await);
        cache.ensure_loaded().await;
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_reloads() {
        let store = Arc::new(CountingStore::new(&["butter"]));
        let cache = cache(Arc::clone(&store), Some(Duration::from_secs(60)));

        cache.ensure_loaded().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.ensure_loaded().await;
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.ensure_loaded().await;
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    }
}
