//! The two pools of open searchers: a TTL-bounded one for ordinary
//! accounts and a capacity-only one for accounts that should stay warm.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::core::config::IndexConfig;
use crate::core::error::Result;
use crate::core::types::AccountId;
use crate::reader::lru_cache::{CacheStats, EvictionCause, LruCache};
use crate::reader::searcher::Searcher;

fn release_on_evict(pool: &'static str) -> Box<dyn Fn(&AccountId, Arc<Searcher>, EvictionCause) + Send + Sync> {
    Box::new(move |account: &AccountId, searcher: Arc<Searcher>, cause: EvictionCause| {
        debug!(target: "mailindex::searcher_cache", pool, account = %account, cause = ?cause, "evicting searcher");
        searcher.release();
    })
}

pub struct SearcherCache {
    ttl_cache: LruCache<AccountId, Arc<Searcher>>,
    resident_cache: LruCache<AccountId, Arc<Searcher>>,
    resident_accounts: HashSet<String>,
}

impl SearcherCache {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let ttl_cache = LruCache::new(config.searcher_cache_size, Some(config.searcher_cache_ttl()))?
            .with_eviction_listener(release_on_evict("ttl"));
        let resident_cache =
            LruCache::new(config.resident_cache_size, None)?.with_eviction_listener(release_on_evict("resident"));
        Ok(SearcherCache {
            ttl_cache,
            resident_cache,
            resident_accounts: config.resident_accounts.iter().cloned().collect(),
        })
    }

    pub fn is_resident(&self, account: &AccountId) -> bool {
        self.resident_accounts.contains(account.as_str())
    }

    fn cache_for(&self, account: &AccountId) -> &LruCache<AccountId, Arc<Searcher>> {
        if self.is_resident(account) { &self.resident_cache } else { &self.ttl_cache }
    }

    pub fn get(&self, account: &AccountId) -> Option<Arc<Searcher>> {
        self.cache_for(account).get(account)
    }

    pub fn get_or_open(&self, account: &AccountId, open: impl FnOnce() -> Result<Searcher>) -> Result<Arc<Searcher>> {
        self.cache_for(account).get_or_try_insert_with(account, || open().map(Arc::new))
    }

    /// Drops and releases the account's searcher, if cached.
    pub fn invalidate(&self, account: &AccountId) -> bool {
        self.cache_for(account).invalidate(account)
    }

    pub fn purge_expired(&self) {
        self.ttl_cache.purge_expired();
    }

    pub fn clear(&self) {
        self.ttl_cache.clear();
        self.resident_cache.clear();
    }

    pub fn len(&self) -> usize {
        self.ttl_cache.len() + self.resident_cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl_stats(&self) -> CacheStats {
        self.ttl_cache.stats()
    }

    pub fn resident_stats(&self) -> CacheStats {
        self.resident_cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::backend::{BackendRequest, BackendResponse, BackendResult, SearchBackend};
    use parking_lot::Mutex;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Releases(Mutex<Vec<String>>);

    impl SearchBackend for Releases {
        fn execute(&self, _request: &BackendRequest) -> BackendResult<BackendResponse> {
            Ok(BackendResponse(serde_json::Value::Null))
        }

        fn release(&self, resource: &str) {
            self.0.lock().push(resource.to_string());
        }
    }

    fn config(ttl_ms: u64) -> IndexConfig {
        IndexConfig {
            searcher_cache_size: 2,
            searcher_cache_ttl_ms: ttl_ms,
            resident_cache_size: 1,
            resident_accounts: vec!["sync-1".into(), "sync-2".into()],
            ..IndexConfig::default()
        }
    }

    fn open(backend: &Arc<Releases>, account: &str) -> impl FnOnce() -> Result<Searcher> {
        let backend: Arc<dyn SearchBackend> = backend.clone();
        let account = account.to_string();
        move || Ok(Searcher::open(AccountId::new(account.clone()), account, backend))
    }

    #[test]
    fn overflow_releases_least_recent_searcher_once() {
        let backend = Arc::new(Releases::default());
        let cache = SearcherCache::new(&config(60_000)).unwrap();
        for name in ["a", "b", "c"] {
            cache.get_or_open(&AccountId::from(name), open(&backend, name)).unwrap();
        }
        assert_eq!(*backend.0.lock(), vec!["a".to_string()]);
        assert!(cache.get(&AccountId::from("a")).is_none());
    }

    #[test]
    fn resident_accounts_ignore_ttl() {
        let backend = Arc::new(Releases::default());
        let cache = SearcherCache::new(&config(40)).unwrap();
        let resident = AccountId::from("sync-1");
        let ordinary = AccountId::from("user");
        cache.get_or_open(&resident, open(&backend, "sync-1")).unwrap();
        cache.get_or_open(&ordinary, open(&backend, "user")).unwrap();

        thread::sleep(Duration::from_millis(80));
        cache.purge_expired();

        assert!(cache.get(&resident).is_some());
        assert!(cache.get(&ordinary).is_none());
        assert_eq!(*backend.0.lock(), vec!["user".to_string()]);

        // capacity pressure still evicts from the resident pool
        cache.get_or_open(&AccountId::from("sync-2"), open(&backend, "sync-2")).unwrap();
        assert_eq!(*backend.0.lock(), vec!["user".to_string(), "sync-1".to_string()]);
    }

    #[test]
    fn cached_searcher_is_reused() {
        let backend = Arc::new(Releases::default());
        let cache = SearcherCache::new(&config(60_000)).unwrap();
        let account = AccountId::from("a");
        let first = cache.get_or_open(&account, open(&backend, "a")).unwrap();
        let second = cache.get_or_open(&account, open(&backend, "a")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.invalidate(&account));
        assert!(first.is_released());
    }
}
