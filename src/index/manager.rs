//! Process-wide registry of account stores.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::core::config::IndexConfig;
use crate::core::error::Result;
use crate::core::types::AccountId;
use crate::index::backend::SearchBackend;
use crate::index::store::IndexStore;
use crate::index::topology::Topology;
use crate::reader::searcher_cache::SearcherCache;

/// Owns the backend, the configuration, both searcher caches and exactly one
/// [`IndexStore`] per account. Create one per process (or per test) with
/// [`IndexManager::init`] and tear it down with [`IndexManager::shutdown`].
pub struct IndexManager {
    backend: Arc<dyn SearchBackend>,
    config: Arc<IndexConfig>,
    topology: Topology,
    searchers: Arc<SearcherCache>,
    stores: RwLock<HashMap<AccountId, Arc<IndexStore>>>,
}

impl IndexManager {
    pub fn init(backend: Arc<dyn SearchBackend>, config: IndexConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let searchers = Arc::new(SearcherCache::new(&config)?);
        let topology = Topology::from_config(&config);
        info!(target: "mailindex::manager", cluster = topology.is_cluster(), "index manager initialized");
        Ok(Arc::new(IndexManager {
            backend,
            config: Arc::new(config),
            topology,
            searchers,
            stores: RwLock::new(HashMap::new()),
        }))
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn searchers(&self) -> &SearcherCache {
        &self.searchers
    }

    pub fn get_store(&self, account: &AccountId) -> Option<Arc<IndexStore>> {
        self.stores.read().get(account).cloned()
    }

    /// Returns the account's store, creating it on first use. Does not touch
    /// the backend.
    pub fn store_for(&self, account: &AccountId) -> Arc<IndexStore> {
        if let Some(store) = self.get_store(account) {
            return store;
        }
        let mut stores = self.stores.write();
        let store = stores.entry(account.clone()).or_insert_with(|| {
            Arc::new(IndexStore::new(
                account.clone(),
                self.topology.clone(),
                Arc::clone(&self.backend),
                Arc::clone(&self.config),
                Arc::clone(&self.searchers),
            ))
        });
        Arc::clone(store)
    }

    /// Deletes the account's index and forgets its store.
    pub fn delete_account(&self, account: &AccountId) -> Result<()> {
        self.store_for(account).delete_index()?;
        self.stores.write().remove(account);
        Ok(())
    }

    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.stores.read().keys().cloned().collect();
        accounts.sort();
        accounts
    }

    /// Releases every cached searcher and drops all stores.
    pub fn shutdown(&self) {
        self.searchers.clear();
        let dropped = {
            let mut stores = self.stores.write();
            let n = stores.len();
            stores.clear();
            n
        };
        info!(target: "mailindex::manager", stores = dropped, "index manager shut down");
    }
}
