use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::core::fields;

/// Shard/replica layout used when creating a collection in the shared cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterPolicy {
    pub num_shards: u32,
    pub replication_factor: u32,
    pub max_shards_per_node: u32,
    pub config_set: String,
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        ClusterPolicy {
            num_shards: 1,
            replication_factor: 1,
            max_shards_per_node: 1,
            config_set: "mailbox".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    // Searcher caches
    pub searcher_cache_size: usize,
    pub searcher_cache_ttl_ms: u64,
    pub resident_cache_size: usize,
    pub resident_accounts: Vec<String>,

    // Query rendering
    pub wildcard_max_terms_expanded: u32,
    pub search_fetch_fields: Vec<String>,

    // Manual-commit deployments
    pub manual_commit: bool,
    pub commit_wait_ms: u64,
    pub commit_poll_increment_ms: u64, // 0 = max(commit_wait / 3, 500ms)

    // Cluster topology
    /// One collection per account in a shared cluster instead of one core each.
    pub cluster_mode: bool,
    pub cluster: ClusterPolicy,
    pub create_poll_attempts: u32,
    pub create_poll_interval_ms: u64,

    // Backup bridge
    pub replication_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            searcher_cache_size: 20,
            searcher_cache_ttl_ms: 5 * 60 * 1000,
            resident_cache_size: 10,
            resident_accounts: Vec::new(),

            wildcard_max_terms_expanded: 500,
            search_fetch_fields: fields::MESSAGE_FETCH_FIELDS.iter().map(|f| f.to_string()).collect(),

            manual_commit: false,
            commit_wait_ms: 10_000,
            commit_poll_increment_ms: 0,

            cluster_mode: false,
            cluster: ClusterPolicy::default(),
            create_poll_attempts: 3,
            create_poll_interval_ms: 1_000,

            replication_timeout_ms: 60_000,
        }
    }
}

impl IndexConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.searcher_cache_size == 0 {
            return Err(Error::invalid_argument("searcher_cache_size must be positive"));
        }
        if self.resident_cache_size == 0 {
            return Err(Error::invalid_argument("resident_cache_size must be positive"));
        }
        if self.cluster.num_shards == 0 || self.cluster.replication_factor == 0 {
            return Err(Error::invalid_argument("cluster policy needs at least one shard and one replica"));
        }
        Ok(())
    }

    pub fn searcher_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.searcher_cache_ttl_ms)
    }

    pub fn commit_wait(&self) -> Duration {
        Duration::from_millis(self.commit_wait_ms)
    }

    pub fn commit_poll_increment(&self) -> Duration {
        if self.commit_poll_increment_ms > 0 {
            Duration::from_millis(self.commit_poll_increment_ms)
        } else {
            Duration::from_millis((self.commit_wait_ms / 3).max(500))
        }
    }

    pub fn create_poll_interval(&self) -> Duration {
        Duration::from_millis(self.create_poll_interval_ms)
    }

    pub fn replication_timeout(&self) -> Duration {
        Duration::from_millis(self.replication_timeout_ms)
    }

    pub fn is_resident(&self, account: &str) -> bool {
        self.resident_accounts.iter().any(|a| a == account)
    }
}
