//! Where an account's index lives: a dedicated core, or a collection in a
//! shared cluster.

use serde_json::Value;

use crate::core::config::{ClusterPolicy, IndexConfig};
use crate::core::types::AccountId;
use crate::index::backend::{BackendRequest, BackendResponse, COLLECTION_ADMIN, CORE_ADMIN};

#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
    Core,
    Collection(ClusterPolicy),
}

impl Topology {
    pub fn from_config(config: &IndexConfig) -> Self {
        if config.cluster_mode { Topology::Collection(config.cluster.clone()) } else { Topology::Core }
    }

    pub fn resource_name(&self, account: &AccountId) -> String {
        account.as_str().to_string()
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Topology::Collection(_))
    }

    /// Writes to a cluster are committed automatically.
    pub fn tracks_commits(&self) -> bool {
        !self.is_cluster()
    }

    /// Unique key of one indexed part of an item; parts are numbered from 1
    /// in the order they were handed to the indexer.
    /// Collections prefix the account to route all of its documents together.
    pub fn document_id(&self, account: &AccountId, item_id: i32, part: usize) -> String {
        match self {
            Topology::Core => format!("{}_{}", item_id, part),
            Topology::Collection(_) => format!("{}!{}_{}", account, item_id, part),
        }
    }

    pub fn create_request(&self, resource: &str) -> BackendRequest {
        match self {
            Topology::Core => BackendRequest::admin(CORE_ADMIN)
                .param("action", "CREATE")
                .param("name", resource)
                .param("configSet", "mailbox")
                .param("dataDir", "data"),
            Topology::Collection(policy) => BackendRequest::admin(COLLECTION_ADMIN)
                .param("action", "CREATE")
                .param("name", resource)
                .param("numShards", policy.num_shards)
                .param("replicationFactor", policy.replication_factor)
                .param("maxShardsPerNode", policy.max_shards_per_node)
                .param("collection.configName", &policy.config_set),
        }
    }

    pub fn delete_request(&self, resource: &str) -> BackendRequest {
        match self {
            Topology::Core => BackendRequest::admin(CORE_ADMIN)
                .param("action", "UNLOAD")
                .param("core", resource)
                .param("deleteIndex", true)
                .param("deleteDataDir", true)
                .param("deleteInstanceDir", true),
            Topology::Collection(_) => BackendRequest::admin(COLLECTION_ADMIN)
                .param("action", "DELETE")
                .param("name", resource),
        }
    }

    pub fn exists_request(&self, resource: &str) -> BackendRequest {
        match self {
            Topology::Core => BackendRequest::admin(CORE_ADMIN).param("action", "STATUS").param("core", resource),
            Topology::Collection(_) => BackendRequest::admin(COLLECTION_ADMIN).param("action", "LIST"),
        }
    }

    pub fn exists_in(&self, resource: &str, response: &BackendResponse) -> bool {
        match self {
            Topology::Core => response
                .pointer(&format!("/status/{}", resource))
                .and_then(Value::as_object)
                .map_or(false, |status| !status.is_empty()),
            Topology::Collection(_) => response
                .pointer("/collections")
                .and_then(Value::as_array)
                .map_or(false, |names| names.iter().any(|n| n.as_str() == Some(resource))),
        }
    }

    /// Status of every core; collection replicas appear as
    /// `<collection>_shardN_replicaM` entries.
    pub fn status_request(&self, resource: &str) -> BackendRequest {
        match self {
            Topology::Core => BackendRequest::admin(CORE_ADMIN).param("action", "STATUS").param("core", resource),
            Topology::Collection(_) => BackendRequest::admin(CORE_ADMIN).param("action", "STATUS"),
        }
    }
}
