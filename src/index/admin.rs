//! Advisory index statistics read from the backend's status endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::index::backend::{BackendResponse, SearchBackend};
use crate::index::topology::Topology;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub max_docs: u64,
    pub deleted_docs: u64,
}

impl IndexStats {
    fn from_status(status: &Value) -> Self {
        let read = |key: &str| status.pointer(&format!("/index/{}", key)).and_then(Value::as_u64).unwrap_or(0);
        IndexStats { max_docs: read("maxDoc"), deleted_docs: read("deletedDocs") }
    }
}

/// Collects statistics for `resource`. Any failure is logged and reported
/// as zero.
pub fn index_stats(backend: &dyn SearchBackend, topology: &Topology, resource: &str) -> IndexStats {
    match backend.execute(&topology.status_request(resource)) {
        Ok(response) => stats_from_response(topology, resource, &response),
        Err(e) => {
            warn!(target: "mailindex::admin", resource, error = %e, "status lookup failed, reporting zero");
            IndexStats::default()
        }
    }
}

fn stats_from_response(topology: &Topology, resource: &str, response: &BackendResponse) -> IndexStats {
    let Some(status) = response.pointer("/status").and_then(Value::as_object) else {
        warn!(target: "mailindex::admin", resource, "status response without status map");
        return IndexStats::default();
    };
    match topology {
        Topology::Core => status.get(resource).map(IndexStats::from_status).unwrap_or_default(),
        Topology::Collection(_) => {
            // replicas of the collection are reported as <collection>_shardN_replicaM
            let prefix = format!("{}_", resource);
            status
                .iter()
                .filter(|(name, _)| name.starts_with(&prefix))
                .map(|(_, core)| IndexStats::from_status(core))
                .fold(IndexStats::default(), |acc, s| IndexStats {
                    max_docs: acc.max_docs + s.max_docs,
                    deleted_docs: acc.deleted_docs + s.deleted_docs,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ClusterPolicy;
    use crate::index::backend::{BackendError, BackendRequest, BackendResult};
    use serde_json::json;

    struct Fixed(BackendResult<Value>);

    impl SearchBackend for Fixed {
        fn execute(&self, _request: &BackendRequest) -> BackendResult<BackendResponse> {
            self.0.clone().map(BackendResponse)
        }
    }

    #[test]
    fn core_stats_are_keyed_by_resource() {
        let backend = Fixed(Ok(json!({"status": {"acct": {"index": {"maxDoc": 12, "deletedDocs": 2}}}})));
        assert_eq!(
            index_stats(&backend, &Topology::Core, "acct"),
            IndexStats { max_docs: 12, deleted_docs: 2 }
        );
    }

    #[test]
    fn collection_stats_sum_account_replicas() {
        let backend = Fixed(Ok(json!({"status": {
            "acct_shard1_replica_n1": {"index": {"maxDoc": 5, "deletedDocs": 1}},
            "acct_shard2_replica_n2": {"index": {"maxDoc": 7, "deletedDocs": 0}},
            "other_shard1_replica_n1": {"index": {"maxDoc": 100, "deletedDocs": 9}}
        }})));
        let topology = Topology::Collection(ClusterPolicy::default());
        assert_eq!(index_stats(&backend, &topology, "acct"), IndexStats { max_docs: 12, deleted_docs: 1 });
    }

    #[test]
    fn failures_degrade_to_zero() {
        let backend = Fixed(Err(BackendError::message("connection refused")));
        assert_eq!(index_stats(&backend, &Topology::Core, "acct"), IndexStats::default());
        let malformed = Fixed(Ok(json!({"unexpected": true})));
        assert_eq!(index_stats(&malformed, &Topology::Core, "acct"), IndexStats::default());
    }
}
