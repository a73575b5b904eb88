//! Generation and file-list queries against the replication endpoint, used
//! by incremental backup. Failures always propagate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::error::{Error, Result};
use crate::core::types::Generation;
use crate::index::backend::{BackendRequest, BackendResponse, SearchBackend, REPLICATION};
use crate::index::classify::to_error;

/// One file of a committed index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFile {
    pub name: String,
    pub size: u64,
    /// Whatever else the backend reports (checksum, lastmodified, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct ReplicationClient {
    backend: Arc<dyn SearchBackend>,
    resource: String,
    timeout: Duration,
}

impl ReplicationClient {
    pub fn new(backend: Arc<dyn SearchBackend>, resource: impl Into<String>, timeout: Duration) -> Self {
        ReplicationClient { backend, resource: resource.into(), timeout }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    fn call(&self, command: &str, generation: Option<Generation>) -> Result<BackendResponse> {
        let mut request = BackendRequest::to_resource(&self.resource, REPLICATION)
            .param("command", command)
            .param("wt", "json")
            .timeout(self.timeout);
        if let Some(generation) = generation {
            request = request.param("generation", generation);
        }
        self.backend
            .execute(&request)
            .map_err(|e| to_error(&e, &format!("replication {} on {}", command, self.resource)))
    }

    pub fn get_latest_generation(&self) -> Result<Generation> {
        let response = self.call("indexversion", None)?;
        let generation = response
            .get_i64("/generation")
            .filter(|g| *g >= 0)
            .ok_or_else(|| Error::backend(format!("no generation in indexversion response for {}", self.resource)))?;
        debug!(target: "mailindex::backup", resource = %self.resource, generation, "latest generation");
        Ok(Generation(generation as u64))
    }

    pub fn fetch_file_list(&self, generation: Generation) -> Result<Vec<IndexFile>> {
        let response = self.call("filelist", Some(generation))?;
        let list = response
            .pointer("/filelist")
            .cloned()
            .ok_or_else(|| Error::backend(format!("no filelist for generation {} of {}", generation, self.resource)))?;
        Ok(serde_json::from_value(list)?)
    }
}

/// Remembers what was last backed up so each run only copies what changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupCursor {
    pub generation: Option<Generation>,
    pub files: HashMap<String, u64>,
}

/// Files to copy for one backup run.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    pub generation: Generation,
    pub files: Vec<IndexFile>,
}

impl BackupCursor {
    pub fn new() -> Self {
        BackupCursor::default()
    }

    /// Fetches the latest snapshot and returns the files that are new or whose
    /// size changed since the previous harvest, then advances the cursor.
    pub fn harvest(&mut self, client: &ReplicationClient) -> Result<Harvest> {
        let generation = client.get_latest_generation()?;
        if let Some(previous) = self.generation {
            if generation < previous {
                return Err(Error::invalid_state(format!(
                    "generation of {} went backwards: {} < {}",
                    client.resource(),
                    generation,
                    previous
                )));
            }
            if generation == previous {
                return Ok(Harvest { generation, files: Vec::new() });
            }
        }

        let listed = client.fetch_file_list(generation)?;
        let changed: Vec<IndexFile> =
            listed.iter().filter(|f| self.files.get(&f.name) != Some(&f.size)).cloned().collect();
        info!(
            target: "mailindex::backup",
            resource = client.resource(),
            generation = generation.value(),
            listed = listed.len(),
            changed = changed.len(),
            "harvested snapshot"
        );
        self.files = listed.into_iter().map(|f| (f.name, f.size)).collect();
        self.generation = Some(generation);
        Ok(Harvest { generation, files: changed })
    }
}
