//! Per-account index lifecycle: provisioning, searching and deletion.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backup::replication::ReplicationClient;
use crate::core::config::IndexConfig;
use crate::core::error::{Error, Result};
use crate::core::fields;
use crate::core::types::{AccountId, SortField};
use crate::index::admin::{self, IndexStats};
use crate::index::backend::{BackendError, BackendRequest, SearchBackend, COMMIT_COUNT};
use crate::index::classify::{classify, to_error, FailureClass};
use crate::index::commit::{CommitWait, CommitWaiter};
use crate::index::handle::{IndexHandle, IndexState};
use crate::index::indexer::Indexer;
use crate::index::topology::Topology;
use crate::query::native::NativeQuery;
use crate::query::operation::{QueryInfo, QueryOperation};
use crate::query::render::{terms_filter, Renderer};
use crate::reader::searcher::{SearchHit, SearchResults, SelectQuery, Searcher};
use crate::reader::searcher_cache::SearcherCache;

const DEFAULT_LIMIT: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 100;

/// Restricts hits to documents whose `field` holds one of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdFilter {
    pub field: String,
    pub values: Vec<String>,
}

impl IdFilter {
    pub fn new(field: impl Into<String>, values: Vec<String>) -> Self {
        IdFilter { field: field.into(), values }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: NativeQuery,
    pub sort: Vec<SortField>,
    /// Stored fields to return; empty means the configured defaults.
    pub fetch_fields: Vec<String>,
    pub filter: Option<IdFilter>,
    pub limit: usize,
    pub page_size: usize,
    /// Records from the compiled operation, returned with the results.
    pub info: Vec<QueryInfo>,
}

impl SearchRequest {
    pub fn new(query: NativeQuery) -> Self {
        SearchRequest {
            query,
            sort: Vec::new(),
            fetch_fields: Vec::new(),
            filter: None,
            limit: DEFAULT_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            info: Vec::new(),
        }
    }

    /// Request for the text part of a compiled operation, if it has one.
    pub fn from_operation(op: &QueryOperation) -> Option<Self> {
        op.text_operation().map(|text| SearchRequest { info: text.info.clone(), ..SearchRequest::new(text.tree.clone()) })
    }

    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_fetch_fields(mut self, fields: Vec<String>) -> Self {
        self.fetch_fields = fields;
        self
    }

    pub fn with_filter(mut self, filter: IdFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

pub struct IndexStore {
    handle: IndexHandle,
    topology: Topology,
    backend: Arc<dyn SearchBackend>,
    config: Arc<IndexConfig>,
    searchers: Arc<SearcherCache>,
    renderer: Renderer,
}

impl IndexStore {
    pub fn new(
        account: AccountId,
        topology: Topology,
        backend: Arc<dyn SearchBackend>,
        config: Arc<IndexConfig>,
        searchers: Arc<SearcherCache>,
    ) -> Self {
        let location = topology.resource_name(&account);
        let renderer = Renderer::new(config.wildcard_max_terms_expanded);
        IndexStore { handle: IndexHandle::new(account, location), topology, backend, config, searchers, renderer }
    }

    pub fn account(&self) -> &AccountId {
        self.handle.account()
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn state(&self) -> IndexState {
        self.handle.state()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub(crate) fn backend(&self) -> &dyn SearchBackend {
        self.backend.as_ref()
    }

    pub fn indexer(&self) -> Indexer<'_> {
        Indexer::new(self)
    }

    fn location(&self) -> &str {
        self.handle.location()
    }

    /// Whether writes must be followed by an explicit commit.
    pub(crate) fn commits_manually(&self) -> bool {
        self.config.manual_commit && self.topology.tracks_commits()
    }

    /// Reacts to a failed backend call and converts it into a crate error.
    /// A missing resource clears the provisioned flag and drops the cached
    /// searcher so the next operation re-checks.
    pub(crate) fn on_backend_failure(&self, err: &BackendError, what: &str) -> Error {
        if classify(err) == FailureClass::NotFound {
            info!(target: "mailindex::store", account = %self.account(), what, "index not found, marking unprovisioned");
            self.handle.mark_unprovisioned();
            self.searchers.invalidate(self.account());
        }
        to_error(err, what)
    }

    /// Cached answer when provisioned, otherwise asks the backend.
    pub fn index_exists(&self) -> bool {
        if self.handle.is_provisioned() {
            return true;
        }
        self.probe_exists()
    }

    fn probe_exists(&self) -> bool {
        match self.backend.execute(&self.topology.exists_request(self.location())) {
            Ok(response) => {
                let exists = self.topology.exists_in(self.location(), &response);
                if exists {
                    self.handle.mark_provisioned();
                }
                exists
            }
            Err(e) => {
                warn!(target: "mailindex::store", account = %self.account(), error = %e, "existence probe failed");
                false
            }
        }
    }

    /// Creates the account's core or collection. An existing one is success.
    pub fn create_index(&self) -> Result<()> {
        match self.backend.execute(&self.topology.create_request(self.location())) {
            Ok(_) => {
                info!(target: "mailindex::store", account = %self.account(), resource = self.location(), "created index");
            }
            Err(e) if classify(&e) == FailureClass::AlreadyExists => {
                debug!(target: "mailindex::store", account = %self.account(), "index already exists");
            }
            Err(e) => return Err(to_error(&e, "create index")),
        }
        if self.topology.is_cluster() {
            self.await_cluster_visibility();
        }
        self.handle.mark_provisioned();
        Ok(())
    }

    /// Cluster metadata propagates asynchronously; give LIST a few chances to
    /// report the new collection. Gives up quietly.
    fn await_cluster_visibility(&self) {
        let interval = self.config.create_poll_interval();
        for attempt in 1..=self.config.create_poll_attempts {
            if self.probe_exists() {
                return;
            }
            debug!(target: "mailindex::store", account = %self.account(), attempt, "collection not yet visible");
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        warn!(target: "mailindex::store", account = %self.account(), "collection still not listed after create");
    }

    pub fn ensure_provisioned(&self) -> Result<()> {
        if self.index_exists() {
            return Ok(());
        }
        self.create_index()
    }

    /// Drops the account's index. A missing index counts as deleted.
    pub fn delete_index(&self) -> Result<()> {
        self.searchers.invalidate(self.account());
        match self.backend.execute(&self.topology.delete_request(self.location())) {
            Ok(_) => {}
            Err(e) if classify(&e) == FailureClass::NotFound => {
                debug!(target: "mailindex::store", account = %self.account(), "index to delete was already gone");
            }
            Err(e) => return Err(to_error(&e, "delete index")),
        }
        self.handle.mark_deleted();
        info!(target: "mailindex::store", account = %self.account(), "deleted index");
        Ok(())
    }

    pub fn open_searcher(&self) -> Result<Arc<Searcher>> {
        self.searchers.get_or_open(self.account(), || {
            Ok(Searcher::open(self.account().clone(), self.location().to_string(), Arc::clone(&self.backend)))
        })
    }

    fn projection(&self, request: &SearchRequest) -> Vec<String> {
        let requested = if request.fetch_fields.is_empty() { &self.config.search_fetch_fields } else { &request.fetch_fields };
        let mut out: Vec<String> = vec![fields::SOLR_ID.to_string(), fields::SCORE.to_string()];
        let sort_fields = request.sort.iter().map(|s| &s.field);
        for field in requested.iter().chain(sort_fields) {
            if !out.contains(field) {
                out.push(field.clone());
            }
        }
        out
    }

    /// Runs a text search. Never fails: backend errors are logged and the
    /// hits gathered before the failure are returned.
    pub fn search(&self, request: &SearchRequest) -> SearchResults {
        if request.limit == 0 || request.query.is_empty_boolean() {
            return SearchResults::empty();
        }
        if request.filter.as_ref().map_or(false, |f| f.values.is_empty()) {
            return SearchResults::empty();
        }
        if !self.index_exists() {
            debug!(target: "mailindex::store", account = %self.account(), "search on missing index");
            return SearchResults::empty();
        }
        let searcher = match self.open_searcher() {
            Ok(searcher) => searcher,
            Err(e) => {
                error!(target: "mailindex::store", account = %self.account(), error = %e, "failed to open searcher");
                return SearchResults::empty();
            }
        };

        let mut select = SelectQuery::new(self.renderer.render_tree(&request.query));
        select.fields = self.projection(request);
        select.sort = request.sort.clone();
        if let Some(filter) = &request.filter {
            select.filters.push(terms_filter(&filter.field, &filter.values));
        }
        debug!(target: "mailindex::store", account = %self.account(), q = %select.query, "search");

        let page_size = request.page_size.max(1);
        let mut results = SearchResults::empty();
        loop {
            select.start = results.hits.len();
            select.rows = page_size.min(request.limit - results.hits.len());
            match searcher.select(&select) {
                Ok(page) => {
                    let fetched = page.hits.len();
                    results.total_hits = page.total_hits;
                    results.hits.extend(page.hits);
                    if fetched < select.rows
                        || results.hits.len() >= request.limit
                        || results.hits.len() as u64 >= results.total_hits
                    {
                        break;
                    }
                }
                Err(e) => {
                    error!(
                        target: "mailindex::store",
                        account = %self.account(),
                        error = %e,
                        returned = results.hits.len(),
                        "search failed, returning partial results"
                    );
                    self.on_backend_failure(&e, "search");
                    break;
                }
            }
        }
        results.info = complete_suggestions(&request.info, &results.hits);
        results
    }

    /// Blocks until outstanding manual commits are visible or `max_wait`
    /// (default: the configured ceiling) elapses. Returns immediately when
    /// writes are committed automatically.
    pub fn wait_for_index_commit(&self, max_wait: Option<Duration>) -> CommitWait {
        if !self.commits_manually() {
            return CommitWait::Committed;
        }
        let waiter = CommitWaiter::new(max_wait.unwrap_or_else(|| self.config.commit_wait()), self.config.commit_poll_increment());
        self.wait_with(&waiter)
    }

    pub fn wait_with(&self, waiter: &CommitWaiter) -> CommitWait {
        let request = BackendRequest::to_resource(self.location(), COMMIT_COUNT).param("action", "get");
        waiter.wait(self.account().as_str(), || match self.backend.execute(&request) {
            Ok(response) => Ok(response.get_i64("/count")),
            Err(e) => Err(self.on_backend_failure(&e, "commit count")),
        })
    }

    pub fn num_docs(&self) -> Result<u64> {
        let searcher = self.open_searcher()?;
        searcher.num_docs().map_err(|e| self.on_backend_failure(&e, "num docs"))
    }

    pub fn doc_freq(&self, field: &str, term: &str) -> Result<u64> {
        let searcher = self.open_searcher()?;
        searcher.doc_freq(field, term).map_err(|e| self.on_backend_failure(&e, "doc freq"))
    }

    /// Opens the searcher and runs a one-hit query so the first user search
    /// does not pay for it.
    pub fn warmup(&self) {
        if !self.index_exists() {
            return;
        }
        let outcome = self.open_searcher().and_then(|searcher| {
            let mut probe = SelectQuery::new("*:*");
            probe.rows = 1;
            searcher.select(&probe).map_err(|e| self.on_backend_failure(&e, "warmup"))
        });
        match outcome {
            Ok(_) => debug!(target: "mailindex::store", account = %self.account(), "warmed up searcher"),
            Err(e) => warn!(target: "mailindex::store", account = %self.account(), error = %e, "warmup failed"),
        }
    }

    pub fn stats(&self) -> IndexStats {
        admin::index_stats(self.backend.as_ref(), &self.topology, self.location())
    }

    /// Advisory; zero when the lookup fails.
    pub fn max_docs(&self) -> u64 {
        self.stats().max_docs
    }

    /// Advisory; zero when the lookup fails.
    pub fn num_deleted_docs(&self) -> u64 {
        self.stats().deleted_docs
    }

    /// Client for the account's replication endpoint, used by backup.
    pub fn replication(&self) -> ReplicationClient {
        ReplicationClient::new(Arc::clone(&self.backend), self.location(), self.config.replication_timeout())
    }

    /// Releases the cached searcher, if any.
    pub fn evict_searcher(&self) -> bool {
        self.searchers.invalidate(self.account())
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("account", self.account())
            .field("topology", &self.topology)
            .field("state", &self.state())
            .finish()
    }
}

/// Completes quick-search prefixes with the first longer word found in the
/// returned fields.
fn complete_suggestions(info: &[QueryInfo], hits: &[SearchHit]) -> Vec<QueryInfo> {
    info.iter()
        .map(|record| match record {
            QueryInfo::Suggestion { prefix, completion: None } => {
                QueryInfo::Suggestion { prefix: prefix.clone(), completion: completion_for(prefix, hits) }
            }
            other => other.clone(),
        })
        .collect()
}

fn completion_for(prefix: &str, hits: &[SearchHit]) -> Option<String> {
    let prefix = prefix.to_lowercase();
    for hit in hits {
        for value in hit.fields.values() {
            let texts: Vec<&str> = match value {
                serde_json::Value::String(s) => vec![s.as_str()],
                serde_json::Value::Array(values) => values.iter().filter_map(serde_json::Value::as_str).collect(),
                _ => continue,
            };
            for word in texts.iter().flat_map(|text| text.split_whitespace()) {
                let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
                if word.len() > prefix.len() && word.starts_with(&prefix) {
                    return Some(word);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ClusterPolicy;
    use crate::index::backend::{CORE_ADMIN, SELECT};
    use crate::index::document::{IndexDocument, IndexItem};
    use crate::index::memory::MemoryBackend;
    use crate::query::native::BooleanClause;
    use chrono::{TimeZone, Utc};

    fn store_with(backend: &Arc<MemoryBackend>, config: IndexConfig) -> IndexStore {
        let config = Arc::new(config);
        let searchers = Arc::new(SearcherCache::new(&config).unwrap());
        let backend: Arc<dyn SearchBackend> = backend.clone();
        IndexStore::new(AccountId::from("acct"), Topology::from_config(&config), backend, config, searchers)
    }

    fn seed(store: &IndexStore, n: i32) {
        let items: Vec<_> = (1..=n)
            .map(|i| {
                let item = IndexItem::new(i, Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap());
                let doc = IndexDocument::new().with_field(fields::FROM, format!("user{}@example.com", i % 2));
                crate::index::document::IndexEntry::new(item, vec![Arc::new(doc)])
            })
            .collect();
        store.indexer().add_documents(&items).unwrap();
    }

    #[test]
    fn creation_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        store.create_index().unwrap();
        store.create_index().unwrap();
        assert!(store.index_exists());
        assert_eq!(backend.request_count(CORE_ADMIN), 2);
    }

    #[test]
    fn cluster_create_polls_until_listed() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_list_lag(2);
        let config = IndexConfig {
            cluster_mode: true,
            cluster: ClusterPolicy { num_shards: 2, ..ClusterPolicy::default() },
            create_poll_interval_ms: 0,
            ..IndexConfig::default()
        };
        let store = store_with(&backend, config);
        store.create_index().unwrap();
        assert_eq!(store.state(), IndexState::Provisioned);
        // create, then LIST until visible on the third try
        assert_eq!(backend.request_count(crate::index::backend::COLLECTION_ADMIN), 4);
    }

    #[test]
    fn missing_resource_on_search_clears_provisioned() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        seed(&store, 2);
        assert!(store.handle().is_provisioned());

        backend.drop_resource("acct");
        let results = store.search(&SearchRequest::new(NativeQuery::MatchAll));
        assert!(results.is_empty());
        assert_eq!(store.state(), IndexState::Unprovisioned);
        assert!(!store.index_exists());
        assert_eq!(backend.release_count("acct"), 1);
    }

    #[test]
    fn paging_returns_partial_hits_on_failure() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        seed(&store, 6);
        backend.inject_failure(SELECT, 1, BackendError::message("connection refused"));

        let request = SearchRequest::new(NativeQuery::MatchAll).with_page_size(2).with_limit(6);
        let results = store.search(&request);
        assert_eq!(results.len(), 2);
        // unavailability does not change provisioning state
        assert!(store.handle().is_provisioned());
    }

    #[test]
    fn search_projects_sorts_and_filters() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        seed(&store, 4);

        let request = SearchRequest::new(NativeQuery::term(fields::FROM, "user1"))
            .with_sort(SortField::desc(fields::SORT_DATE))
            .with_fetch_fields(vec![fields::ITEM_ID.to_string()])
            .with_filter(IdFilter::new(fields::ITEM_ID, vec!["1".into(), "3".into()]));
        let results = store.search(&request);
        let ids: Vec<&str> = results.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["3_1", "1_1"]);
        assert!(results.hits[0].fields.contains_key(fields::ITEM_ID));
        assert!(results.hits[0].fields.contains_key(fields::SORT_DATE));
        assert!(!results.hits[0].fields.contains_key(fields::FROM));

        let select = backend.requests().into_iter().filter(|r| r.handler == SELECT).last().unwrap();
        assert_eq!(select.get_param("fq"), Some("{!terms f=l.mbox_blob_id}1,3"));
    }

    #[test]
    fn empty_queries_short_circuit() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        seed(&store, 1);
        let before = backend.request_count(SELECT);
        assert!(store.search(&SearchRequest::new(NativeQuery::Boolean(Vec::new()))).is_empty());
        let filtered = SearchRequest::new(NativeQuery::MatchAll).with_filter(IdFilter::new(fields::ITEM_ID, Vec::new()));
        assert!(store.search(&filtered).is_empty());
        assert_eq!(backend.request_count(SELECT), before);
    }

    #[test]
    fn negated_search_keeps_other_documents() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        seed(&store, 4);
        let tree = NativeQuery::Boolean(vec![
            BooleanClause::must(NativeQuery::MatchAll),
            BooleanClause::must_not(NativeQuery::term(fields::FROM, "user1")),
        ]);
        assert_eq!(store.search(&SearchRequest::new(tree)).total_hits, 2);
    }

    #[test]
    fn deleting_a_missing_index_succeeds() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        store.delete_index().unwrap();
        assert_eq!(store.state(), IndexState::Deleted);
    }

    #[test]
    fn commit_wait_is_immediate_without_manual_commit() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        assert_eq!(store.wait_for_index_commit(None), CommitWait::Committed);
        assert_eq!(backend.request_count(COMMIT_COUNT), 0);
    }

    #[test]
    fn stats_and_doc_counts() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend, IndexConfig::default());
        seed(&store, 3);
        assert_eq!(store.num_docs().unwrap(), 3);
        assert_eq!(store.doc_freq(fields::FROM, "user1").unwrap(), 2);
        assert_eq!(store.max_docs(), 3);
        assert_eq!(store.num_deleted_docs(), 0);
    }
}
