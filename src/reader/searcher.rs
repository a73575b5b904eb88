//! Read handle bound to one account's index.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::core::fields;
use crate::core::types::{AccountId, SortField};
use crate::index::backend::{BackendError, BackendRequest, BackendResult, SearchBackend, SELECT};
use crate::query::escape::{contains_whitespace, escape_special_chars, quote_text};
use crate::query::operation::QueryInfo;

/// One hit mapped out of the backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub fields: Map<String, Value>,
}

impl SearchHit {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s),
            Value::Array(values) => values.first().and_then(Value::as_str),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub total_hits: u64,
    pub hits: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<QueryInfo>,
}

impl SearchResults {
    pub fn empty() -> Self {
        SearchResults::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// A single `/select` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub query: String,
    pub filters: Vec<String>,
    pub sort: Vec<SortField>,
    pub fields: Vec<String>,
    pub start: usize,
    pub rows: usize,
}

impl SelectQuery {
    pub fn new(query: impl Into<String>) -> Self {
        SelectQuery { query: query.into(), filters: Vec::new(), sort: Vec::new(), fields: Vec::new(), start: 0, rows: 10 }
    }

    fn to_request(&self, resource: &str) -> BackendRequest {
        let mut req = BackendRequest::to_resource(resource, SELECT)
            .param("q", &self.query)
            .param("start", self.start)
            .param("rows", self.rows)
            .param("wt", "json");
        if !self.fields.is_empty() {
            req = req.param("fl", self.fields.join(","));
        }
        if !self.sort.is_empty() {
            let sort: Vec<String> = self.sort.iter().map(SortField::to_clause).collect();
            req = req.param("sort", sort.join(", "));
        }
        for filter in &self.filters {
            req = req.param("fq", filter);
        }
        req
    }
}

pub struct Searcher {
    account: AccountId,
    resource: String,
    backend: Arc<dyn SearchBackend>,
    opened_at: Instant,
    released: AtomicBool,
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("account", &self.account)
            .field("resource", &self.resource)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Searcher {
    pub fn open(account: AccountId, resource: String, backend: Arc<dyn SearchBackend>) -> Self {
        debug!(target: "mailindex::searcher", account = %account, "opening searcher");
        Searcher { account, resource, backend, opened_at: Instant::now(), released: AtomicBool::new(false) }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn select(&self, query: &SelectQuery) -> BackendResult<SearchResults> {
        let request = query.to_request(&self.resource);
        trace!(target: "mailindex::searcher", account = %self.account, q = %query.query, "select");
        let response = self.backend.execute(&request)?;

        let total_hits = response.get_i64("/response/numFound").unwrap_or(0).max(0) as u64;
        let docs = response
            .pointer("/response/docs")
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::message("malformed search response: missing docs"))?;
        let hits = docs.iter().filter_map(to_hit).collect();
        Ok(SearchResults { total_hits, hits, info: Vec::new() })
    }

    pub fn num_docs(&self) -> BackendResult<u64> {
        let mut query = SelectQuery::new("*:*");
        query.rows = 0;
        Ok(self.select(&query)?.total_hits)
    }

    /// Number of documents containing `term` in `field`.
    pub fn doc_freq(&self, field: &str, term: &str) -> BackendResult<u64> {
        let escaped = escape_special_chars(term);
        let value = if contains_whitespace(&escaped) { quote_text(&escaped) } else { escaped };
        let mut query = SelectQuery::new(format!("{}:{}", field, value));
        query.rows = 0;
        Ok(self.select(&query)?.total_hits)
    }

    /// Frees backend resources; later calls are no-ops.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            debug!(target: "mailindex::searcher", account = %self.account, "releasing searcher");
            self.backend.release(&self.resource);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

fn to_hit(doc: &Value) -> Option<SearchHit> {
    let mut fields = doc.as_object()?.clone();
    let id = match fields.remove(fields::SOLR_ID)? {
        Value::String(s) => s,
        other => other.to_string(),
    };
    let score = fields.remove(fields::SCORE).and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
    Some(SearchHit { id, score, fields })
}
