//! Write path: adding and deleting item documents.

use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::core::error::Result;
use crate::core::fields;
use crate::index::backend::{BackendRequest, COMMIT_COUNT, UPDATE};
use crate::index::document::{IndexDocument, IndexEntry, IndexItem};
use crate::index::store::IndexStore;

/// Borrowed writer over one account's store. Provisions the index on demand.
pub struct Indexer<'a> {
    store: &'a IndexStore,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a IndexStore) -> Self {
        Indexer { store }
    }

    pub fn add_document(&self, item: IndexItem, documents: Vec<std::sync::Arc<IndexDocument>>) -> Result<()> {
        self.add_documents(&[IndexEntry::new(item, documents)])
    }

    pub fn add_documents(&self, entries: &[IndexEntry]) -> Result<()> {
        let account = self.store.account();
        let topology = self.store.topology();
        let mut docs = Vec::new();
        for entry in entries {
            for (index, document) in entry.documents.iter().enumerate() {
                let doc = document.to_input_document(&entry.item, |item_id| topology.document_id(account, item_id, index + 1));
                trace!(target: "mailindex::indexer", account = %account, item = entry.item.id, part = index + 1, doc = %doc, "indexing document");
                docs.push(doc);
            }
        }
        if docs.is_empty() {
            return Ok(());
        }
        let count = docs.len();
        self.update(Value::Array(docs), "add documents")?;
        debug!(target: "mailindex::indexer", account = %account, count, "added documents");
        Ok(())
    }

    /// Removes every part of the given items.
    pub fn delete_documents(&self, item_ids: &[i32]) -> Result<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = item_ids.iter().map(i32::to_string).collect();
        let query = format!("{}:({})", fields::ITEM_ID, ids.join(" "));
        self.update(json!({"delete": {"query": query}}), "delete documents")?;
        debug!(target: "mailindex::indexer", account = %self.store.account(), count = item_ids.len(), "deleted documents");
        Ok(())
    }

    fn update(&self, body: Value, what: &str) -> Result<()> {
        self.store.ensure_provisioned()?;
        let resource = self.store.handle().location();
        let mut request = BackendRequest::to_resource(resource, UPDATE).body(body);
        if self.store.commits_manually() {
            let increment = BackendRequest::to_resource(resource, COMMIT_COUNT).param("action", "increment");
            self.store.backend().execute(&increment).map_err(|e| self.store.on_backend_failure(&e, what))?;
            request = request.param("commit", true);
        }
        self.store.backend().execute(&request).map_err(|e| self.store.on_backend_failure(&e, what))?;
        Ok(())
    }
}
