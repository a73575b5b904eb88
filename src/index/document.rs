//! Indexable documents and their conversion to the update wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::fields;

const DEFAULT_PART: &str = "top";

/// Item-level metadata stamped on every document of the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub size: u64,
    pub version: i32,
    pub sort_subject: Option<String>,
    pub sort_name: Option<String>,
}

impl IndexItem {
    pub fn new(id: i32, date: DateTime<Utc>) -> Self {
        IndexItem { id, date, size: 0, version: 1, sort_subject: None, sort_name: None }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.sort_subject = Some(subject.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sort_name = Some(sender.into());
        self
    }
}

/// Field map for one indexed part of an item.
///
/// The same document may be handed to several mailboxes at once (one message
/// delivered to many recipients), so population and freezing happen under
/// the document's own lock.
#[derive(Debug, Default)]
pub struct IndexDocument {
    fields: Mutex<BTreeMap<String, Vec<String>>>,
}

impl IndexDocument {
    pub fn new() -> Self {
        IndexDocument::default()
    }

    pub fn part(part: impl Into<String>) -> Self {
        let doc = IndexDocument::new();
        doc.set_field(fields::PART_NAME, part);
        doc
    }

    pub fn add_field(&self, name: &str, value: impl Into<String>) {
        self.fields.lock().entry(name.to_string()).or_default().push(value.into());
    }

    pub fn set_field(&self, name: &str, value: impl Into<String>) {
        self.fields.lock().insert(name.to_string(), vec![value.into()]);
    }

    pub fn with_field(self, name: &str, value: impl Into<String>) -> Self {
        self.add_field(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Vec<String> {
        self.fields.lock().get(name).cloned().unwrap_or_default()
    }

    /// Stamps item fields and the document key, then freezes the document
    /// into its wire form, all under one hold of the document lock.
    pub fn to_input_document(&self, item: &IndexItem, solr_id: impl FnOnce(i32) -> String) -> Value {
        let mut doc_fields = self.fields.lock();
        set_item_fields(&mut doc_fields, item);
        doc_fields.insert(fields::SOLR_ID.to_string(), vec![solr_id(item.id)]);

        let mut out = Map::new();
        for (name, values) in doc_fields.iter() {
            let value = match values.as_slice() {
                [single] => Value::String(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            out.insert(name.clone(), value);
        }
        Value::Object(out)
    }
}

fn set_item_fields(doc: &mut BTreeMap<String, Vec<String>>, item: &IndexItem) {
    let mut set = |name: &str, value: String| {
        doc.insert(name.to_string(), vec![value]);
    };
    set(fields::ITEM_ID, item.id.to_string());
    set(fields::SORT_DATE, item.date.timestamp_millis().to_string());
    set(fields::SORT_SIZE, item.size.to_string());
    set(fields::VERSION, item.version.to_string());
    if let Some(subject) = &item.sort_subject {
        set(fields::SORT_SUBJECT, subject.to_lowercase());
    }
    if let Some(name) = &item.sort_name {
        set(fields::SORT_NAME, name.to_lowercase());
    }
    doc.entry(fields::PART_NAME.to_string())
        .or_insert_with(|| vec![DEFAULT_PART.to_string()]);
}

/// Documents of one item queued for indexing.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub item: IndexItem,
    pub documents: Vec<std::sync::Arc<IndexDocument>>,
}

impl IndexEntry {
    pub fn new(item: IndexItem, documents: Vec<std::sync::Arc<IndexDocument>>) -> Self {
        IndexEntry { item, documents }
    }
}
