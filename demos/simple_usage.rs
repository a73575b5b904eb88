//! End-to-end walkthrough against the in-memory backend:
//! - provisioning an account index on first write
//! - compiling a query AST and rendering it for the backend
//! - searching with sort and projection
//! - waiting for manual commits
//! - harvesting files for an incremental backup

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mailindex::backup::replication::BackupCursor;
use mailindex::core::fields;
use mailindex::core::types::SortField;
use mailindex::index::document::{IndexDocument, IndexEntry, IndexItem};
use mailindex::index::memory::MemoryBackend;
use mailindex::query::ast::{self, Query};
use mailindex::query::context::{QueryContext, StaticMailbox};
use mailindex::query::render::Renderer;
use mailindex::{AccountId, IndexConfig, IndexManager, SearchBackend, SearchRequest};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // 1. Registry over an in-memory backend, manual commits on
    let backend: Arc<dyn SearchBackend> = Arc::new(MemoryBackend::new());
    let config = IndexConfig { manual_commit: true, commit_wait_ms: 1_000, commit_poll_increment_ms: 50, ..IndexConfig::default() };
    let manager = IndexManager::init(backend, config)?;
    let account = AccountId::from("8f1c0e52-user");
    let store = manager.store_for(&account);
    println!("store state before first write: {:?}", store.state());

    // 2. Index a few messages; the index is created on demand
    let messages = [
        (1, "Budget review", "quarterly budget numbers", "alice@example.com"),
        (2, "Holiday plans", "beach trip in june", "bob@example.com"),
        (3, "Budget draft", "draft of the holiday budget", "carol@example.com"),
    ];
    let entries: Vec<IndexEntry> = messages
        .iter()
        .map(|&(id, subject, body, from)| {
            let date = Utc.with_ymd_and_hms(2024, 5, id as u32, 8, 30, 0).unwrap();
            let doc = IndexDocument::part("top")
                .with_field(fields::SUBJECT, subject)
                .with_field(fields::CONTENT, body)
                .with_field(fields::FROM, from);
            IndexEntry::new(IndexItem::new(id, date).with_subject(subject).with_sender(from), vec![Arc::new(doc)])
        })
        .collect();
    store.indexer().add_documents(&entries)?;
    println!("✓ indexed {} messages, state {:?}", entries.len(), store.state());
    println!("✓ commit wait: {:?}", store.wait_for_index_commit(None));

    // 3. Compile `budget -from:carol`
    let mailbox = StaticMailbox::new(account.as_str(), "user@example.com");
    let ctx = QueryContext::from_mailbox(&mailbox);
    let clauses = vec![
        Query::content("budget"),
        Query::text(fields::FROM, "carol").with_modifier(ast::Modifier::Minus),
    ];
    for clause in &clauses {
        println!("  clause {} (sanitized {})", clause.dump(), clause.sanitized_dump());
    }
    let op = ast::compile(&ctx, &clauses)?;
    let Some(request) = SearchRequest::from_operation(&op) else {
        println!("query has no text part; nothing to send to the backend");
        return Ok(());
    };
    println!("  rendered: {}", Renderer::new(500).render_tree(&request.query));

    // 4. Search newest first
    let request = request
        .with_sort(SortField::desc(fields::SORT_DATE))
        .with_fetch_fields(vec![fields::ITEM_ID.to_string(), fields::SORT_SUBJECT.to_string()])
        .with_limit(10);
    let results = store.search(&request);
    println!("✓ {} hit(s) of {}", results.len(), results.total_hits);
    for hit in &results.hits {
        println!("  {} subject={:?}", hit.id, hit.field_str(fields::SORT_SUBJECT));
    }

    // 5. Incremental backup
    let client = store.replication();
    let mut cursor = BackupCursor::new();
    let harvest = cursor.harvest(&client)?;
    println!("✓ generation {}: {} file(s) to copy", harvest.generation, harvest.files.len());

    // 6. Advisory stats and teardown
    println!("  max docs {}, deleted {}", store.max_docs(), store.num_deleted_docs());
    manager.shutdown();
    println!("✓ shut down");
    Ok(())
}
