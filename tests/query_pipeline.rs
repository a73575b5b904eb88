use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mailindex::core::fields;
use mailindex::core::types::SortField;
use mailindex::index::document::{IndexDocument, IndexEntry, IndexItem};
use mailindex::index::memory::MemoryBackend;
use mailindex::query::ast::{self, Conjunction, Modifier, Query};
use mailindex::query::builtin::builtin;
use mailindex::query::context::{QueryContext, StaticMailbox};
use mailindex::query::operation::{QueryInfo, QueryOperation};
use mailindex::{AccountId, IndexConfig, IndexManager, IndexStore, SearchBackend, SearchRequest};

struct Message {
    id: i32,
    subject: &'static str,
    content: &'static str,
    from: &'static str,
    to: &'static str,
    attachment: Option<&'static str>,
}

const MESSAGES: &[Message] = &[
    Message { id: 1, subject: "Budget review", content: "quarterly budget numbers", from: "alice@example.com", to: "team@example.com", attachment: Some("application/pdf") },
    Message { id: 2, subject: "Holiday plans", content: "beach trip", from: "bob@example.com", to: "alice@example.com", attachment: None },
    Message { id: 3, subject: "Budget draft", content: "draft of holiday budget", from: "carol@example.com", to: "team@example.com", attachment: None },
    Message { id: 4, subject: "Lunch", content: "tacos at noon", from: "alice@example.com", to: "bob@example.com", attachment: None },
];

fn setup() -> (Arc<MemoryBackend>, Arc<IndexStore>) {
    let backend = Arc::new(MemoryBackend::new());
    let shared: Arc<dyn SearchBackend> = backend.clone();
    let manager = IndexManager::init(shared, IndexConfig::default()).unwrap();
    let store = manager.store_for(&AccountId::from("acct-1"));

    let entries: Vec<IndexEntry> = MESSAGES
        .iter()
        .map(|m| {
            let date = Utc.with_ymd_and_hms(2024, 3, m.id as u32, 9, 0, 0).unwrap();
            let item = IndexItem::new(m.id, date).with_subject(m.subject).with_sender(m.from);
            let doc = IndexDocument::part("top")
                .with_field(fields::SUBJECT, m.subject)
                .with_field(fields::CONTENT, m.content)
                .with_field(fields::FROM, m.from)
                .with_field(fields::TO, m.to);
            if let Some(attachment) = m.attachment {
                doc.add_field(fields::ATTACHMENTS, attachment);
            }
            IndexEntry::new(item, vec![Arc::new(doc)])
        })
        .collect();
    store.indexer().add_documents(&entries).unwrap();
    (backend, store)
}

fn ctx() -> QueryContext {
    QueryContext::new("acct-1")
}

fn search(store: &IndexStore, clauses: &[Query]) -> Vec<i32> {
    let op = ast::compile(&ctx(), clauses).unwrap();
    let request = SearchRequest::from_operation(&op)
        .expect("text operation")
        .with_sort(SortField::asc(fields::SORT_DATE))
        .with_fetch_fields(vec![fields::ITEM_ID.to_string()]);
    store
        .search(&request)
        .hits
        .iter()
        .map(|hit| hit.field_str(fields::ITEM_ID).unwrap().parse().unwrap())
        .collect()
}

#[test]
fn implicit_and_across_fields() {
    let (_, store) = setup();
    let hits = search(&store, &[Query::content("budget"), Query::text(fields::FROM, "alice")]);
    assert_eq!(hits, vec![1]);
}

#[test]
fn negated_clause_excludes_matches() {
    let (_, store) = setup();
    let hits = search(
        &store,
        &[Query::content("budget"), Query::text(fields::FROM, "carol").with_modifier(Modifier::Minus)],
    );
    assert_eq!(hits, vec![1]);
}

#[test]
fn explicit_or_unions_clauses() {
    let (_, store) = setup();
    let hits = search(
        &store,
        &[
            Query::text(fields::FROM, "carol"),
            Query::conj(Conjunction::Or),
            Query::text(fields::FROM, "bob"),
        ],
    );
    assert_eq!(hits, vec![2, 3]);
}

#[test]
fn phrase_matches_across_combined_fields() {
    let (_, store) = setup();
    assert_eq!(search(&store, &[Query::content("holiday budget")]), vec![3]);
    assert_eq!(search(&store, &[Query::content("budget review")]), vec![1]);
}

#[test]
fn trailing_wildcard_is_a_quick_search_over_the_group() {
    let (backend, store) = setup();
    let op = ast::compile(&ctx(), &[Query::content("holi*")]).unwrap();
    let text = op.text_operation().unwrap();
    assert!(text.quick_search);
    assert!(text.info.contains(&QueryInfo::Suggestion { prefix: "holi".into(), completion: None }));

    assert_eq!(search(&store, &[Query::content("holi*")]), vec![2, 3]);
    let q = backend.requests().into_iter().filter(|r| r.handler == "/select").last().unwrap();
    let q = q.get_param("q").unwrap().to_string();
    assert!(q.starts_with("{!zimbrawildcard fields='subject l.content from_sw to_sw cc_sw filename_sw'"));
    assert!(q.contains("maxExpansions='500'"));
}

#[test]
fn quick_search_results_carry_a_completion() {
    let (_, store) = setup();
    let op = ast::compile(&ctx(), &[Query::content("holi*")]).unwrap();
    let request = SearchRequest::from_operation(&op)
        .unwrap()
        .with_sort(SortField::asc(fields::SORT_DATE))
        .with_fetch_fields(vec![fields::SORT_SUBJECT.to_string()]);
    let results = store.search(&request);
    assert_eq!(results.len(), 2);
    assert!(results.info.contains(&QueryInfo::Suggestion { prefix: "holi".into(), completion: Some("holiday".into()) }));
}

#[test]
fn contact_search_prefix_matches_addresses() {
    let (_, store) = setup();
    assert_eq!(search(&store, &[Query::contact("ali")]), vec![2]);
}

#[test]
fn attachment_lookup_uses_canonical_type() {
    let (_, store) = setup();
    assert_eq!(search(&store, &[Query::attachment("pdf")]), vec![1]);
}

#[test]
fn db_only_queries_do_not_reach_the_backend() {
    let mailbox = StaticMailbox::new("acct-1", "user@example.com");
    let unread = builtin(&mailbox, "unread").unwrap();
    let op = ast::compile(&ctx(), &[unread]).unwrap();
    assert!(matches!(op, QueryOperation::Db(_)));
    assert!(SearchRequest::from_operation(&op).is_none());

    let all = Query::item(&mailbox, "all").unwrap();
    assert_eq!(all.compile(&ctx(), false).unwrap(), QueryOperation::NoResults);
    assert!(builtin(&mailbox, "bogus").is_err());
}

#[test]
fn compiling_twice_is_deterministic() {
    let clauses = [Query::content("budget"), Query::text(fields::FROM, "alice")];
    assert_eq!(ast::compile(&ctx(), &clauses).unwrap(), ast::compile(&ctx(), &clauses).unwrap());
}
