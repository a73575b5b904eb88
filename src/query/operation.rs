//! Compiled query operations and the AND/OR algebra used to combine them.

use serde::{Deserialize, Serialize};

use crate::core::types::ItemId;
use crate::query::context::Tag;
use crate::query::native::{Bound, BooleanClause, NativeQuery, Occur};

/// Which folders a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderScope {
    Any,
    Local,
    Remote,
}

/// Sorted metadata columns usable in relative range predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbColumn {
    Sender,
    Subject,
}

/// One predicate for the relational metadata store.
#[derive(Debug, Clone, PartialEq)]
pub enum DbConstraint {
    Tag { tag: Tag, truth: bool },
    /// A tag that is valid but only exists in a shared (remote) folder.
    RemoteTag { name: String, truth: bool },
    ItemIds { ids: Vec<ItemId>, truth: bool },
    ItemRange { lower: ItemId, upper: ItemId, truth: bool },
    Conversation { id: ItemId, truth: bool },
    Folder { scope: FolderScope, truth: bool },
    ConvCount { lower: Option<u32>, upper: Option<u32>, truth: bool },
    Range { column: DbColumn, lower: Bound, upper: Bound, truth: bool },
}

/// Conjunction of metadata predicates. No constraints matches every item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbOperation {
    pub constraints: Vec<DbConstraint>,
}

impl DbOperation {
    pub fn match_all() -> Self {
        DbOperation::default()
    }

    pub fn with(constraint: DbConstraint) -> Self {
        DbOperation { constraints: vec![constraint] }
    }

    pub fn is_match_all(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Diagnostic records attached to a text operation and echoed with its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryInfo {
    WildcardExpansion { field: String, term: String },
    /// Quick-search prefix. `completion` is filled from the hits of the
    /// search that ran it.
    Suggestion { prefix: String, completion: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOperation {
    pub tree: NativeQuery,
    pub info: Vec<QueryInfo>,
    pub quick_search: bool,
}

impl TextOperation {
    /// A single clause. A negated clause is anchored on match-all so the
    /// tree never consists of exclusions only.
    pub fn leaf(query: NativeQuery, truth: bool) -> Self {
        let tree = if truth {
            query
        } else {
            NativeQuery::Boolean(vec![
                BooleanClause::must(NativeQuery::MatchAll),
                BooleanClause::must_not(query),
            ])
        };
        TextOperation { tree, info: Vec::new(), quick_search: false }
    }

    pub fn with_info(mut self, info: QueryInfo) -> Self {
        self.info.push(info);
        self
    }

    pub fn with_quick_search(mut self, quick: bool) -> Self {
        self.quick_search = quick;
        self
    }

    fn intersect(ops: Vec<TextOperation>) -> TextOperation {
        let mut clauses = Vec::new();
        let mut info = Vec::new();
        let mut quick = false;
        for op in ops {
            info.extend(op.info);
            quick |= op.quick_search;
            match op.tree {
                NativeQuery::Boolean(inner) if inner.iter().all(|c| c.occur.is_required()) => {
                    clauses.extend(inner)
                }
                tree => clauses.push(BooleanClause::must(tree)),
            }
        }
        clauses.retain(|c| !(c.occur == Occur::Must && c.query == NativeQuery::MatchAll));
        if !clauses.iter().any(|c| c.occur == Occur::Must) {
            clauses.insert(0, BooleanClause::must(NativeQuery::MatchAll));
        }
        let tree = if clauses.len() == 1 && clauses[0].occur == Occur::Must {
            clauses.remove(0).query
        } else {
            NativeQuery::Boolean(clauses)
        };
        TextOperation { tree, info, quick_search: quick }
    }

    fn union(ops: Vec<TextOperation>) -> TextOperation {
        let mut clauses = Vec::new();
        let mut info = Vec::new();
        let mut quick = false;
        for op in ops {
            info.extend(op.info);
            quick |= op.quick_search;
            match op.tree {
                NativeQuery::Boolean(inner) if inner.iter().all(|c| c.occur == Occur::Should) => {
                    clauses.extend(inner)
                }
                tree => clauses.push(BooleanClause::should(tree)),
            }
        }
        let tree = if clauses.len() == 1 {
            clauses.remove(0).query
        } else {
            NativeQuery::Boolean(clauses)
        };
        TextOperation { tree, info, quick_search: quick }
    }
}

/// Result of compiling a query node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    Db(DbOperation),
    Text(TextOperation),
    /// Matches nothing.
    NoResults,
    /// Analysis produced no terms; ignored when combined.
    NoTerm,
    Intersection(Vec<QueryOperation>),
    Union(Vec<QueryOperation>),
}

impl QueryOperation {
    pub fn and(ops: Vec<QueryOperation>) -> QueryOperation {
        let mut db: Option<DbOperation> = None;
        let mut texts = Vec::new();
        let mut others = Vec::new();

        let mut pending = ops;
        pending.reverse();
        while let Some(op) = pending.pop() {
            match op {
                QueryOperation::NoTerm => {}
                QueryOperation::NoResults => return QueryOperation::NoResults,
                QueryOperation::Db(d) => db.get_or_insert_with(DbOperation::default).constraints.extend(d.constraints),
                QueryOperation::Text(t) => texts.push(t),
                QueryOperation::Intersection(inner) => pending.extend(inner.into_iter().rev()),
                union @ QueryOperation::Union(_) => others.push(union),
            }
        }

        let mut parts = Vec::new();
        if let Some(db) = db {
            // match-all is the identity for AND
            if !db.is_match_all() || (texts.is_empty() && others.is_empty()) {
                parts.push(QueryOperation::Db(db));
            }
        }
        if !texts.is_empty() {
            parts.push(QueryOperation::Text(TextOperation::intersect(texts)));
        }
        parts.extend(others);

        match parts.len() {
            0 => QueryOperation::NoTerm,
            1 => parts.remove(0),
            _ => QueryOperation::Intersection(parts),
        }
    }

    pub fn or(ops: Vec<QueryOperation>) -> QueryOperation {
        let mut dbs = Vec::new();
        let mut texts = Vec::new();
        let mut others = Vec::new();
        let mut saw_no_results = false;

        let mut pending = ops;
        pending.reverse();
        while let Some(op) = pending.pop() {
            match op {
                QueryOperation::NoTerm => {}
                QueryOperation::NoResults => saw_no_results = true,
                QueryOperation::Db(d) if d.is_match_all() => return QueryOperation::Db(d),
                QueryOperation::Db(d) => dbs.push(QueryOperation::Db(d)),
                QueryOperation::Text(t) => texts.push(t),
                QueryOperation::Union(inner) => pending.extend(inner.into_iter().rev()),
                intersection @ QueryOperation::Intersection(_) => others.push(intersection),
            }
        }

        let mut parts = dbs;
        if !texts.is_empty() {
            parts.push(QueryOperation::Text(TextOperation::union(texts)));
        }
        parts.extend(others);

        match parts.len() {
            0 if saw_no_results => QueryOperation::NoResults,
            0 => QueryOperation::NoTerm,
            1 => parts.remove(0),
            _ => QueryOperation::Union(parts),
        }
    }

    pub fn has_text(&self) -> bool {
        match self {
            QueryOperation::Text(_) => true,
            QueryOperation::Intersection(ops) | QueryOperation::Union(ops) => ops.iter().any(|o| o.has_text()),
            _ => false,
        }
    }

    /// The text part of a plain text operation or of an intersection.
    pub fn text_operation(&self) -> Option<&TextOperation> {
        match self {
            QueryOperation::Text(t) => Some(t),
            QueryOperation::Intersection(ops) => ops.iter().find_map(|o| match o {
                QueryOperation::Text(t) => Some(t),
                _ => None,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(field: &str, value: &str, truth: bool) -> QueryOperation {
        QueryOperation::Text(TextOperation::leaf(NativeQuery::term(field, value), truth))
    }

    #[test]
    fn and_merges_text_into_one_tree() {
        let op = QueryOperation::and(vec![text("from", "a", true), text("to", "b", false)]);
        let QueryOperation::Text(t) = op else { panic!("expected text op") };
        assert_eq!(
            t.tree,
            NativeQuery::Boolean(vec![
                BooleanClause::must(NativeQuery::term("from", "a")),
                BooleanClause::must_not(NativeQuery::term("to", "b")),
            ])
        );
    }

    #[test]
    fn and_of_exclusions_keeps_match_all_anchor() {
        let op = QueryOperation::and(vec![text("from", "a", false), text("to", "b", false)]);
        let QueryOperation::Text(t) = op else { panic!("expected text op") };
        let NativeQuery::Boolean(clauses) = t.tree else { panic!("expected boolean") };
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0], BooleanClause::must(NativeQuery::MatchAll));
    }

    #[test]
    fn or_flattens_into_should_clauses() {
        let op = QueryOperation::or(vec![
            text("from", "a", true),
            QueryOperation::or(vec![text("to", "b", true), text("cc", "c", true)]),
        ]);
        let QueryOperation::Text(t) = op else { panic!("expected text op") };
        let NativeQuery::Boolean(clauses) = t.tree else { panic!("expected boolean") };
        assert_eq!(clauses.len(), 3);
        assert!(clauses.iter().all(|c| c.occur == Occur::Should));
    }

    #[test]
    fn no_results_and_match_all_short_circuit() {
        let tag = DbOperation::with(DbConstraint::Folder { scope: FolderScope::Local, truth: true });
        assert_eq!(
            QueryOperation::and(vec![QueryOperation::Db(tag.clone()), QueryOperation::NoResults]),
            QueryOperation::NoResults
        );
        assert_eq!(
            QueryOperation::or(vec![QueryOperation::Db(tag), QueryOperation::Db(DbOperation::match_all())]),
            QueryOperation::Db(DbOperation::match_all())
        );
    }

    #[test]
    fn no_term_is_ignored() {
        let op = QueryOperation::and(vec![QueryOperation::NoTerm, text("from", "a", true)]);
        assert!(matches!(op, QueryOperation::Text(_)));
        assert_eq!(QueryOperation::or(vec![QueryOperation::NoTerm]), QueryOperation::NoTerm);
    }

    #[test]
    fn mixed_intersection_exposes_text_part() {
        let db = QueryOperation::Db(DbOperation::with(DbConstraint::Folder { scope: FolderScope::Remote, truth: true }));
        let op = QueryOperation::and(vec![db, text("from", "a", true)]);
        assert!(matches!(op, QueryOperation::Intersection(ref parts) if parts.len() == 2));
        assert_eq!(op.text_operation().map(|t| &t.tree), Some(&NativeQuery::term("from", "a")));
    }
}
