//! Rewrites a text operation's boolean tree before rendering.
//!
//! Sibling terms on a combined field are merged into one clause whose text
//! carries each term's sign, so the backend sees a single weighted query per
//! group instead of one per word.

use crate::core::fields::{self, CombinedField};
use crate::query::escape::{contains_whitespace, escape_special_chars, is_wildcard, quote_text};
use crate::query::native::{BooleanClause, NativeQuery, Occur};

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizedQuery {
    Term { field: String, value: String },
    /// Signed/quoted terms merged over a combined field group.
    Combined { group: &'static CombinedField, text: String },
    Wildcard { fields: Vec<String>, text: String },
    Boolean(Vec<OptimizedClause>),
    /// Rendered through the native parser as-is.
    Passthrough(NativeQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedClause {
    pub query: OptimizedQuery,
    pub occur: Occur,
}

pub fn optimize(tree: &NativeQuery) -> OptimizedQuery {
    match tree {
        NativeQuery::Term { field, text } => optimize_term(field, text),
        NativeQuery::Boolean(clauses) => optimize_boolean(clauses),
        other => OptimizedQuery::Passthrough(other.clone()),
    }
}

fn optimize_term(field: &str, text: &str) -> OptimizedQuery {
    let escaped = escape_special_chars(text);
    if is_wildcard(&escaped) {
        return wildcard(field, escaped);
    }
    match fields::combined_field(field) {
        Some(group) => OptimizedQuery::Combined { group, text: signed_term(&escaped, Occur::Must) },
        None => OptimizedQuery::Term { field: field.to_string(), value: plain_term(&escaped) },
    }
}

fn wildcard(field: &str, text: String) -> OptimizedQuery {
    let fields = match fields::combined_field(field) {
        Some(group) => group.fields.iter().map(|f| f.to_string()).collect(),
        None => vec![field.to_string()],
    };
    OptimizedQuery::Wildcard { fields, text }
}

fn plain_term(escaped: &str) -> String {
    if contains_whitespace(escaped) { quote_text(escaped) } else { escaped.to_string() }
}

fn signed_term(escaped: &str, occur: Occur) -> String {
    format!("{}{}", occur.sign(), plain_term(escaped))
}

struct MergedGroup {
    group: &'static CombinedField,
    terms: Vec<String>,
    required: bool,
    slot: usize,
}

fn optimize_boolean(clauses: &[BooleanClause]) -> OptimizedQuery {
    let mut out: Vec<Option<OptimizedClause>> = Vec::with_capacity(clauses.len());
    let mut groups: Vec<MergedGroup> = Vec::new();

    for clause in clauses {
        if let NativeQuery::Term { field, text } = &clause.query {
            let escaped = escape_special_chars(text);
            if let (Some(group), false) = (fields::combined_field(field), is_wildcard(&escaped)) {
                let term = signed_term(&escaped, clause.occur);
                match groups.iter_mut().find(|g| g.group.name == group.name) {
                    Some(merged) => {
                        merged.terms.push(term);
                        merged.required |= clause.occur.is_required();
                    }
                    None => {
                        groups.push(MergedGroup {
                            group,
                            terms: vec![term],
                            required: clause.occur.is_required(),
                            slot: out.len(),
                        });
                        out.push(None);
                    }
                }
                continue;
            }
        }
        out.push(Some(OptimizedClause { query: optimize(&clause.query), occur: clause.occur }));
    }

    for merged in groups {
        // a required or excluded term can never become optional once merged
        let occur = if merged.required { Occur::Must } else { Occur::Should };
        out[merged.slot] = Some(OptimizedClause {
            query: OptimizedQuery::Combined { group: merged.group, text: merged.terms.join(" ") },
            occur,
        });
    }

    let mut rewritten: Vec<OptimizedClause> = out.into_iter().flatten().collect();
    if rewritten.len() == 1 {
        let single = &rewritten[0];
        let sign_kept = single.occur != Occur::MustNot || matches!(single.query, OptimizedQuery::Combined { .. });
        if sign_kept {
            return rewritten.remove(0).query;
        }
    }
    OptimizedQuery::Boolean(rewritten)
}
