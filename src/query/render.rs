//! Serializes optimized trees into the backend's query syntax.

use std::fmt;

use crate::query::escape::escape_local_param;
use crate::query::native::NativeQuery;
use crate::query::optimizer::{optimize, OptimizedQuery};

const DISMAX_PARSER: &str = "edismax";
const WILDCARD_PARSER: &str = "zimbrawildcard";
const PASSTHROUGH_PARSER: &str = "lucene";
const DISMAX_TIE: &str = "0.1";
const DISMAX_MIN_MATCH: &str = "100%";

/// `{!parser k='v' ...}` with parameters kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalParams {
    parser: &'static str,
    params: Vec<(&'static str, String)>,
}

impl LocalParams {
    pub fn new(parser: &'static str) -> Self {
        LocalParams { parser, params: Vec::new() }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }
}

impl fmt::Display for LocalParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{!{}", self.parser)?;
        for (key, value) in &self.params {
            write!(f, " {}='{}'", key, escape_local_param(value))?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    max_wildcard_expansions: u32,
}

impl Renderer {
    pub fn new(max_wildcard_expansions: u32) -> Self {
        Renderer { max_wildcard_expansions }
    }

    /// Optimize then render a text operation's tree.
    pub fn render_tree(&self, tree: &NativeQuery) -> String {
        self.render(&optimize(tree))
    }

    pub fn render(&self, query: &OptimizedQuery) -> String {
        let mut out = String::new();
        self.write(query, &mut out);
        out
    }

    fn write(&self, query: &OptimizedQuery, out: &mut String) {
        match query {
            OptimizedQuery::Term { field, value } => {
                out.push_str(field);
                out.push(':');
                out.push_str(value);
            }
            OptimizedQuery::Combined { group, text } => {
                let weighted = group.weighted_fields();
                let params = LocalParams::new(DISMAX_PARSER)
                    .param("qf", weighted.clone())
                    .param("pf", weighted)
                    .param("mm", DISMAX_MIN_MATCH)
                    .param("tie", DISMAX_TIE)
                    .param("v", text.clone());
                out.push_str(&params.to_string());
            }
            OptimizedQuery::Wildcard { fields, text } => {
                let params = LocalParams::new(WILDCARD_PARSER)
                    .param("fields", fields.join(" "))
                    .param("maxExpansions", self.max_wildcard_expansions.to_string())
                    .param("v", text.clone());
                out.push_str(&params.to_string());
            }
            OptimizedQuery::Passthrough(native) => {
                let params = LocalParams::new(PASSTHROUGH_PARSER).param("q.op", "OR").param("v", native.to_string());
                out.push_str(&params.to_string());
            }
            OptimizedQuery::Boolean(clauses) => {
                out.push('(');
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(clause.occur.sign());
                    self.write(&clause.query, out);
                }
                out.push(')');
            }
        }
    }
}

/// Restricts hits to a set of values of one field: `{!terms f=field}v1,v2`.
pub fn terms_filter(field: &str, values: &[String]) -> String {
    format!("{{!terms f={}}}{}", field, values.join(","))
}
