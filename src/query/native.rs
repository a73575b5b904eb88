use std::fmt;

/// How a clause participates in its enclosing boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

impl Occur {
    pub fn sign(&self) -> &'static str {
        match self {
            Occur::Must => "+",
            Occur::MustNot => "-",
            Occur::Should => "",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Occur::Must | Occur::MustNot)
    }
}

/// Bound of a range clause. `None` value means open-ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub value: Option<String>,
    pub inclusive: bool,
}

impl Bound {
    pub fn open() -> Self {
        Bound { value: None, inclusive: true }
    }

    pub fn inclusive(value: impl Into<String>) -> Self {
        Bound { value: Some(value.into()), inclusive: true }
    }

    pub fn exclusive(value: impl Into<String>) -> Self {
        Bound { value: Some(value.into()), inclusive: false }
    }
}

/// Backend-native query tree carried by text operations until rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    Term { field: String, text: String },
    Boolean(Vec<BooleanClause>),
    Range { field: String, lower: Bound, upper: Bound },
    MatchAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanClause {
    pub query: NativeQuery,
    pub occur: Occur,
}

impl BooleanClause {
    pub fn new(query: NativeQuery, occur: Occur) -> Self {
        BooleanClause { query, occur }
    }

    pub fn must(query: NativeQuery) -> Self {
        BooleanClause::new(query, Occur::Must)
    }

    pub fn should(query: NativeQuery) -> Self {
        BooleanClause::new(query, Occur::Should)
    }

    pub fn must_not(query: NativeQuery) -> Self {
        BooleanClause::new(query, Occur::MustNot)
    }
}

impl NativeQuery {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        NativeQuery::Term { field: field.into(), text: text.into() }
    }

    pub fn is_empty_boolean(&self) -> bool {
        matches!(self, NativeQuery::Boolean(clauses) if clauses.is_empty())
    }
}

/// Classic Lucene syntax, used for passthrough rendering.
impl fmt::Display for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NativeQuery::Term { field, text } => write!(f, "{}:{}", field, text),
            NativeQuery::MatchAll => f.write_str("*:*"),
            NativeQuery::Range { field, lower, upper } => {
                write!(
                    f,
                    "{}:{}{} TO {}{}",
                    field,
                    if lower.inclusive { '[' } else { '{' },
                    lower.value.as_deref().unwrap_or("*"),
                    upper.value.as_deref().unwrap_or("*"),
                    if upper.inclusive { ']' } else { '}' },
                )
            }
            NativeQuery::Boolean(clauses) => {
                f.write_str("(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}{}", clause.occur.sign(), clause.query)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lucene_syntax_for_ranges() {
        let q = NativeQuery::Range {
            field: "#size".to_string(),
            lower: Bound::exclusive("10"),
            upper: Bound::open(),
        };
        assert_eq!(q.to_string(), "#size:{10 TO *]");
    }

    #[test]
    fn lucene_syntax_for_booleans() {
        let q = NativeQuery::Boolean(vec![
            BooleanClause::must(NativeQuery::term("from", "bob")),
            BooleanClause::must_not(NativeQuery::term("to", "al*")),
            BooleanClause::should(NativeQuery::MatchAll),
        ]);
        assert_eq!(q.to_string(), "(+from:bob -to:al* *:*)");
    }
}
