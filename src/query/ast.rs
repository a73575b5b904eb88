//! Query tree produced by the parser and its lowering into operations.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::{Error, Result};
use crate::core::fields;
use crate::core::types::ItemId;
use crate::query::context::{Flag, MailboxContext, QueryContext, Tag};
use crate::query::escape::is_wildcard;
use crate::query::native::{Bound, BooleanClause, NativeQuery};
use crate::query::operation::{
    DbColumn, DbConstraint, DbOperation, FolderScope, QueryInfo, QueryOperation, TextOperation,
};
use crate::query::tables::LookupTable;

static NUMERIC_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(<=|>=|<|>)?(-?\d+)$").expect("numeric field regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    None,
    Plus,
    Minus,
}

impl Modifier {
    pub fn eval_bool(self, sense: bool) -> bool {
        if self == Modifier::Minus { !sense } else { sense }
    }

    fn prefix(self) -> &'static str {
        match self {
            Modifier::None => "",
            Modifier::Plus => "+",
            Modifier::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemSelector {
    All,
    None,
    List(Vec<ItemId>),
    Range(ItemId, ItemId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagRef {
    Local(Tag),
    /// Valid tag name that only exists in a shared folder.
    Remote(String),
}

/// Address headers selectable by address and "me" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrFields(u8);

impl AddrFields {
    pub const FROM: AddrFields = AddrFields(1);
    pub const TO: AddrFields = AddrFields(2);
    pub const CC: AddrFields = AddrFields(4);

    pub const fn union(self, other: AddrFields) -> AddrFields {
        AddrFields(self.0 | other.0)
    }

    pub fn contains(self, other: AddrFields) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    Text { field: String, text: String },
    Lucene { table: LookupTable, value: String },
    Conj(Conjunction),
    Sub(Vec<Query>),
    Item(ItemSelector),
    Conv(ItemId),
    Domain { field: String, target: String },
    /// Numeric range over a structured field.
    Field { field: String, lower: Bound, upper: Bound },
    Sender { lower: Bound, upper: Bound },
    Subject { lower: Bound, upper: Bound },
    Tag(TagRef),
    Contact(String),
    In(FolderScope),
    ConvCount { lower: Option<u32>, upper: Option<u32> },
}

/// One clause of a parsed query. Only the modifier changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    modifier: Modifier,
    affirmative: bool,
    kind: QueryKind,
}

impl Query {
    fn new(kind: QueryKind) -> Self {
        Query { modifier: Modifier::None, affirmative: true, kind }
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    pub fn is_affirmative(&self) -> bool {
        self.affirmative
    }

    pub fn set_modifier(&mut self, modifier: Modifier) {
        self.modifier = modifier;
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }

    fn with_affirmative(mut self, affirmative: bool) -> Self {
        self.affirmative = affirmative;
        self
    }

    pub fn text(field: impl Into<String>, text: impl Into<String>) -> Self {
        Query::new(QueryKind::Text { field: field.into(), text: text.into() })
    }

    pub fn content(text: impl Into<String>) -> Self {
        Query::text(fields::CONTENT, text)
    }

    /// Table lookup; tokens mapping to several values become an OR of leaves.
    pub fn lucene(table: LookupTable, token: &str) -> Self {
        let leaves = table
            .canonical(token)
            .into_iter()
            .map(|value| Query::new(QueryKind::Lucene { table, value }))
            .collect();
        Query::or_joined(leaves)
    }

    pub fn attachment(token: &str) -> Self {
        Query::lucene(LookupTable::Attachment, token)
    }

    pub fn mime_type(token: &str) -> Self {
        Query::lucene(LookupTable::Type, token)
    }

    pub fn has(token: &str) -> Self {
        Query::lucene(LookupTable::Has, token)
    }

    pub fn conj(conjunction: Conjunction) -> Self {
        Query::new(QueryKind::Conj(conjunction))
    }

    pub fn sub(clauses: Vec<Query>) -> Self {
        Query::new(QueryKind::Sub(clauses))
    }

    pub fn item(mailbox: &dyn MailboxContext, target: &str) -> Result<Self> {
        let target = target.trim();
        let selector = if target.eq_ignore_ascii_case("all") {
            ItemSelector::All
        } else if target.eq_ignore_ascii_case("none") {
            ItemSelector::None
        } else if let Some((lower, upper)) = target.split_once("--") {
            ItemSelector::Range(mailbox.parse_item_id(lower)?, mailbox.parse_item_id(upper)?)
        } else {
            let ids = target
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| mailbox.parse_item_id(s))
                .collect::<Result<Vec<_>>>()?;
            if ids.is_empty() { ItemSelector::None } else { ItemSelector::List(ids) }
        };
        Ok(Query::new(QueryKind::Item(selector)))
    }

    pub fn item_ids(ids: Vec<ItemId>) -> Self {
        if ids.is_empty() {
            Query::new(QueryKind::Item(ItemSelector::None))
        } else {
            Query::new(QueryKind::Item(ItemSelector::List(ids)))
        }
    }

    /// Negative ids name virtual conversations and search for the item instead.
    pub fn conv(mailbox: &dyn MailboxContext, target: &str) -> Result<Self> {
        let id = mailbox.parse_item_id(target)?;
        if id.id < 0 {
            let item = id
                .id
                .checked_neg()
                .ok_or_else(|| Error::invalid_argument(format!("invalid conversation id: {}", target)))?;
            return Ok(Query::item_ids(vec![ItemId { account: id.account, id: item }]));
        }
        Ok(Query::new(QueryKind::Conv(id)))
    }

    pub fn domain(field: impl Into<String>, target: &str) -> Self {
        let target = target.trim().to_lowercase();
        let target = if target.starts_with(fields::DOMAIN_PREFIX) {
            target
        } else {
            format!("{}{}", fields::DOMAIN_PREFIX, target)
        };
        Query::new(QueryKind::Domain { field: field.into(), target })
    }

    /// Structured `name:value`; numeric values with an optional comparison
    /// become a range, anything else a text match on the structured field.
    pub fn field(name: &str, value: &str) -> Self {
        let name = name.to_lowercase();
        if let Some(caps) = NUMERIC_VALUE.captures(value.trim()) {
            if let Ok(number) = caps[2].parse::<i64>() {
                let number = number.to_string();
                let (lower, upper) = match caps.get(1).map(|m| m.as_str()) {
                    Some("<") => (Bound::open(), Bound::exclusive(number)),
                    Some("<=") => (Bound::open(), Bound::inclusive(number)),
                    Some(">") => (Bound::exclusive(number), Bound::open()),
                    Some(">=") => (Bound::inclusive(number), Bound::open()),
                    _ => (Bound::inclusive(number.clone()), Bound::inclusive(number)),
                };
                return Query::new(QueryKind::Field {
                    field: format!("{}{}", fields::NUMERIC_FIELD_PREFIX, name),
                    lower,
                    upper,
                });
            }
        }
        Query::text(fields::FIELD, format!("{}:{}", name, value))
    }

    pub fn sender(text: &str) -> Result<Self> {
        match parse_relative(text, "sender")? {
            Some((lower, upper)) => Ok(Query::new(QueryKind::Sender { lower, upper })),
            None => Ok(Query::text(fields::FROM, text)),
        }
    }

    pub fn subject(text: &str) -> Result<Self> {
        match parse_relative(text, "subject")? {
            Some((lower, upper)) => Ok(Query::new(QueryKind::Subject { lower, upper })),
            None => Ok(Query::text(fields::SUBJECT, text)),
        }
    }

    pub fn tag(mailbox: &dyn MailboxContext, name: &str) -> Result<Self> {
        if let Some(tag) = mailbox.lookup_tag(name) {
            return Ok(Query::new(QueryKind::Tag(TagRef::Local(tag))));
        }
        if mailbox.is_valid_tag_name(name) {
            return Ok(Query::new(QueryKind::Tag(TagRef::Remote(name.to_string()))));
        }
        Err(Error::invalid_argument(format!("invalid tag name: {}", name)))
    }

    pub fn flag(flag: Flag, affirmative: bool) -> Self {
        Query::new(QueryKind::Tag(TagRef::Local(flag.tag()))).with_affirmative(affirmative)
    }

    pub fn contact(text: impl Into<String>) -> Self {
        Query::new(QueryKind::Contact(text.into()))
    }

    pub fn in_folders(scope: FolderScope) -> Self {
        Query::new(QueryKind::In(scope))
    }

    pub fn conv_count(lower: Option<u32>, upper: Option<u32>) -> Self {
        Query::new(QueryKind::ConvCount { lower, upper })
    }

    /// `tofrom:`, `tocc:` and friends: the same text over several headers.
    pub fn addr(selected: AddrFields, text: &str) -> Self {
        let leaves = header_fields(selected)
            .into_iter()
            .map(|field| Query::text(field, text))
            .collect();
        Query::or_joined(leaves)
    }

    /// Messages from or to the account owner, including aliases.
    pub fn me(mailbox: &dyn MailboxContext, selected: AddrFields) -> Self {
        let mut addresses = vec![mailbox.account_name().to_string()];
        addresses.extend(mailbox.aliases());

        let mut leaves = Vec::new();
        if selected.contains(AddrFields::FROM) {
            leaves.push(Query::flag(Flag::FromMe, true));
        }
        for field in header_fields(selected) {
            if field == fields::FROM {
                continue;
            }
            leaves.extend(addresses.iter().map(|addr| Query::text(field, addr.as_str())));
        }
        Query::or_joined(leaves)
    }

    fn or_joined(mut leaves: Vec<Query>) -> Self {
        if leaves.len() == 1 {
            return leaves.remove(0);
        }
        let mut clauses = Vec::with_capacity(leaves.len() * 2);
        for (i, leaf) in leaves.into_iter().enumerate() {
            if i > 0 {
                clauses.push(Query::conj(Conjunction::Or));
            }
            clauses.push(leaf);
        }
        Query::sub(clauses)
    }

    pub fn has_text_operation(&self) -> bool {
        match &self.kind {
            QueryKind::Text { .. }
            | QueryKind::Lucene { .. }
            | QueryKind::Domain { .. }
            | QueryKind::Field { .. }
            | QueryKind::Contact(_) => true,
            QueryKind::Sub(clauses) => clauses.iter().any(Query::has_text_operation),
            _ => false,
        }
    }

    pub fn compile(&self, ctx: &QueryContext, sense: bool) -> Result<QueryOperation> {
        let truth = self.modifier.eval_bool(sense) == self.affirmative;
        match &self.kind {
            QueryKind::Conj(_) => Err(Error::invalid_state("conjunction compiled outside of a clause list")),
            QueryKind::Sub(clauses) => compile_clause_list(ctx, clauses, truth),
            _ => self.compile_leaf(ctx, truth),
        }
    }

    fn compile_leaf(&self, ctx: &QueryContext, truth: bool) -> Result<QueryOperation> {
        let op = match &self.kind {
            QueryKind::Text { field, text } => compile_text(field, text, truth),
            QueryKind::Lucene { table, value } => {
                QueryOperation::Text(TextOperation::leaf(NativeQuery::term(table.field(), value.as_str()), truth))
            }
            QueryKind::Item(selector) => match (selector, truth) {
                (ItemSelector::All, true) | (ItemSelector::None, false) => QueryOperation::Db(DbOperation::match_all()),
                (ItemSelector::All, false) | (ItemSelector::None, true) => QueryOperation::NoResults,
                (ItemSelector::List(ids), _) => {
                    QueryOperation::Db(DbOperation::with(DbConstraint::ItemIds { ids: ids.clone(), truth }))
                }
                (ItemSelector::Range(lower, upper), _) => QueryOperation::Db(DbOperation::with(DbConstraint::ItemRange {
                    lower: lower.clone(),
                    upper: upper.clone(),
                    truth,
                })),
            },
            QueryKind::Conv(id) => QueryOperation::Db(DbOperation::with(DbConstraint::Conversation { id: id.clone(), truth })),
            QueryKind::Domain { field, target } => {
                QueryOperation::Text(TextOperation::leaf(NativeQuery::term(field.as_str(), target.as_str()), truth))
            }
            QueryKind::Field { field, lower, upper } => QueryOperation::Text(TextOperation::leaf(
                NativeQuery::Range { field: field.clone(), lower: lower.clone(), upper: upper.clone() },
                truth,
            )),
            QueryKind::Sender { lower, upper } => QueryOperation::Db(DbOperation::with(DbConstraint::Range {
                column: DbColumn::Sender,
                lower: lower.clone(),
                upper: upper.clone(),
                truth,
            })),
            QueryKind::Subject { lower, upper } => QueryOperation::Db(DbOperation::with(DbConstraint::Range {
                column: DbColumn::Subject,
                lower: lower.clone(),
                upper: upper.clone(),
                truth,
            })),
            QueryKind::Tag(TagRef::Local(tag)) => {
                QueryOperation::Db(DbOperation::with(DbConstraint::Tag { tag: tag.clone(), truth }))
            }
            QueryKind::Tag(TagRef::Remote(name)) => {
                QueryOperation::Db(DbOperation::with(DbConstraint::RemoteTag { name: name.clone(), truth }))
            }
            QueryKind::Contact(text) => compile_contact(ctx, text, truth),
            QueryKind::In(scope) => QueryOperation::Db(DbOperation::with(DbConstraint::Folder { scope: *scope, truth })),
            QueryKind::ConvCount { lower, upper } => QueryOperation::Db(DbOperation::with(DbConstraint::ConvCount {
                lower: *lower,
                upper: *upper,
                truth,
            })),
            QueryKind::Conj(_) | QueryKind::Sub(_) => {
                return Err(Error::invalid_state("composite node compiled as a leaf"));
            }
        };
        Ok(op)
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(&mut out, false);
        out
    }

    /// Like `dump` with user text and ids replaced by placeholders.
    pub fn sanitized_dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(&mut out, true);
        out
    }

    fn write_dump(&self, out: &mut String, sanitize: bool) {
        match &self.kind {
            QueryKind::Conj(Conjunction::And) => out.push_str(" && "),
            QueryKind::Conj(Conjunction::Or) => out.push_str(" || "),
            QueryKind::Sub(clauses) => {
                out.push_str(self.modifier.prefix());
                out.push('(');
                for clause in clauses {
                    clause.write_dump(out, sanitize);
                }
                out.push(')');
            }
            _ => {
                out.push_str(self.modifier.prefix());
                out.push_str("Q(");
                if !self.affirmative {
                    out.push_str("NOT ");
                }
                out.push_str(&self.leaf_body(sanitize));
                out.push(')');
            }
        }
    }

    fn leaf_body(&self, sanitize: bool) -> String {
        let text = |s: &str| {
            if !sanitize {
                s.to_string()
            } else if s.ends_with('*') {
                "$TEXT*".to_string()
            } else {
                "$TEXT".to_string()
            }
        };
        let num = |s: String| if sanitize { "$NUM".to_string() } else { s };

        match &self.kind {
            QueryKind::Text { field, text: value } => format!("{}:{}", field, text(value)),
            QueryKind::Lucene { table, value } => format!("{}:{}", table.field(), text(value)),
            QueryKind::Item(selector) => {
                let ids = match selector {
                    ItemSelector::All => "all".to_string(),
                    ItemSelector::None => "none".to_string(),
                    ItemSelector::List(ids) => ids.iter().map(|id| num(id.to_string())).collect::<Vec<_>>().join(","),
                    ItemSelector::Range(lower, upper) => format!("{}--{}", num(lower.to_string()), num(upper.to_string())),
                };
                format!("ITEMID:{}", ids)
            }
            QueryKind::Conv(id) => format!("CONV:{}", num(id.to_string())),
            QueryKind::Domain { field, target } => format!("{}:{}", field, text(target)),
            QueryKind::Field { field, lower, upper } => {
                format!("{}:{}", field, relative_dump(lower, upper, &|v| num(v.to_string())))
            }
            QueryKind::Sender { lower, upper } => format!("SENDER:{}", relative_dump(lower, upper, &|v| text(v))),
            QueryKind::Subject { lower, upper } => format!("SUBJECT:{}", relative_dump(lower, upper, &|v| text(v))),
            QueryKind::Tag(TagRef::Local(tag)) if tag.id < 0 => format!("TAG:{}", tag.name),
            QueryKind::Tag(TagRef::Local(tag)) => format!("TAG:{}", text(&tag.name)),
            QueryKind::Tag(TagRef::Remote(name)) => format!("RTAG:{}", text(name)),
            QueryKind::Contact(value) => format!("CONTACT:{}", text(value)),
            QueryKind::In(scope) => format!("IN:{}", format!("{:?}", scope).to_uppercase()),
            QueryKind::ConvCount { lower, upper } => {
                let range = match (lower, upper) {
                    (Some(l), Some(u)) if l == u => l.to_string(),
                    (Some(l), Some(u)) => format!("{}-{}", l, u),
                    (Some(l), None) => format!(">={}", l),
                    (None, Some(u)) => format!("<={}", u),
                    (None, None) => "*".to_string(),
                };
                format!("CONV-COUNT:{}", range)
            }
            QueryKind::Conj(_) | QueryKind::Sub(_) => String::new(),
        }
    }
}

/// `<x`, `<=x`, `>x`, `>=x` prefixes select a relative range.
fn parse_relative(text: &str, what: &str) -> Result<Option<(Bound, Bound)>> {
    if text.chars().count() <= 1 || !(text.starts_with('<') || text.starts_with('>')) {
        return Ok(None);
    }
    let less = text.starts_with('<');
    let rest = &text[1..];
    let (inclusive, value) = match rest.strip_prefix('=') {
        Some(value) => (true, value),
        None => (false, rest),
    };
    if value.is_empty() {
        return Err(Error::new(
            crate::core::error::ErrorKind::Parse,
            format!("invalid {} string: {}", what, text),
        ));
    }
    let bound = Bound { value: Some(value.to_lowercase()), inclusive };
    Ok(Some(if less { (Bound::open(), bound) } else { (bound, Bound::open()) }))
}

fn relative_dump(lower: &Bound, upper: &Bound, render: &dyn Fn(&str) -> String) -> String {
    match (&lower.value, &upper.value) {
        (Some(l), Some(u)) if l == u => render(l),
        (Some(l), Some(u)) => format!(
            "{}{} TO {}{}",
            if lower.inclusive { '[' } else { '{' },
            render(l),
            render(u),
            if upper.inclusive { ']' } else { '}' }
        ),
        (Some(l), None) => format!(">{}{}", if lower.inclusive { "=" } else { "" }, render(l)),
        (None, Some(u)) => format!("<{}{}", if upper.inclusive { "=" } else { "" }, render(u)),
        (None, None) => "*".to_string(),
    }
}

fn header_fields(selected: AddrFields) -> Vec<&'static str> {
    let mut out = Vec::new();
    if selected.contains(AddrFields::FROM) {
        out.push(fields::FROM);
    }
    if selected.contains(AddrFields::TO) {
        out.push(fields::TO);
    }
    if selected.contains(AddrFields::CC) {
        out.push(fields::CC);
    }
    out
}

fn compile_text(field: &str, text: &str, truth: bool) -> QueryOperation {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return QueryOperation::NoTerm;
    }
    let term = tokens.join(" ");
    let mut op = TextOperation::leaf(NativeQuery::term(field, term.as_str()), truth);
    if is_wildcard(&term) {
        op = op.with_info(QueryInfo::WildcardExpansion { field: field.to_string(), term: term.clone() });
        let prefix = term.trim_end_matches('*');
        if term.ends_with('*') && !prefix.is_empty() {
            op = op
                .with_quick_search(true)
                .with_info(QueryInfo::Suggestion { prefix: prefix.to_string(), completion: None });
        }
    }
    QueryOperation::Text(op)
}

fn compile_contact(ctx: &QueryContext, text: &str, truth: bool) -> QueryOperation {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|token| {
            if token.ends_with('*') {
                token.to_string()
            } else if ctx.infix_search {
                format!("*{}*", token)
            } else {
                format!("{}*", token)
            }
        })
        .collect();
    if terms.is_empty() {
        return QueryOperation::NoTerm;
    }
    let info: Vec<QueryInfo> = terms
        .iter()
        .map(|t| QueryInfo::WildcardExpansion { field: fields::CONTACT_DATA.to_string(), term: t.clone() })
        .collect();
    let mut leaves: Vec<NativeQuery> = terms.into_iter().map(|t| NativeQuery::term(fields::CONTACT_DATA, t)).collect();
    let tree = if leaves.len() == 1 {
        leaves.remove(0)
    } else {
        NativeQuery::Boolean(leaves.into_iter().map(BooleanClause::must).collect())
    };
    let mut op = TextOperation::leaf(tree, truth);
    op.info = info;
    QueryOperation::Text(op)
}

/// Splits a clause list into OR-separated groups of implicitly AND-ed clauses.
fn conjunction_groups(clauses: &[Query]) -> Result<Vec<Vec<&Query>>> {
    let mut groups: Vec<Vec<&Query>> = vec![Vec::new()];
    let mut expect_operand = true;
    for clause in clauses {
        match clause.kind {
            QueryKind::Conj(conjunction) => {
                if expect_operand {
                    return Err(Error::invalid_argument("conjunction without a left operand"));
                }
                if conjunction == Conjunction::Or {
                    groups.push(Vec::new());
                }
                expect_operand = true;
            }
            _ => {
                if let Some(group) = groups.last_mut() {
                    group.push(clause);
                }
                expect_operand = false;
            }
        }
    }
    if expect_operand {
        return Err(Error::invalid_argument("conjunction without a right operand"));
    }
    Ok(groups)
}

/// AND binds tighter than OR. A negated list is distributed over its
/// clauses so no inverted result set is ever built.
fn compile_clause_list(ctx: &QueryContext, clauses: &[Query], truth: bool) -> Result<QueryOperation> {
    if clauses.is_empty() {
        return Ok(QueryOperation::NoResults);
    }
    let groups = conjunction_groups(clauses)?;
    let mut compiled = Vec::with_capacity(groups.len());
    for group in groups {
        let ops = group
            .into_iter()
            .map(|q| q.compile(ctx, truth))
            .collect::<Result<Vec<_>>>()?;
        compiled.push(if truth { QueryOperation::and(ops) } else { QueryOperation::or(ops) });
    }
    Ok(if truth { QueryOperation::or(compiled) } else { QueryOperation::and(compiled) })
}

/// Compiles a parsed top-level clause list.
pub fn compile(ctx: &QueryContext, clauses: &[Query]) -> Result<QueryOperation> {
    compile_clause_list(ctx, clauses, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::context::StaticMailbox;
    use crate::query::native::Occur;

    fn ctx() -> QueryContext {
        QueryContext::new("acct-1")
    }

    fn mailbox() -> StaticMailbox {
        StaticMailbox::new("acct-1", "user@example.com")
            .with_alias("alias@example.com")
            .with_tag(64, "work")
    }

    #[test]
    fn modifier_applies_at_leaf() {
        assert!(Modifier::None.eval_bool(true));
        assert!(!Modifier::Minus.eval_bool(true));
        assert!(Modifier::Minus.eval_bool(false));

        let q = Query::content("hello").with_modifier(Modifier::Minus);
        let QueryOperation::Text(op) = q.compile(&ctx(), true).unwrap() else { panic!("expected text op") };
        assert_eq!(
            op.tree,
            NativeQuery::Boolean(vec![
                BooleanClause::must(NativeQuery::MatchAll),
                BooleanClause::must_not(NativeQuery::term(fields::CONTENT, "hello")),
            ])
        );
    }

    #[test]
    fn item_all_negated_yields_no_results() {
        let mbox = mailbox();
        let all = Query::item(&mbox, "all").unwrap();
        assert_eq!(all.compile(&ctx(), false).unwrap(), QueryOperation::NoResults);
        assert_eq!(all.compile(&ctx(), true).unwrap(), QueryOperation::Db(DbOperation::match_all()));

        let none = Query::item(&mbox, "none").unwrap();
        assert_eq!(none.compile(&ctx(), true).unwrap(), QueryOperation::NoResults);
        assert_eq!(none.compile(&ctx(), false).unwrap(), QueryOperation::Db(DbOperation::match_all()));
    }

    #[test]
    fn item_lists_and_ranges() {
        let mbox = mailbox();
        let range = Query::item(&mbox, "10--20").unwrap();
        assert_eq!(range.kind(), &QueryKind::Item(ItemSelector::Range(ItemId::local(10), ItemId::local(20))));
        let list = Query::item(&mbox, "1, 2,acct-2:3").unwrap();
        assert_eq!(
            list.kind(),
            &QueryKind::Item(ItemSelector::List(vec![ItemId::local(1), ItemId::local(2), ItemId::remote("acct-2", 3)]))
        );
    }

    #[test]
    fn negative_conversation_redirects_to_item() {
        let mbox = mailbox();
        let q = Query::conv(&mbox, "-42").unwrap();
        assert_eq!(q.kind(), &QueryKind::Item(ItemSelector::List(vec![ItemId::local(42)])));
        let q = Query::conv(&mbox, "42").unwrap();
        assert_eq!(q.kind(), &QueryKind::Conv(ItemId::local(42)));
    }

    #[test]
    fn most_negative_conversation_id_is_rejected() {
        let mbox = mailbox();
        let err = Query::conv(&mbox, &i32::MIN.to_string()).unwrap_err();
        assert!(err.is(crate::core::error::ErrorKind::InvalidArgument));
        let q = Query::conv(&mbox, &(i32::MIN + 1).to_string()).unwrap();
        assert_eq!(q.kind(), &QueryKind::Item(ItemSelector::List(vec![ItemId::local(i32::MAX)])));
    }

    #[test]
    fn conjunction_cannot_compile_directly() {
        let err = Query::conj(Conjunction::Or).compile(&ctx(), true).unwrap_err();
        assert!(err.is(crate::core::error::ErrorKind::InvalidState));
    }

    #[test]
    fn misplaced_conjunctions_are_rejected() {
        let clauses = vec![Query::conj(Conjunction::Or), Query::content("a")];
        assert!(compile(&ctx(), &clauses).is_err());
        let clauses = vec![Query::content("a"), Query::conj(Conjunction::And)];
        assert!(compile(&ctx(), &clauses).is_err());
    }

    #[test]
    fn numeric_field_values_become_ranges() {
        let q = Query::field("Size", ">=10");
        assert_eq!(
            q.kind(),
            &QueryKind::Field { field: "#size".into(), lower: Bound::inclusive("10"), upper: Bound::open() }
        );
        let q = Query::field("size", "7");
        assert!(matches!(q.kind(), QueryKind::Field { lower, upper, .. } if lower == upper));
        let q = Query::field("size", "<99999999999999999999");
        assert_eq!(q.kind(), &QueryKind::Text { field: fields::FIELD.into(), text: "size:<99999999999999999999".into() });
        let q = Query::field("color", "blue");
        assert_eq!(q.kind(), &QueryKind::Text { field: fields::FIELD.into(), text: "color:blue".into() });
    }

    #[test]
    fn relative_sender_and_subject() {
        let q = Query::sender(">=Bob").unwrap();
        assert_eq!(q.kind(), &QueryKind::Sender { lower: Bound::inclusive("bob"), upper: Bound::open() });
        let q = Query::subject("<m").unwrap();
        assert_eq!(q.kind(), &QueryKind::Subject { lower: Bound::open(), upper: Bound::exclusive("m") });
        let q = Query::sender("bob").unwrap();
        assert_eq!(q.kind(), &QueryKind::Text { field: fields::FROM.into(), text: "bob".into() });
        assert!(Query::sender("<=").is_err());
    }

    #[test]
    fn unknown_tag_falls_back_to_remote() {
        let mbox = mailbox();
        let q = Query::tag(&mbox, "work").unwrap();
        assert_eq!(q.kind(), &QueryKind::Tag(TagRef::Local(Tag { id: 64, name: "work".into() })));
        let q = Query::tag(&mbox, "shared-only").unwrap();
        assert_eq!(q.kind(), &QueryKind::Tag(TagRef::Remote("shared-only".into())));
        assert!(Query::tag(&mbox, "bad:name").is_err());
    }

    #[test]
    fn contact_tokens_are_wildcarded() {
        let q = Query::contact("jo sm*");
        let QueryOperation::Text(op) = q.compile(&ctx(), true).unwrap() else { panic!("expected text op") };
        assert_eq!(
            op.tree,
            NativeQuery::Boolean(vec![
                BooleanClause::must(NativeQuery::term(fields::CONTACT_DATA, "jo*")),
                BooleanClause::must(NativeQuery::term(fields::CONTACT_DATA, "sm*")),
            ])
        );
        let infix = ctx().with_infix_search(true);
        let QueryOperation::Text(op) = Query::contact("jo").compile(&infix, true).unwrap() else {
            panic!("expected text op")
        };
        assert_eq!(op.tree, NativeQuery::term(fields::CONTACT_DATA, "*jo*"));
    }

    #[test]
    fn wildcard_text_enables_quick_search() {
        let QueryOperation::Text(op) = Query::content("meet*").compile(&ctx(), true).unwrap() else {
            panic!("expected text op")
        };
        assert!(op.quick_search);
        assert!(op.info.contains(&QueryInfo::Suggestion { prefix: "meet".into(), completion: None }));
        assert_eq!(Query::content("   ").compile(&ctx(), true).unwrap(), QueryOperation::NoTerm);
    }

    #[test]
    fn multi_valued_table_entry_becomes_or_subquery() {
        let q = Query::attachment("word");
        let QueryKind::Sub(clauses) = q.kind() else { panic!("expected sub query") };
        assert_eq!(clauses.len(), 3);
        let QueryOperation::Text(op) = q.compile(&ctx(), true).unwrap() else { panic!("expected text op") };
        let NativeQuery::Boolean(clauses) = op.tree else { panic!("expected boolean") };
        assert!(clauses.iter().all(|c| c.occur == Occur::Should));
        assert_eq!(Query::attachment("pdf").kind(), &QueryKind::Lucene {
            table: LookupTable::Attachment,
            value: "application/pdf".into()
        });
    }

    #[test]
    fn or_subquery_dump_has_one_token_per_leaf() {
        let q = Query::addr(AddrFields::FROM.union(AddrFields::TO).union(AddrFields::CC), "bob");
        assert_eq!(q.dump(), "(Q(from:bob) || Q(to:bob) || Q(cc:bob))");
        assert_eq!(q.sanitized_dump().matches("Q(").count(), 3);
        assert!(!q.sanitized_dump().contains("bob"));
    }

    #[test]
    fn me_query_covers_aliases_and_sent_flag() {
        let mbox = mailbox();
        let q = Query::me(&mbox, AddrFields::TO.union(AddrFields::FROM));
        assert_eq!(q.dump(), "(Q(TAG:\\Sent) || Q(to:user@example.com) || Q(to:alias@example.com))");
    }

    #[test]
    fn negated_sub_query_distributes_over_leaves() {
        let q = Query::sub(vec![
            Query::text(fields::FROM, "a"),
            Query::conj(Conjunction::Or),
            Query::text(fields::TO, "b"),
        ])
        .with_modifier(Modifier::Minus);
        let QueryOperation::Text(op) = q.compile(&ctx(), true).unwrap() else { panic!("expected text op") };
        assert_eq!(
            op.tree,
            NativeQuery::Boolean(vec![
                BooleanClause::must(NativeQuery::MatchAll),
                BooleanClause::must_not(NativeQuery::term(fields::FROM, "a")),
                BooleanClause::must_not(NativeQuery::term(fields::TO, "b")),
            ])
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let clauses = vec![
            Query::text(fields::FROM, "a"),
            Query::text(fields::TO, "b"),
            Query::conj(Conjunction::Or),
            Query::text(fields::CC, "c"),
        ];
        let QueryOperation::Text(op) = compile(&ctx(), &clauses).unwrap() else { panic!("expected text op") };
        assert_eq!(
            op.tree,
            NativeQuery::Boolean(vec![
                BooleanClause::should(NativeQuery::Boolean(vec![
                    BooleanClause::must(NativeQuery::term(fields::FROM, "a")),
                    BooleanClause::must(NativeQuery::term(fields::TO, "b")),
                ])),
                BooleanClause::should(NativeQuery::term(fields::CC, "c")),
            ])
        );
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let mbox = mailbox();
        let clauses = vec![
            Query::content("budget report"),
            Query::tag(&mbox, "work").unwrap(),
            Query::attachment("excel"),
        ];
        assert_eq!(compile(&ctx(), &clauses).unwrap(), compile(&ctx(), &clauses).unwrap());
        assert_eq!(compile(&ctx(), &[]).unwrap(), QueryOperation::NoResults);
    }

    #[test]
    fn text_detection() {
        let mbox = mailbox();
        assert!(Query::content("x").has_text_operation());
        assert!(!Query::tag(&mbox, "work").unwrap().has_text_operation());
        assert!(Query::me(&mbox, AddrFields::TO).has_text_operation());
        assert!(!Query::me(&mbox, AddrFields::FROM).has_text_operation());
    }
}
