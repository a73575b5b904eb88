//! Mailbox collaborator contract used while building and compiling queries.

use crate::core::error::{Error, Result};
use crate::core::types::ItemId;

/// System flags, stored as negative-id tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    FromMe,
    Attached,
    Replied,
    Forwarded,
    Flagged,
    Draft,
    Unread,
    Invite,
}

impl Flag {
    pub fn id(&self) -> i32 {
        match self {
            Flag::FromMe => -1,
            Flag::Attached => -2,
            Flag::Replied => -3,
            Flag::Forwarded => -4,
            Flag::Flagged => -6,
            Flag::Draft => -7,
            Flag::Unread => -10,
            Flag::Invite => -17,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Flag::FromMe => "\\Sent",
            Flag::Attached => "\\Attached",
            Flag::Replied => "\\Answered",
            Flag::Forwarded => "\\Forwarded",
            Flag::Flagged => "\\Flagged",
            Flag::Draft => "\\Draft",
            Flag::Unread => "\\Unread",
            Flag::Invite => "\\Invite",
        }
    }

    pub fn tag(&self) -> Tag {
        Tag { id: self.id(), name: self.name().to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

const MAX_TAG_NAME_LEN: usize = 128;

/// Account-level lookups needed by the query layer.
pub trait MailboxContext {
    fn account_id(&self) -> &str;

    /// Primary address of the account.
    fn account_name(&self) -> &str;

    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }

    fn lookup_tag(&self, name: &str) -> Option<Tag>;

    fn is_valid_tag_name(&self, name: &str) -> bool {
        !name.is_empty()
            && name.chars().count() <= MAX_TAG_NAME_LEN
            && !name.chars().any(|c| c.is_control() || c == ':' || c == '/' || c == '"')
    }

    /// Parses `id` or `account:id`.
    fn parse_item_id(&self, text: &str) -> Result<ItemId> {
        let text = text.trim();
        let (account, id) = match text.rsplit_once(':') {
            Some((account, id)) => (Some(account), id),
            None => (None, text),
        };
        let id: i32 = id
            .parse()
            .map_err(|_| Error::invalid_argument(format!("invalid item id: {}", text)))?;
        Ok(match account {
            Some(account) if account != self.account_id() => ItemId::remote(account, id),
            _ => ItemId::local(id),
        })
    }

    fn supports_infix_search(&self) -> bool {
        false
    }
}

/// Per-compile state derived from the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub account_id: String,
    pub infix_search: bool,
}

impl QueryContext {
    pub fn new(account_id: impl Into<String>) -> Self {
        QueryContext { account_id: account_id.into(), infix_search: false }
    }

    pub fn from_mailbox(mailbox: &dyn MailboxContext) -> Self {
        QueryContext {
            account_id: mailbox.account_id().to_string(),
            infix_search: mailbox.supports_infix_search(),
        }
    }

    pub fn with_infix_search(mut self, enabled: bool) -> Self {
        self.infix_search = enabled;
        self
    }
}

/// Simple mailbox backed by in-memory maps.
#[derive(Debug, Clone, Default)]
pub struct StaticMailbox {
    pub account_id: String,
    pub account_name: String,
    pub aliases: Vec<String>,
    pub tags: Vec<Tag>,
    pub infix_search: bool,
}

impl StaticMailbox {
    pub fn new(account_id: impl Into<String>, account_name: impl Into<String>) -> Self {
        StaticMailbox {
            account_id: account_id.into(),
            account_name: account_name.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_tag(mut self, id: i32, name: impl Into<String>) -> Self {
        self.tags.push(Tag { id, name: name.into() });
        self
    }

    pub fn with_infix_search(mut self, enabled: bool) -> Self {
        self.infix_search = enabled;
        self
    }
}

impl MailboxContext for StaticMailbox {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn aliases(&self) -> Vec<String> {
        self.aliases.clone()
    }

    fn lookup_tag(&self, name: &str) -> Option<Tag> {
        self.tags.iter().find(|t| t.name.eq_ignore_ascii_case(name)).cloned()
    }

    fn supports_infix_search(&self) -> bool {
        self.infix_search
    }
}
