use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId(id.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Item identifier, optionally qualified by the owning account
/// (`<account>:<id>` for items in shared folders).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    pub account: Option<String>,
    pub id: i32,
}

impl ItemId {
    pub fn local(id: i32) -> Self {
        ItemId { account: None, id }
    }

    pub fn remote(account: impl Into<String>, id: i32) -> Self {
        ItemId { account: Some(account.into()), id }
    }

    pub fn is_local_to(&self, account: &str) -> bool {
        self.account.as_deref().map_or(true, |a| a == account)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.account {
            Some(account) => write!(f, "{}:{}", account, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Index checkpoint id, non-decreasing per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        SortField { field: field.into(), order: SortOrder::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortField { field: field.into(), order: SortOrder::Desc }
    }

    /// Backend sort clause, e.g. `l.date desc`.
    pub fn to_clause(&self) -> String {
        match self.order {
            SortOrder::Asc => format!("{} asc", self.field),
            SortOrder::Desc => format!("{} desc", self.field),
        }
    }
}
