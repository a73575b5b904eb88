//! Canned predicates addressed by name (`is:unread`, `is:tome`, ...).

use crate::core::error::{Error, Result};
use crate::query::ast::{AddrFields, Query};
use crate::query::context::{Flag, MailboxContext};
use crate::query::operation::FolderScope;

pub const BUILTIN_NAMES: &[&str] = &[
    "read", "unread", "flagged", "unflagged", "draft", "sent", "received", "replied", "unreplied", "forwarded",
    "unforwarded", "invite", "anywhere", "local", "remote", "solo", "tome", "fromme", "ccme", "tofromme",
    "toccme", "fromccme", "tofromccme",
];

pub fn builtin(mailbox: &dyn MailboxContext, name: &str) -> Result<Query> {
    let query = match name.to_ascii_lowercase().as_str() {
        "read" => Query::flag(Flag::Unread, false),
        "unread" => Query::flag(Flag::Unread, true),
        "flagged" => Query::flag(Flag::Flagged, true),
        "unflagged" => Query::flag(Flag::Flagged, false),
        "draft" => Query::flag(Flag::Draft, true),
        "sent" => Query::flag(Flag::FromMe, true),
        "received" => Query::flag(Flag::FromMe, false),
        "replied" => Query::flag(Flag::Replied, true),
        "unreplied" => Query::flag(Flag::Replied, false),
        "forwarded" => Query::flag(Flag::Forwarded, true),
        "unforwarded" => Query::flag(Flag::Forwarded, false),
        "invite" => Query::flag(Flag::Invite, true),
        "anywhere" => Query::in_folders(FolderScope::Any),
        "local" => Query::in_folders(FolderScope::Local),
        "remote" => Query::in_folders(FolderScope::Remote),
        "solo" => Query::conv_count(Some(1), Some(1)),
        "tome" => Query::me(mailbox, AddrFields::TO),
        "fromme" => Query::me(mailbox, AddrFields::FROM),
        "ccme" => Query::me(mailbox, AddrFields::CC),
        "tofromme" => Query::me(mailbox, AddrFields::TO.union(AddrFields::FROM)),
        "toccme" => Query::me(mailbox, AddrFields::TO.union(AddrFields::CC)),
        "fromccme" => Query::me(mailbox, AddrFields::FROM.union(AddrFields::CC)),
        "tofromccme" => Query::me(mailbox, AddrFields::TO.union(AddrFields::FROM).union(AddrFields::CC)),
        _ => return Err(Error::invalid_argument(format!("unknown built-in query: {}", name))),
    };
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::query::context::{QueryContext, StaticMailbox};
    use crate::query::operation::{DbConstraint, DbOperation, QueryOperation};

    #[test]
    fn every_listed_name_resolves() {
        let mbox = StaticMailbox::new("a", "a@example.com");
        for name in BUILTIN_NAMES {
            assert!(builtin(&mbox, name).is_ok(), "{} should resolve", name);
        }
    }

    #[test]
    fn read_is_unread_flag_cleared() {
        let mbox = StaticMailbox::new("a", "a@example.com");
        let op = builtin(&mbox, "READ").unwrap().compile(&QueryContext::new("a"), true).unwrap();
        assert_eq!(
            op,
            QueryOperation::Db(DbOperation::with(DbConstraint::Tag { tag: Flag::Unread.tag(), truth: false }))
        );
    }

    #[test]
    fn unknown_name_is_invalid_argument() {
        let mbox = StaticMailbox::new("a", "a@example.com");
        let err = builtin(&mbox, "bogus").unwrap_err();
        assert!(err.is(ErrorKind::InvalidArgument));
    }
}
