//! Maps backend failures onto the few outcomes the store reacts to.

use crate::core::error::{Error, ErrorKind};
use crate::index::backend::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The core or collection does not exist (any more).
    NotFound,
    AlreadyExists,
    Unavailable,
    Transient,
}

// Phrases seen in backend error text, used when no status code is present.
const NOT_FOUND_PHRASES: &[&str] = &[
    "not found",
    "no such core",
    "no such collection",
    "can not find core",
    "could not find collection",
    "unknown core",
];
const ALREADY_EXISTS_PHRASES: &[&str] = &["already exists", "core with name"];
const UNAVAILABLE_PHRASES: &[&str] = &[
    "connection refused",
    "service unavailable",
    "no live solrservers",
    "no servers hosting shard",
    "server refused connection",
];

pub fn classify(err: &BackendError) -> FailureClass {
    match err.code {
        Some(404) => return FailureClass::NotFound,
        Some(409) => return FailureClass::AlreadyExists,
        Some(503) => return FailureClass::Unavailable,
        _ => {}
    }
    let message = err.message.to_lowercase();
    let has = |phrases: &[&str]| phrases.iter().any(|p| message.contains(p));
    if has(ALREADY_EXISTS_PHRASES) {
        FailureClass::AlreadyExists
    } else if has(NOT_FOUND_PHRASES) {
        FailureClass::NotFound
    } else if has(UNAVAILABLE_PHRASES) {
        FailureClass::Unavailable
    } else {
        FailureClass::Transient
    }
}

/// Crate error carrying the classification as its kind.
pub fn to_error(err: &BackendError, context: &str) -> Error {
    let kind = match classify(err) {
        FailureClass::NotFound => ErrorKind::NotFound,
        FailureClass::Unavailable => ErrorKind::Unavailable,
        FailureClass::AlreadyExists | FailureClass::Transient => ErrorKind::Backend,
    };
    Error::new(kind, format!("{}: {}", context, err))
}
