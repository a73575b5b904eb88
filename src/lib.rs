//! Full-text search for mailboxes: query compilation, rendering to the
//! search backend's syntax, and per-account index lifecycle.
//!
//! ```text
//!  Query AST ──compile──▶ QueryOperation ──optimize──▶ OptimizedQuery ──render──▶ q=...
//!                              │                                                    │
//!                              ▼                                                    ▼
//!                         DB predicates                         IndexStore ──▶ SearchBackend
//!                        (caller-owned)                      (searcher caches, commit waits,
//!                                                              provisioning, backup bridge)
//! ```

pub mod core;
pub mod query;
pub mod index;
pub mod reader;
pub mod backup;

pub use crate::core::config::IndexConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::AccountId;
pub use crate::index::backend::SearchBackend;
pub use crate::index::manager::IndexManager;
pub use crate::index::store::{IndexStore, SearchRequest};
pub use crate::query::ast::Query;
