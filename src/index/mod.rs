pub mod admin;
pub mod backend;
pub mod classify;
pub mod commit;
pub mod document;
pub mod handle;
pub mod indexer;
pub mod manager;
pub mod memory;
pub mod store;
pub mod topology;
