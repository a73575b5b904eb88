pub mod ast;
pub mod builtin;
pub mod context;
pub mod escape;
pub mod native;
pub mod operation;
pub mod optimizer;
pub mod render;
pub mod tables;
