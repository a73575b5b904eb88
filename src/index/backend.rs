//! Transport seam to the full-text backend.
//!
//! Requests name a handler (`/select`, `/update`, `/admin/cores`, ...) and an
//! optional core or collection; responses are the decoded JSON body.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error as ThisError;

use crate::core::error::{Error, ErrorKind};

pub const SELECT: &str = "/select";
pub const UPDATE: &str = "/update";
pub const COMMIT_COUNT: &str = "/commitcount";
pub const REPLICATION: &str = "/replication";
pub const CORE_ADMIN: &str = "/admin/cores";
pub const COLLECTION_ADMIN: &str = "/admin/collections";

#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    /// Core or collection; `None` for admin endpoints.
    pub resource: Option<String>,
    pub handler: &'static str,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl BackendRequest {
    pub fn admin(handler: &'static str) -> Self {
        BackendRequest { resource: None, handler, params: Vec::new(), body: None, timeout: None }
    }

    pub fn to_resource(resource: impl Into<String>, handler: &'static str) -> Self {
        BackendRequest { resource: Some(resource.into()), handler, params: Vec::new(), body: None, timeout: None }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_params(&self, key: &str) -> Vec<&str> {
        self.params.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse(pub Value);

impl BackendResponse {
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn pointer(&self, path: &str) -> Option<&Value> {
        self.0.pointer(path)
    }

    /// Integer at a JSON pointer; tolerates numbers sent as strings.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        match self.0.pointer(path)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Failure reported by the backend or the transport in front of it.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("backend error{}: {message}", .code.map(|c| format!(" {}", c)).unwrap_or_default())]
pub struct BackendError {
    /// Structured status code when the backend supplied one.
    pub code: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        BackendError { code, message: message.into() }
    }

    pub fn message(message: impl Into<String>) -> Self {
        BackendError::new(None, message)
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::new(ErrorKind::Backend, err.to_string())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

pub trait SearchBackend: Send + Sync {
    fn execute(&self, request: &BackendRequest) -> BackendResult<BackendResponse>;

    /// Frees backend-side resources held for a searcher on `resource`.
    fn release(&self, _resource: &str) {}
}
