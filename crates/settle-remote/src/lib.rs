//! Remote side of settle: the HTTP client for the key-manager and networking
//! APIs, the probes that observe resources through it, and the `Provisioner`
//! that pairs each create or delete call with a reconciliation.

pub mod config;
pub mod http;
pub mod paths;
pub mod probe;
pub mod provision;

pub use config::{default_config_path, OperationTimeouts, RemoteConfig, Timeouts};
pub use http::HttpApi;
pub use probe::{CreationProbe, DeletionProbe};
pub use provision::{Provisioned, ProvisionedSecret, Provisioner};

/// Header carrying the auth token on every request.
pub const AUTH_HEADER: &str = "X-Auth-Token";

use serde_json::Value;
use settle_core::{ProbeError, ReconcileError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Connection-level failure; no HTTP status was received.
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP {code} for {url}")]
    Status { code: u16, url: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("remote config error: {0}")]
    Config(String),
}

impl RemoteError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { code, .. } => Some(*code),
            RemoteError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

impl From<RemoteError> for ProbeError {
    fn from(err: RemoteError) -> Self {
        let message = err.to_string();
        match err {
            RemoteError::NotFound(_) => ProbeError::not_found(message),
            RemoteError::Status {
                code: 429 | 502 | 503 | 504,
                ..
            }
            | RemoteError::Http(_)
            | RemoteError::Io(_) => ProbeError::transient(message),
            RemoteError::Status { code, .. } => ProbeError::unexpected_status(code, message),
            RemoteError::Serialization(_) | RemoteError::Config(_) => ProbeError::other(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("{kind} response has no '{field}'")]
    MissingField {
        kind: settle_schema::ResourceKind,
        field: &'static str,
    },
}

impl ProvisionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProvisionError::Reconcile(e) if e.is_timeout())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProvisionError::Reconcile(e) if e.is_cancelled())
    }
}

/// JSON-over-HTTP access to the remote APIs, addressed by path.
///
/// Successful calls with an empty response body yield `Value::Null`.
pub trait ResourceApi: Send + Sync {
    fn create(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    fn get(&self, path: &str) -> Result<Value, RemoteError>;

    fn update(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

impl<A: ResourceApi + ?Sized> ResourceApi for &A {
    fn create(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        (**self).create(path, body)
    }

    fn get(&self, path: &str) -> Result<Value, RemoteError> {
        (**self).get(path)
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        (**self).update(path, body)
    }

    fn delete(&self, path: &str) -> Result<(), RemoteError> {
        (**self).delete(path)
    }
}
