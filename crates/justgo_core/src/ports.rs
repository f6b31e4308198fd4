//! crates/justgo_core/src/ports.rs
//!
//! Defines the service contracts (traits) the client core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! session and orchestration logic independent of the concrete storage medium
//! and HTTP stack.

use crate::domain::CredentialRecord;
use async_trait::async_trait;
use std::fmt;

//=========================================================================================
// Port Errors
//=========================================================================================

/// Failures raised by a `CredentialStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Failures raised when no HTTP response could be obtained at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Unreachable(String),
    #[error("request timed out")]
    Timeout,
}

pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Transport Request / Response
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A fully-resolved outgoing call. `path` is relative to the API base URL and
/// is not yet percent-encoded; `body` is a JSON document when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable key/value persistence for the session credential.
///
/// Implementations store a single record under a fixed key. They do no
/// validation and no expiry checking.
///
/// The methods are synchronous and are called from async code while the
/// session lock is held, so every call must be short: one small file or an
/// in-memory value. A slower backend has to be moved behind
/// `tokio::task::spawn_blocking` and out of the session transitions.
pub trait CredentialStore: Send + Sync {
    /// Persists the record, overwriting any previous one.
    fn save(&self, record: &CredentialRecord) -> StoreResult<()>;

    /// Returns the last saved record, or `None` if nothing is stored.
    fn load(&self) -> StoreResult<Option<CredentialRecord>>;

    /// Removes the stored record. Clearing an empty store is not an error.
    fn clear(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues a single HTTP call. Any response, whatever its status, is `Ok`;
    /// `Err` means no response was obtained.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
