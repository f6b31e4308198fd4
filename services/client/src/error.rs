//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::session::SessionError;
use justgo_core::ports::{StoreError, TransportError};

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents a failure of the credential store.
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// Represents a failure to set up the HTTP transport.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Represents a failed remote call.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// Represents a rejected login or registration.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Represents a standard Input/Output error (e.g. reading a password from stdin).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
