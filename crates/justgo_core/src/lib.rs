pub mod domain;
pub mod ports;

pub use domain::{CredentialRecord, Session, SessionStatus, User};
pub use ports::{
    CredentialStore, HttpTransport, Method, StoreError, StoreResult, TransportError,
    TransportRequest, TransportResponse,
};
