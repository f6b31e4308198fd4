//! services/client/src/gateway.rs
//!
//! The authenticated request gateway. Every call to the remote API goes
//! through `Gateway::send`, which is the only place that attaches the bearer
//! token, classifies failures and tears the session down on a 401.

use crate::protocol::{Endpoint, ErrorBody};
use crate::session::SessionHandle;
use justgo_core::ports::{HttpTransport, TransportRequest, TransportResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const UNAUTHORIZED: u16 = 401;

/// The failure taxonomy shared by every remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// A protected call was attempted without a session. Nothing was sent.
    #[error("You are not signed in")]
    Unauthenticated,

    /// The server rejected the token we presented. The session has already
    /// been torn down by the time the caller sees this.
    #[error("Your session has expired. Please sign in again")]
    SessionExpired,

    /// Any other non-2xx reply. `message` is `None` when the body carried no
    /// `error` or `message` field.
    #[error("{}", describe_failure(.status, .message))]
    RequestFailed { status: u16, message: Option<String> },

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

fn describe_failure(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => format!("{} (status {})", message, status),
        None => format!("Request failed with status {}", status),
    }
}

pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionHandle>,
    timeout: Duration,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionHandle>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            timeout,
        }
    }

    /// Issues one call described by `endpoint`. A `body`, when present, must
    /// already be a JSON document.
    pub async fn send(
        &self,
        endpoint: Endpoint,
        body: Option<String>,
    ) -> GatewayResult<TransportResponse> {
        // Capture the credentials at issuance. A 401 tears down only the
        // episode that was presented, never one that started afterwards.
        let credentials = if endpoint.requires_auth {
            match self.session.credentials() {
                Some(credentials) => Some(credentials),
                None => {
                    debug!("refusing {} {}: no session", endpoint.method, endpoint.path);
                    return Err(GatewayError::Unauthenticated);
                }
            }
        } else {
            None
        };

        let request = TransportRequest {
            method: endpoint.method,
            path: endpoint.path.to_string(),
            bearer: credentials.as_ref().map(|c| c.token.clone()),
            body,
        };

        let response = match tokio::time::timeout(self.timeout, self.transport.execute(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("{} {} failed: {}", endpoint.method, endpoint.path, e);
                return Err(GatewayError::NetworkUnreachable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    "{} {} timed out after {:?}",
                    endpoint.method, endpoint.path, self.timeout
                );
                return Err(GatewayError::NetworkUnreachable(format!(
                    "no response within {:?}",
                    self.timeout
                )));
            }
        };

        if response.is_success() {
            return Ok(response);
        }

        if response.status == UNAUTHORIZED {
            if let Some(credentials) = credentials {
                if self.session.expire(credentials.episode) {
                    warn!("{} rejected our token; session expired", endpoint.path);
                }
                return Err(GatewayError::SessionExpired);
            }
        }

        let message = failure_message(&response);
        debug!(
            "{} {} returned {}: {:?}",
            endpoint.method, endpoint.path, response.status, message
        );
        Err(GatewayError::RequestFailed {
            status: response.status,
            message,
        })
    }

    /// Issues a body-less call and decodes the JSON response.
    pub async fn fetch<T: DeserializeOwned>(&self, endpoint: Endpoint) -> GatewayResult<T> {
        let response = self.send(endpoint, None).await?;
        decode(&response)
    }

    /// Issues a call with a JSON body and decodes the JSON response.
    pub async fn submit<B, T>(&self, endpoint: Endpoint, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let json = serde_json::to_string(body).map_err(|e| GatewayError::RequestFailed {
            status: 0,
            message: Some(format!("Could not encode request: {}", e)),
        })?;
        let response = self.send(endpoint, Some(json)).await?;
        decode(&response)
    }
}

fn decode<T: DeserializeOwned>(response: &TransportResponse) -> GatewayResult<T> {
    serde_json::from_str(&response.body).map_err(|e| GatewayError::RequestFailed {
        status: response.status,
        message: Some(format!("Malformed response from server: {}", e)),
    })
}

/// Pulls a human-readable message out of an error response, if the body has one.
fn failure_message(response: &TransportResponse) -> Option<String> {
    serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(ErrorBody::into_message)
}
