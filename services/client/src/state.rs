//! services/client/src/state.rs
//!
//! Defines the application's shared state: the single session, the gateway
//! every remote call goes through, and the session state machine.

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::gateway::{Gateway, GatewayResult};
use crate::protocol::{Endpoint, HealthStatus};
use crate::session::{SessionHandle, SessionMachine};
use justgo_core::ports::{CredentialStore, HttpTransport};
use std::sync::Arc;

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionHandle>,
    pub gateway: Arc<Gateway>,
    pub auth: Arc<SessionMachine>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let session = Arc::new(SessionHandle::new(store));
        let gateway = Arc::new(Gateway::new(
            transport,
            session.clone(),
            config.request_timeout,
        ));
        let auth = Arc::new(SessionMachine::new(gateway.clone(), session.clone()));
        Self {
            config,
            session,
            gateway,
            auth,
        }
    }

    /// Opens a fresh main view bound to this state's gateway.
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.gateway.clone(), &self.config.default_city)
    }

    /// Probes the API without a session.
    pub async fn health(&self) -> GatewayResult<HealthStatus> {
        self.gateway.fetch(Endpoint::HEALTH).await
    }
}
