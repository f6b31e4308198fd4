//! services/client/src/session.rs
//!
//! The session state machine. `SessionHandle` owns the single `Session` value
//! and its durable mirror in the `CredentialStore`; every mutation goes through
//! one of its transition functions and is published to subscribers over a
//! `watch` channel. `SessionMachine` drives the user-facing operations
//! (bootstrap, login, register, logout) on top of it.

use crate::gateway::{Gateway, GatewayError};
use crate::protocol::{CredentialsRequest, Endpoint, LoginResponse, RegisterResponse};
use justgo_core::domain::{CredentialRecord, Session, SessionStatus, User};
use justgo_core::ports::CredentialStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcomes of the login and register exchanges that the form should show.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The server refused the request; the message is shown verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("Unable to reach the server: {0}")]
    Network(String),
    #[error("A sign-in request is already in progress")]
    InProgress,
    #[error("Already signed in")]
    AlreadyAuthenticated,
    /// The user signed out while the exchange was in flight.
    #[error("Sign-in was interrupted")]
    Interrupted,
}

/// The token to present on a protected call, tagged with the episode it
/// belongs to.
#[derive(Debug, Clone)]
pub struct ActiveCredentials {
    pub token: String,
    pub episode: Uuid,
}

//=========================================================================================
// SessionHandle (the single owner of session state)
//=========================================================================================

pub struct SessionHandle {
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<Session>,
}

impl SessionHandle {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(Session::unauthenticated());
        Self { store, state }
    }

    /// Returns a receiver that observes every session transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub(crate) fn credentials(&self) -> Option<ActiveCredentials> {
        let session = self.state.borrow();
        match (session.token(), session.episode()) {
            (Some(token), Some(episode)) => Some(ActiveCredentials {
                token: token.to_string(),
                episode,
            }),
            _ => None,
        }
    }

    /// Optimistically adopts a persisted credential. The token is not checked
    /// against the server; the first protected call does that.
    pub(crate) fn restore(&self) -> SessionStatus {
        let record = match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not read the credential store: {}", e);
                None
            }
        };

        self.state.send_if_modified(|session| {
            if session.status() != SessionStatus::Unauthenticated {
                return false;
            }
            match record {
                Some(record) => {
                    info!("Restored session for {}", record.user.email);
                    *session = Session::authenticated(record.token, record.user);
                    true
                }
                None => false,
            }
        });
        self.status()
    }

    pub(crate) fn begin_authenticating(&self) -> Result<(), SessionError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|session| match session.status() {
            SessionStatus::Authenticating => {
                outcome = Err(SessionError::InProgress);
                false
            }
            SessionStatus::Authenticated => {
                outcome = Err(SessionError::AlreadyAuthenticated);
                false
            }
            SessionStatus::Unauthenticated | SessionStatus::SessionExpired => {
                *session = Session::authenticating();
                true
            }
        });
        outcome
    }

    /// Completes a login. Returns `false` when the exchange was abandoned
    /// (a logout happened while it was in flight) and nothing was written.
    pub(crate) fn establish(&self, token: String, user: User) -> bool {
        self.state.send_if_modified(|session| {
            if session.status() != SessionStatus::Authenticating {
                return false;
            }
            let record = CredentialRecord::new(token.clone(), user.clone());
            // Blocking write under the watch lock; fine for a one-record file.
            if let Err(e) = self.store.save(&record) {
                // The session still works for this process; it just won't
                // survive a restart.
                error!("Failed to persist credentials: {}", e);
            }
            info!("Signed in as {}", user.email);
            *session = Session::authenticated(token, user);
            true
        })
    }

    /// Ends an in-flight login/register exchange without granting a session.
    pub(crate) fn settle_unauthenticated(&self, notice: impl Into<String>) -> bool {
        let notice = notice.into();
        self.state.send_if_modified(|session| {
            if session.status() != SessionStatus::Authenticating {
                return false;
            }
            *session = Session::unauthenticated().with_notice(notice);
            true
        })
    }

    /// Tears down the session after the server rejected the token of
    /// `episode`. Only the first caller for a given episode does any work;
    /// later callers (concurrent 401s, or a 401 for a session that was already
    /// replaced) get `false`.
    pub(crate) fn expire(&self, episode: Uuid) -> bool {
        self.state.send_if_modified(|session| {
            if session.episode() != Some(episode) {
                return false;
            }
            if let Err(e) = self.store.clear() {
                error!("Failed to clear credentials after expiry: {}", e);
            }
            *session = Session::expired();
            true
        })
    }

    pub(crate) fn sign_out(&self) {
        self.state.send_modify(|session| {
            if let Err(e) = self.store.clear() {
                error!("Failed to clear credentials on logout: {}", e);
            }
            if session.status() != SessionStatus::Unauthenticated {
                info!("Signed out");
            }
            *session = Session::unauthenticated();
        });
    }

    pub(crate) fn acknowledge_expiry(&self) -> bool {
        self.state.send_if_modified(|session| {
            if session.status() != SessionStatus::SessionExpired {
                return false;
            }
            *session = Session::unauthenticated();
            true
        })
    }
}

//=========================================================================================
// SessionMachine (the user-facing operations)
//=========================================================================================

pub struct SessionMachine {
    gateway: Arc<Gateway>,
    session: Arc<SessionHandle>,
}

impl SessionMachine {
    pub fn new(gateway: Arc<Gateway>, session: Arc<SessionHandle>) -> Self {
        Self { gateway, session }
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    /// Reads the credential store once at start-up.
    pub fn bootstrap(&self) -> SessionStatus {
        self.session.restore()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        self.session.begin_authenticating()?;
        debug!("Logging in as {}", email);

        let outcome = self
            .gateway
            .submit::<_, LoginResponse>(Endpoint::LOGIN, &CredentialsRequest { email, password })
            .await;

        match outcome {
            Ok(response) => match response.into_grant() {
                Ok((token, user)) => {
                    if self.session.establish(token, user.clone()) {
                        Ok(user)
                    } else {
                        Err(SessionError::Interrupted)
                    }
                }
                Err(message) => {
                    self.reject(message.unwrap_or_else(|| "Login failed".to_string()))
                }
            },
            Err(e) => self.fail("Login", e),
        }
    }

    /// Creates an account. A successful registration deliberately leaves the
    /// client signed out; the user has to log in afterwards.
    pub async fn register(&self, email: &str, password: &str) -> Result<String, SessionError> {
        self.session.begin_authenticating()?;
        debug!("Registering {}", email);

        let outcome = self
            .gateway
            .submit::<_, RegisterResponse>(Endpoint::REGISTER, &CredentialsRequest { email, password })
            .await;

        match outcome {
            Ok(response) if response.success != Some(false) => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Registration successful. Please log in.".to_string());
                if !self.session.settle_unauthenticated(message.clone()) {
                    return Err(SessionError::Interrupted);
                }
                info!("Registered {}", email);
                Ok(message)
            }
            Ok(response) => self.reject(
                response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "Registration failed".to_string()),
            ),
            Err(e) => self.fail("Registration", e),
        }
    }

    /// Clears the credential and returns to `Unauthenticated`. Never contacts
    /// the server and may be called any number of times.
    pub fn logout(&self) {
        self.session.sign_out();
    }

    /// Dismisses the "session expired" prompt.
    pub fn acknowledge_expiry(&self) -> bool {
        self.session.acknowledge_expiry()
    }

    fn reject<T>(&self, message: String) -> Result<T, SessionError> {
        warn!("Authentication rejected: {}", message);
        if self.session.settle_unauthenticated(message.clone()) {
            Err(SessionError::Rejected(message))
        } else {
            Err(SessionError::Interrupted)
        }
    }

    fn fail<T>(&self, action: &str, e: GatewayError) -> Result<T, SessionError> {
        match e {
            GatewayError::RequestFailed { message, .. } => {
                self.reject(message.unwrap_or_else(|| format!("{} failed", action)))
            }
            GatewayError::NetworkUnreachable(detail) => {
                warn!("{} failed, server unreachable: {}", action, detail);
                let error = SessionError::Network(detail);
                self.session.settle_unauthenticated(error.to_string());
                Err(error)
            }
            other => self.reject(format!("{} failed: {}", action, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_record, session_handle, signed_in, ScriptedTransport};
    use justgo_core::ports::TransportError;
    use serde_json::json;
    use std::time::Duration;

    fn machine(transport: Arc<ScriptedTransport>, session: Arc<SessionHandle>) -> SessionMachine {
        let gateway = Arc::new(Gateway::new(transport, session.clone(), Duration::from_secs(1)));
        SessionMachine::new(gateway, session)
    }

    #[tokio::test]
    async fn login_persists_the_granted_credential() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "/login",
            200,
            json!({"success": true, "token": "t1", "user": {"id": 1, "email": "a@b.com"}}),
        );
        let (session, store) = session_handle();
        let machine = machine(transport.clone(), session.clone());

        let user = machine.login("a@b.com", "secret").await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert_eq!(session.current().token(), Some("t1"));
        let record = store.load_record().unwrap();
        assert_eq!(record.token, "t1");
        assert_eq!(record.user, user);
        assert_eq!(store.saves(), 1);

        let call = &transport.calls()[0];
        assert_eq!(call.bearer, None);
        let body: serde_json::Value = serde_json::from_str(call.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"email": "a@b.com", "password": "secret"}));
    }

    #[tokio::test]
    async fn rejected_login_surfaces_the_server_message_without_writing() {
        let transport = ScriptedTransport::new();
        transport.respond("/login", 401, json!({"success": false, "message": "Invalid credentials"}));
        transport.respond("/login", 200, json!({"success": false, "error": "Account locked"}));
        transport.respond("/login", 200, json!({"success": true}));
        let (session, store) = session_handle();
        let machine = machine(transport, session.clone());

        for expected in ["Invalid credentials", "Account locked", "Login failed"] {
            let err = machine.login("a@b.com", "nope").await.unwrap_err();
            assert_eq!(err, SessionError::Rejected(expected.to_string()));
            assert_eq!(session.status(), SessionStatus::Unauthenticated);
            assert_eq!(session.current().notice(), Some(expected));
        }
        assert_eq!(store.saves(), 0);
        assert!(store.load_record().is_none());
    }

    #[tokio::test]
    async fn network_failure_during_login_is_never_success() {
        let transport = ScriptedTransport::new();
        transport.fail("/login", TransportError::Unreachable("connection refused".to_string()));
        let (session, store) = session_handle();
        let machine = machine(transport, session.clone());

        let err = machine.login("a@b.com", "secret").await.unwrap_err();

        assert!(matches!(err, SessionError::Network(_)));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(session.current().notice().is_some());
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn registration_never_grants_a_session() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "/register",
            201,
            json!({"success": true, "message": "User registered successfully", "token": "sneaky"}),
        );
        let (session, store) = session_handle();
        let machine = machine(transport, session.clone());

        let message = machine.register("a@b.com", "secret").await.unwrap();

        assert_eq!(message, "User registered successfully");
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(session.current().token(), None);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn rejected_registration_reports_the_server_message() {
        let transport = ScriptedTransport::new();
        transport.respond("/register", 400, json!({"success": false, "message": "User already exists"}));
        let (session, _store) = session_handle();
        let machine = machine(transport, session.clone());

        let err = machine.register("a@b.com", "secret").await.unwrap_err();

        assert_eq!(err, SessionError::Rejected("User already exists".to_string()));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn unstructured_failures_fall_back_to_a_generic_message() {
        let transport = ScriptedTransport::new();
        transport.respond_raw("/login", 500, "<html>Internal Server Error</html>");
        transport.respond_raw("/register", 500, "<html>Internal Server Error</html>");
        let (session, store) = session_handle();
        let machine = machine(transport, session.clone());

        let err = machine.login("a@b.com", "secret").await.unwrap_err();
        assert_eq!(err, SessionError::Rejected("Login failed".to_string()));
        assert_eq!(session.current().notice(), Some("Login failed"));

        let err = machine.register("a@b.com", "secret").await.unwrap_err();
        assert_eq!(err, SessionError::Rejected("Registration failed".to_string()));
        assert_eq!(session.current().notice(), Some("Registration failed"));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (session, store) = signed_in("t1");
        let machine = machine(ScriptedTransport::new(), session.clone());

        machine.logout();
        let once = session.current();
        machine.logout();

        assert_eq!(session.current(), once);
        assert_eq!(once.status(), SessionStatus::Unauthenticated);
        assert!(store.load_record().is_none());
    }

    #[tokio::test]
    async fn logout_during_login_wins() {
        let transport = ScriptedTransport::new();
        let reply = transport.defer("/login");
        let (session, store) = session_handle();
        let machine = machine(transport, session.clone());

        let login = machine.login("a@b.com", "secret");
        tokio::pin!(login);
        assert!(futures::poll!(login.as_mut()).is_pending());
        assert_eq!(session.status(), SessionStatus::Authenticating);

        // A second attempt while the first is in flight is refused.
        assert_eq!(
            machine.login("a@b.com", "secret").await.unwrap_err(),
            SessionError::InProgress
        );

        machine.logout();
        reply
            .send(crate::testing::response(
                200,
                json!({"success": true, "token": "t1", "user": {"id": 1, "email": "a@b.com"}}),
            ))
            .unwrap();

        assert_eq!(login.await.unwrap_err(), SessionError::Interrupted);
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn bootstrap_restores_without_contacting_the_server() {
        let transport = ScriptedTransport::new();
        let (session, store) = session_handle();
        store.seed(seeded_record("t1"));
        let machine = machine(transport.clone(), session.clone());

        assert_eq!(machine.bootstrap(), SessionStatus::Authenticated);
        assert_eq!(session.current().token(), Some("t1"));
        assert_eq!(session.current().user().map(|u| u.email.as_str()), Some("a@b.com"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_with_an_empty_store_stays_signed_out() {
        let (session, _store) = session_handle();
        let machine = machine(ScriptedTransport::new(), session);
        assert_eq!(machine.bootstrap(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn expiry_is_acknowledged_or_replaced_by_a_new_login() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "/login",
            200,
            json!({"success": true, "token": "t2", "user": {"id": 1, "email": "a@b.com"}}),
        );
        let (session, _store) = signed_in("t1");
        let machine = machine(transport, session.clone());
        let episode = session.credentials().unwrap().episode;

        assert!(session.expire(episode));
        assert!(!session.expire(episode));
        assert_eq!(session.status(), SessionStatus::SessionExpired);

        machine.login("a@b.com", "secret").await.unwrap();
        assert_eq!(session.current().token(), Some("t2"));
        // A late 401 for the old episode does not touch the new session.
        assert!(!session.expire(episode));
        assert_eq!(session.status(), SessionStatus::Authenticated);

        assert!(!machine.acknowledge_expiry());
    }

    #[test]
    fn acknowledging_expiry_returns_to_unauthenticated() {
        let (session, _store) = signed_in("t1");
        let episode = session.credentials().unwrap().episode;
        session.expire(episode);

        assert!(session.acknowledge_expiry());
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }
}
