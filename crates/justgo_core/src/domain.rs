//! crates/justgo_core/src/domain.rs
//!
//! Defines the pure, core data structures for the client.
//! These structs are independent of any storage backend or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The profile of the signed-in user, as returned by the login exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
}

/// The durable mirror of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: String,
    pub user: User,
    pub saved_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
            saved_at: Utc::now(),
        }
    }
}

/// Where the client currently stands with respect to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// The server rejected a token we were holding. The UI may offer a
    /// "please sign in again" prompt before returning to `Unauthenticated`.
    SessionExpired,
}

/// The client's belief about whether it holds a valid credential and for whom.
///
/// The fields are private so that the only way to build a `Session` is through
/// the constructors below, which keep `token` present iff the status is
/// `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    status: SessionStatus,
    token: Option<String>,
    user: Option<User>,
    /// Local identifier of one authenticated episode. A fresh id is minted on
    /// every transition into `Authenticated`.
    episode: Option<Uuid>,
    notice: Option<String>,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            token: None,
            user: None,
            episode: None,
            notice: None,
        }
    }

    pub fn authenticating() -> Self {
        Self {
            status: SessionStatus::Authenticating,
            ..Self::unauthenticated()
        }
    }

    pub fn authenticated(token: impl Into<String>, user: User) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            token: Some(token.into()),
            user: Some(user),
            episode: Some(Uuid::new_v4()),
            notice: None,
        }
    }

    pub fn expired() -> Self {
        Self {
            status: SessionStatus::SessionExpired,
            notice: Some("Your session has expired. Please sign in again.".to_string()),
            ..Self::unauthenticated()
        }
    }

    /// Attaches a user-facing message (e.g. a login error) to this session value.
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn episode(&self) -> Option<Uuid> {
        self.episode
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unauthenticated()
    }
}
