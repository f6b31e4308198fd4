pub mod adapters;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use dashboard::{Dashboard, DashboardState, LoadOutcome, Slot, Tab};
pub use gateway::{Gateway, GatewayError};
pub use session::{SessionError, SessionHandle, SessionMachine};
pub use state::AppState;
