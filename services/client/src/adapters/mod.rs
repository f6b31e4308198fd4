pub mod http;
pub mod store;

pub use http::ReqwestTransport;
pub use store::{FileCredentialStore, MemoryCredentialStore};
