//! Referline Server — HTTP surface over onboarding and the audit chain.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;

pub use caller::{Caller, CallerClaims, CallerVerifier};
pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::{AppState, build_router};
