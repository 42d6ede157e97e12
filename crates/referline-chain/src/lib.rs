//! Referline Chain — onboarding coordination, the access gate and the
//! audit chain ledger.

pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod onboarding;
pub mod service;

pub use config::ChainConfig;
pub use error::ChainError;
pub use gate::ChainPosition;
pub use ledger::AuditChainLedger;
pub use onboarding::OnboardingService;
pub use service::AuditChainService;
