//! SurrealDB repository implementations.

mod actor;
mod loan_audit;
mod referral;

pub use actor::SurrealActorRepository;
pub use loan_audit::SurrealLoanAuditRepository;
pub use referral::SurrealReferralRepository;
