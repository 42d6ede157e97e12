//! Domain models for Referline.
//!
//! These are the core types shared across all crates.

pub mod actor;
pub mod loan_audit;
pub mod referral;
