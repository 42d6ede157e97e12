//! Referline Core — domain model, error taxonomy and repository traits
//! for the referral hierarchy and loan-audit sign-off chain.

pub mod error;
pub mod models;
pub mod repository;
pub mod traversal;
