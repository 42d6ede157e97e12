//! Chain configuration.

use serde::Deserialize;

/// Configuration shared by onboarding and the audit chain ledger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Upper bound on ancestors walked for a single actor (default: 50).
    pub max_chain_depth: usize,
    /// Permit more than one root admin in the referral forest.
    pub allow_multiple_roots: bool,
    /// Page size used when streaming actors by role (default: 50).
    pub role_page_size: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 50,
            allow_multiple_roots: false,
            role_page_size: 50,
        }
    }
}
