//! Chain error types.

use referline_core::error::ReferlineError;
use referline_core::models::actor::ActorRole;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("actor {actor_id} is not in chain")]
    NotInChain { actor_id: Uuid },

    #[error("predecessor not updated: waiting on {predecessor}")]
    PredecessorPending { predecessor: Uuid },

    #[error("actor {actor_id} has no parent, cannot advance")]
    ChainExhausted { actor_id: Uuid },

    #[error("chain diverged after {actor_id}: expected {expected}, found {found}")]
    ChainDiverged {
        actor_id: Uuid,
        expected: Uuid,
        found: Uuid,
    },

    #[error("role {parent_role} cannot onboard role {child_role}")]
    IneligibleOnboarder {
        parent_role: ActorRole,
        child_role: ActorRole,
    },

    #[error("a root admin already exists")]
    RootAlreadyExists,
}

impl From<ChainError> for ReferlineError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::NotInChain { .. } => ReferlineError::Forbidden {
                reason: "not in chain".into(),
            },
            ChainError::PredecessorPending { .. } => ReferlineError::Forbidden {
                reason: "predecessor not updated".into(),
            },
            ChainError::ChainExhausted { .. } => ReferlineError::Unresolved {
                reason: err.to_string(),
            },
            ChainError::ChainDiverged { .. } => {
                ReferlineError::conflict("loan_audit", err.to_string())
            }
            ChainError::IneligibleOnboarder { .. } => ReferlineError::validation(err.to_string()),
            ChainError::RootAlreadyExists => {
                ReferlineError::conflict("referral", err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_denials_are_forbidden() {
        let err: ReferlineError = ChainError::NotInChain {
            actor_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.to_string(), "Access denied: not in chain");

        let err: ReferlineError = ChainError::PredecessorPending {
            predecessor: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.to_string(), "Access denied: predecessor not updated");
    }

    #[test]
    fn exhausted_chain_is_not_found() {
        let err: ReferlineError = ChainError::ChainExhausted {
            actor_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().ends_with("has no parent, cannot advance"));
    }

    #[test]
    fn ineligible_onboarder_is_validation() {
        let err: ReferlineError = ChainError::IneligibleOnboarder {
            parent_role: ActorRole::Admin,
            child_role: ActorRole::Client,
        }
        .into();
        assert_eq!(err.to_string(), "Validation error: role admin cannot onboard role client");
    }
}
