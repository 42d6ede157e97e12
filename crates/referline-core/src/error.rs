//! Error types for Referline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferlineError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Nothing to resolve, for a reason other than a missing record.
    #[error("Not found: {reason}")]
    Unresolved { reason: String },

    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: String, reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReferlineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Unresolved { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Validation { .. } => "validation",
            Self::Forbidden { .. } => "forbidden",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }
}

pub type ReferlineResult<T> = Result<T, ReferlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = ReferlineError::not_found("actor", 42);
        assert_eq!(err.to_string(), "Entity not found: actor with id 42");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn unresolved_is_not_found_with_reason() {
        let err = ReferlineError::Unresolved {
            reason: "no parent, cannot advance".into(),
        };
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "Not found: no parent, cannot advance");
    }

    #[test]
    fn forbidden_carries_reason() {
        let err = ReferlineError::Forbidden {
            reason: "not in chain".into(),
        };
        assert_eq!(err.to_string(), "Access denied: not in chain");
    }
}
