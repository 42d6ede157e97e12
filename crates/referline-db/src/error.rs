//! Database-specific error types and conversions.

use referline_core::error::ReferlineError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: String, reason: String },
}

impl From<DbError> for ReferlineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ReferlineError::NotFound { entity, id },
            DbError::Conflict { entity, reason } => ReferlineError::Conflict { entity, reason },
            other => ReferlineError::Store(other.to_string()),
        }
    }
}

/// Markers SurrealDB puts in statement errors when another writer won:
/// a taken record id, a unique index hit, or an optimistic transaction
/// conflict in the key-value layer.
const WRITE_RACE_MARKERS: &[&str] = &[
    "already exists",
    "already contains",
    "Transaction conflict",
    "Write conflict",
];

pub(crate) fn is_write_race(message: &str) -> bool {
    WRITE_RACE_MARKERS.iter().any(|m| message.contains(m))
}

/// Map a statement error from `.check()`. Lost write races become
/// `Conflict` on `entity`, everything else stays a query failure.
pub(crate) fn statement_error(
    err: surrealdb::Error,
    entity: &str,
    reason: impl FnOnce() -> String,
) -> DbError {
    let message = err.to_string();
    if is_write_race(&message) {
        DbError::Conflict {
            entity: entity.into(),
            reason: reason(),
        }
    } else {
        DbError::Query(message)
    }
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_preserved() {
        let err: ReferlineError = DbError::NotFound {
            entity: "actor".into(),
            id: "abc".into(),
        }
        .into();
        assert!(matches!(err, ReferlineError::NotFound { .. }));
    }

    #[test]
    fn decode_failure_becomes_store_error() {
        let err: ReferlineError = DbError::Decode("bad".into()).into();
        assert!(matches!(err, ReferlineError::Store(_)));
    }

    #[test]
    fn write_races_are_recognised() {
        assert!(is_write_race(
            "Transaction conflict: Write conflict, retry the transaction"
        ));
        assert!(is_write_race(
            "Database index `idx_actor_email` already contains 'a@example.com'"
        ));
        assert!(is_write_race("Database record `referral_root:singleton` already exists"));
        assert!(!is_write_race("Found 'x' for field `loan_amount`, but expected a int"));
    }

    #[test]
    fn parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid", "actor").is_err());
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "actor").unwrap(), id);
    }
}
