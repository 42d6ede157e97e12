//! SurrealDB implementation of [`LoanAuditRepository`].
//!
//! The hierarchy is stored as an array of objects next to a flat
//! `participants` array of actor ids, which backs the participant lookup.

use chrono::{DateTime, Utc};
use referline_core::error::{ReferlineError, ReferlineResult};
use referline_core::models::loan_audit::{
    AuditStatus, CreateLoanAudit, HierarchyEntry, LoanAudit, LoanAuditMetadata,
};
use referline_core::repository::LoanAuditRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid, statement_error};

#[derive(Debug, SurrealValue)]
struct LoanAuditRow {
    client_name: String,
    bank_name: String,
    loan_type: String,
    loan_amount: u64,
    content: String,
    hierarchy: serde_json::Value,
    status: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct LoanAuditRowWithId {
    record_id: String,
    client_name: String,
    bank_name: String,
    loan_type: String,
    loan_amount: u64,
    content: String,
    hierarchy: serde_json::Value,
    status: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_audit_status(s: &str) -> Result<AuditStatus, DbError> {
    match s {
        "InProgress" => Ok(AuditStatus::InProgress),
        "Completed" => Ok(AuditStatus::Completed),
        other => Err(DbError::Decode(format!("unknown audit status: {other}"))),
    }
}

fn audit_status_to_string(s: &AuditStatus) -> &'static str {
    match s {
        AuditStatus::InProgress => "InProgress",
        AuditStatus::Completed => "Completed",
    }
}

fn encode_hierarchy(
    hierarchy: &[HierarchyEntry],
) -> ReferlineResult<(serde_json::Value, Vec<String>)> {
    let value = serde_json::to_value(hierarchy)
        .map_err(|e| ReferlineError::Internal(format!("hierarchy encode: {e}")))?;
    let participants = hierarchy.iter().map(|e| e.actor_id.to_string()).collect();
    Ok((value, participants))
}

impl LoanAuditRow {
    fn into_audit(self, id: Uuid) -> Result<LoanAudit, DbError> {
        let hierarchy: Vec<HierarchyEntry> = serde_json::from_value(self.hierarchy)
            .map_err(|e| DbError::Decode(format!("invalid hierarchy: {e}")))?;
        Ok(LoanAudit {
            id,
            metadata: LoanAuditMetadata {
                client_name: self.client_name,
                bank_name: self.bank_name,
                loan_type: self.loan_type,
                loan_amount: self.loan_amount,
                content: self.content,
            },
            hierarchy,
            status: parse_audit_status(&self.status)?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl LoanAuditRowWithId {
    fn try_into_audit(self) -> Result<LoanAudit, DbError> {
        let id = parse_uuid(&self.record_id, "loan audit")?;
        LoanAuditRow {
            client_name: self.client_name,
            bank_name: self.bank_name,
            loan_type: self.loan_type,
            loan_amount: self.loan_amount,
            content: self.content,
            hierarchy: self.hierarchy,
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_audit(id)
    }
}

/// SurrealDB implementation of the audit chain ledger's storage.
#[derive(Clone)]
pub struct SurrealLoanAuditRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealLoanAuditRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> LoanAuditRepository for SurrealLoanAuditRepository<C> {
    async fn create(&self, input: CreateLoanAudit) -> ReferlineResult<LoanAudit> {
        input.metadata.validate()?;
        if input.hierarchy.is_empty() {
            return Err(ReferlineError::validation(
                "a loan audit needs at least one hierarchy entry",
            ));
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let (hierarchy, participants) = encode_hierarchy(&input.hierarchy)?;
        let metadata = input.metadata;

        let result = self
            .db
            .query(
                "CREATE type::record('loan_audit', $id) SET \
                 client_name = $client_name, bank_name = $bank_name, \
                 loan_type = $loan_type, loan_amount = $loan_amount, \
                 content = $content, hierarchy = $hierarchy, \
                 participants = $participants, status = $status, \
                 version = 1",
            )
            .bind(("id", id_str.clone()))
            .bind(("client_name", metadata.client_name))
            .bind(("bank_name", metadata.bank_name))
            .bind(("loan_type", metadata.loan_type))
            .bind(("loan_amount", metadata.loan_amount))
            .bind(("content", metadata.content))
            .bind(("hierarchy", hierarchy))
            .bind(("participants", participants))
            .bind(("status", audit_status_to_string(&input.status)))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<LoanAuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "loan_audit".into(),
            id: id_str,
        })?;

        debug!(audit_id = %id, entries = input.hierarchy.len(), "Loan audit created");
        row.into_audit(id).map_err(Into::into)
    }

    async fn get_by_id(&self, id: Uuid) -> ReferlineResult<LoanAudit> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('loan_audit', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LoanAuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "loan_audit".into(),
            id: id_str,
        })?;

        row.into_audit(id).map_err(Into::into)
    }

    async fn replace_hierarchy(
        &self,
        id: Uuid,
        expected_version: u64,
        hierarchy: Vec<HierarchyEntry>,
        status: AuditStatus,
    ) -> ReferlineResult<LoanAudit> {
        let (hierarchy_json, participants) = encode_hierarchy(&hierarchy)?;
        let raced = || format!("concurrent hierarchy write on audit {id}");

        let result = self
            .db
            .query(
                "UPDATE type::record('loan_audit', $id) SET \
                 hierarchy = $hierarchy, participants = $participants, \
                 status = $status, version = version + 1, \
                 updated_at = time::now() \
                 WHERE version = $expected_version",
            )
            .bind(("id", id.to_string()))
            .bind(("hierarchy", hierarchy_json))
            .bind(("participants", participants))
            .bind(("status", audit_status_to_string(&status)))
            .bind(("expected_version", expected_version))
            .await
            .map_err(|e| statement_error(e, "loan_audit", raced))?;

        // Two writers racing on the same version: the key-value layer
        // aborts one of them before the WHERE clause can.
        let mut result = result
            .check()
            .map_err(|e| statement_error(e, "loan_audit", raced))?;

        let rows: Vec<LoanAuditRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => {
                let audit = row.into_audit(id)?;
                debug!(audit_id = %id, version = audit.version, "Hierarchy replaced");
                Ok(audit)
            }
            // Nothing matched: either the record is gone or someone else
            // wrote first.
            None => {
                let current = self.get_by_id(id).await?;
                Err(ReferlineError::conflict(
                    "loan_audit",
                    format!(
                        "expected version {expected_version}, found {}",
                        current.version
                    ),
                ))
            }
        }
    }

    async fn list_by_participant(&self, actor_id: Uuid) -> ReferlineResult<Vec<LoanAudit>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM loan_audit \
                 WHERE participants CONTAINS $actor_id \
                 ORDER BY created_at ASC",
            )
            .bind(("actor_id", actor_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LoanAuditRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_audit())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
