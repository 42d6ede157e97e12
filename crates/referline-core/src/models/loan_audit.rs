//! Loan audit domain model.
//!
//! A loan audit carries an ordered hierarchy list: index 0 is the actor
//! who created the record, every following entry is the referral parent
//! of the entry before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::ActorRole;
use crate::error::ReferlineError;

/// Largest loan amount the ledger can persist.
pub const MAX_LOAN_AMOUNT: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoanAuditMetadata {
    pub client_name: String,
    pub bank_name: String,
    pub loan_type: String,
    pub loan_amount: u64,
    #[serde(default)]
    pub content: String,
}

impl LoanAuditMetadata {
    pub fn validate(&self) -> Result<(), ReferlineError> {
        let required = [
            ("client_name", &self.client_name),
            ("bank_name", &self.bank_name),
            ("loan_type", &self.loan_type),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ReferlineError::validation(format!("{field} is required")));
        }
        if self.loan_amount == 0 {
            return Err(ReferlineError::validation(
                "loan_amount must be greater than zero",
            ));
        }
        // Stored as a signed 64-bit integer.
        if self.loan_amount > MAX_LOAN_AMOUNT {
            return Err(ReferlineError::validation(format!(
                "loan_amount must not exceed {MAX_LOAN_AMOUNT}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub actor_id: Uuid,
    pub actor_role: ActorRole,
    pub updated: bool,
}

impl HierarchyEntry {
    pub fn pending(actor_id: Uuid, actor_role: ActorRole) -> Self {
        Self {
            actor_id,
            actor_role,
            updated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAudit {
    pub id: Uuid,
    pub metadata: LoanAuditMetadata,
    pub hierarchy: Vec<HierarchyEntry>,
    pub status: AuditStatus,
    /// Incremented on every hierarchy write; used for compare-and-swap.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanAudit {
    pub fn position_of(&self, actor_id: Uuid) -> Option<usize> {
        self.hierarchy.iter().position(|e| e.actor_id == actor_id)
    }

    pub fn initiator(&self) -> Option<&HierarchyEntry> {
        self.hierarchy.first()
    }
}

#[derive(Debug, Clone)]
pub struct CreateLoanAudit {
    pub metadata: LoanAuditMetadata,
    pub hierarchy: Vec<HierarchyEntry>,
    pub status: AuditStatus,
}
