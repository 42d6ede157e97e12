//! Audit chain service: the access gate in front of the ledger.

use referline_core::error::{ReferlineError, ReferlineResult};
use referline_core::models::loan_audit::{AuditStatus, LoanAudit, LoanAuditMetadata};
use referline_core::repository::{ActorRepository, LoanAuditRepository, ReferralRepository};
use tracing::warn;
use uuid::Uuid;

use crate::gate::{self, ChainPosition};
use crate::ledger::AuditChainLedger;

/// Generic over repository implementations so that the chain layer has
/// no dependency on the database crate.
pub struct AuditChainService<A: ActorRepository, R: ReferralRepository, L: LoanAuditRepository> {
    ledger: AuditChainLedger<A, R, L>,
}

impl<A, R, L> AuditChainService<A, R, L>
where
    A: ActorRepository,
    R: ReferralRepository,
    L: LoanAuditRepository,
{
    pub fn new(ledger: AuditChainLedger<A, R, L>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &AuditChainLedger<A, R, L> {
        &self.ledger
    }

    pub async fn create_audit(
        &self,
        initiator_id: Uuid,
        metadata: LoanAuditMetadata,
    ) -> ReferlineResult<LoanAudit> {
        self.ledger.create_audit_record(initiator_id, metadata).await
    }

    /// Fetch the audit if `actor_id` may currently see it.
    pub async fn access_audit(&self, audit_id: Uuid, actor_id: Uuid) -> ReferlineResult<LoanAudit> {
        let audit = self.ledger.audits().get_by_id(audit_id).await?;
        self.check_gate(&audit, actor_id)?;
        Ok(audit)
    }

    /// Gate, then sign off and advance.
    pub async fn advance_audit(
        &self,
        audit_id: Uuid,
        actor_id: Uuid,
    ) -> ReferlineResult<LoanAudit> {
        let audit = self.ledger.audits().get_by_id(audit_id).await?;
        self.check_gate(&audit, actor_id)?;
        self.ledger.advance_loaded(audit, actor_id).await
    }

    /// In-progress audits where `actor_id` is granted and has not yet
    /// signed off.
    pub async fn pending_for(&self, actor_id: Uuid) -> ReferlineResult<Vec<LoanAudit>> {
        let audits = self.ledger.audits().list_by_participant(actor_id).await?;
        Ok(audits
            .into_iter()
            .filter(|audit| audit.status == AuditStatus::InProgress)
            .filter(|audit| {
                let signed = audit
                    .position_of(actor_id)
                    .is_some_and(|i| audit.hierarchy[i].updated);
                !signed && gate::evaluate(audit, actor_id).is_granted()
            })
            .collect())
    }

    fn check_gate(&self, audit: &LoanAudit, actor_id: Uuid) -> ReferlineResult<ChainPosition> {
        gate::authorize(audit, actor_id).map_err(|e| {
            warn!(audit_id = %audit.id, actor_id = %actor_id, reason = %e, "Audit access denied");
            ReferlineError::from(e)
        })
    }
}
