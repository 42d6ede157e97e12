//! Audit chain ledger: builds and grows the hierarchy list of a loan
//! audit.
//!
//! The ledger performs no authorization. Callers run the access gate
//! first (see [`crate::service::AuditChainService`]).

use futures::TryStreamExt;
use referline_core::error::{ReferlineError, ReferlineResult};
use referline_core::models::actor::ActorRole;
use referline_core::models::loan_audit::{
    AuditStatus, CreateLoanAudit, HierarchyEntry, LoanAudit, LoanAuditMetadata,
};
use referline_core::models::referral::ReferralEdge;
use referline_core::repository::{ActorRepository, LoanAuditRepository, ReferralRepository};
use referline_core::traversal::ancestor_edges;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ChainConfig;
use crate::error::ChainError;

/// Initiator first (already signed off), then every ancestor pending.
pub fn initial_hierarchy(
    initiator_id: Uuid,
    initiator_role: ActorRole,
    ancestors: &[ReferralEdge],
) -> Vec<HierarchyEntry> {
    let mut hierarchy = Vec::with_capacity(ancestors.len() + 1);
    hierarchy.push(HierarchyEntry {
        actor_id: initiator_id,
        actor_role: initiator_role,
        updated: true,
    });
    hierarchy.extend(
        ancestors
            .iter()
            .map(|edge| HierarchyEntry::pending(edge.child_id, edge.child_role)),
    );
    hierarchy
}

/// `Completed` iff the last entry is a root actor that has signed off.
pub fn status_of(hierarchy: &[HierarchyEntry], last_is_root: bool) -> AuditStatus {
    match hierarchy.last() {
        Some(last) if last_is_root && last.updated => AuditStatus::Completed,
        _ => AuditStatus::InProgress,
    }
}

/// Outcome of signing off one hierarchy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOff {
    pub hierarchy: Vec<HierarchyEntry>,
    pub status: AuditStatus,
    /// The actor was a root; nothing can follow it.
    pub exhausted: bool,
}

/// Mark entry `index` updated and make sure `parent` (the actor's referral
/// parent, `None` for a root) is the entry that follows it.
pub fn sign_off(
    hierarchy: &[HierarchyEntry],
    index: usize,
    parent: Option<(Uuid, ActorRole)>,
) -> Result<SignOff, ChainError> {
    let mut next = hierarchy.to_vec();
    next[index].updated = true;
    let actor_id = next[index].actor_id;

    let Some((parent_id, parent_role)) = parent else {
        let status = if index + 1 == next.len() {
            AuditStatus::Completed
        } else {
            AuditStatus::InProgress
        };
        return Ok(SignOff {
            hierarchy: next,
            status,
            exhausted: true,
        });
    };

    match next.get(index + 1) {
        Some(entry) if entry.actor_id == parent_id => {}
        Some(entry) => {
            return Err(ChainError::ChainDiverged {
                actor_id,
                expected: parent_id,
                found: entry.actor_id,
            });
        }
        None => next.push(HierarchyEntry::pending(parent_id, parent_role)),
    }

    Ok(SignOff {
        hierarchy: next,
        status: AuditStatus::InProgress,
        exhausted: false,
    })
}

/// Creates audit records and advances their hierarchy.
pub struct AuditChainLedger<A: ActorRepository, R: ReferralRepository, L: LoanAuditRepository> {
    actors: A,
    referrals: R,
    audits: L,
    config: ChainConfig,
}

impl<A, R, L> AuditChainLedger<A, R, L>
where
    A: ActorRepository,
    R: ReferralRepository,
    L: LoanAuditRepository,
{
    pub fn new(actors: A, referrals: R, audits: L, config: ChainConfig) -> Self {
        Self {
            actors,
            referrals,
            audits,
            config,
        }
    }

    pub fn audits(&self) -> &L {
        &self.audits
    }

    /// Create an audit whose hierarchy already holds the initiator's full
    /// ancestor chain up to the root.
    pub async fn create_audit_record(
        &self,
        initiator_id: Uuid,
        metadata: LoanAuditMetadata,
    ) -> ReferlineResult<LoanAudit> {
        metadata.validate()?;
        let initiator = self.actors.get_by_id(initiator_id).await?;
        let initiator_edge = self.referrals.get_edge(initiator_id).await?;

        let ancestors: Vec<ReferralEdge> =
            ancestor_edges(&self.referrals, initiator_id, self.config.max_chain_depth)
                .try_collect()
                .await?;

        let hierarchy = initial_hierarchy(initiator.id, initiator.role, &ancestors);
        let last_is_root = ancestors
            .last()
            .map_or(initiator_edge.is_root, |edge| edge.is_root);
        let status = status_of(&hierarchy, last_is_root);

        let audit = self
            .audits
            .create(CreateLoanAudit {
                metadata,
                hierarchy,
                status,
            })
            .await?;

        info!(
            audit_id = %audit.id,
            initiator_id = %initiator_id,
            chain_length = audit.hierarchy.len(),
            "Loan audit created"
        );
        Ok(audit)
    }

    /// Sign off `actor_id` on the audit and extend the chain to its parent.
    ///
    /// For a root actor the sign-off is persisted before the
    /// `ChainExhausted` error is returned.
    pub async fn mark_updated_and_advance(
        &self,
        audit_id: Uuid,
        actor_id: Uuid,
    ) -> ReferlineResult<LoanAudit> {
        let audit = self.audits.get_by_id(audit_id).await?;
        self.advance_loaded(audit, actor_id).await
    }

    /// [`Self::mark_updated_and_advance`] on a record the caller has
    /// already fetched. The write still fails if the record changed since.
    pub async fn advance_loaded(
        &self,
        audit: LoanAudit,
        actor_id: Uuid,
    ) -> ReferlineResult<LoanAudit> {
        let index = audit
            .position_of(actor_id)
            .ok_or_else(|| ReferlineError::not_found("hierarchy entry", actor_id))?;

        let edge = self.referrals.get_edge(actor_id).await?;
        let parent = match edge.parent_id {
            Some(parent_id) => {
                let parent_edge = self.referrals.get_edge(parent_id).await?;
                Some((parent_id, parent_edge.child_role))
            }
            None => None,
        };

        let outcome = sign_off(&audit.hierarchy, index, parent)?;
        let updated = self
            .audits
            .replace_hierarchy(audit.id, audit.version, outcome.hierarchy, outcome.status)
            .await?;

        if outcome.exhausted {
            warn!(
                audit_id = %audit.id,
                actor_id = %actor_id,
                status = ?updated.status,
                "Root signed off; chain cannot advance further"
            );
            return Err(ChainError::ChainExhausted { actor_id }.into());
        }

        info!(
            audit_id = %updated.id,
            actor_id = %actor_id,
            version = updated.version,
            "Audit chain advanced"
        );
        Ok(updated)
    }
}
