//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. None of them perform
//! authorization; callers gate writes through the access rules in
//! `referline-chain`.

use uuid::Uuid;

use crate::error::ReferlineResult;
use crate::models::{
    actor::{Actor, ActorRole, CreateActor, UpdateActor},
    loan_audit::{AuditStatus, CreateLoanAudit, HierarchyEntry, LoanAudit},
    referral::{ChildDescriptor, RecordEdge, ReferralEdge},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Identity store
// ---------------------------------------------------------------------------

pub trait ActorRepository: Send + Sync {
    /// Validates the parent's onboarding eligibility but does not record
    /// the referral edge.
    fn create(&self, input: CreateActor) -> impl Future<Output = ReferlineResult<Actor>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ReferlineResult<Actor>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateActor,
    ) -> impl Future<Output = ReferlineResult<Actor>> + Send;
    fn list_by_role(
        &self,
        role: ActorRole,
        pagination: Pagination,
    ) -> impl Future<Output = ReferlineResult<PaginatedResult<Actor>>> + Send;
}

// ---------------------------------------------------------------------------
// Referral graph
// ---------------------------------------------------------------------------

pub trait ReferralRepository: Send + Sync {
    /// Record the child -> parent edge. An actor may be onboarded once.
    fn record_edge(
        &self,
        input: RecordEdge,
    ) -> impl Future<Output = ReferlineResult<ReferralEdge>> + Send;

    /// Cache a child descriptor on the parent. Idempotent per
    /// `(parent_id, child_id)`.
    fn append_child_descriptor(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
        child_role: ActorRole,
    ) -> impl Future<Output = ReferlineResult<()>> + Send;

    fn get_edge(&self, child_id: Uuid)
    -> impl Future<Output = ReferlineResult<ReferralEdge>> + Send;

    /// `Ok(None)` for a root, `NotFound` when no edge was recorded.
    fn get_parent(
        &self,
        child_id: Uuid,
    ) -> impl Future<Output = ReferlineResult<Option<Uuid>>> + Send;

    /// Child descriptors cached on `parent_id`, oldest first.
    fn get_children(
        &self,
        parent_id: Uuid,
    ) -> impl Future<Output = ReferlineResult<Vec<ChildDescriptor>>> + Send;

    /// Number of root edges whose child is an admin.
    fn count_roots(&self) -> impl Future<Output = ReferlineResult<u64>> + Send;

    /// Take the single root slot. `Conflict` if another writer holds it,
    /// including one racing this call.
    fn claim_root_slot(&self) -> impl Future<Output = ReferlineResult<()>> + Send;

    /// Give the root slot back after a bootstrap that did not complete.
    fn release_root_slot(&self) -> impl Future<Output = ReferlineResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Audit chain ledger
// ---------------------------------------------------------------------------

pub trait LoanAuditRepository: Send + Sync {
    fn create(
        &self,
        input: CreateLoanAudit,
    ) -> impl Future<Output = ReferlineResult<LoanAudit>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ReferlineResult<LoanAudit>> + Send;

    /// Overwrite the hierarchy and status if the stored version still
    /// equals `expected_version`. Bumps the version by one. A stale
    /// version yields `Conflict`.
    fn replace_hierarchy(
        &self,
        id: Uuid,
        expected_version: u64,
        hierarchy: Vec<HierarchyEntry>,
        status: AuditStatus,
    ) -> impl Future<Output = ReferlineResult<LoanAudit>> + Send;

    /// Every audit whose hierarchy contains `actor_id`, oldest first.
    fn list_by_participant(
        &self,
        actor_id: Uuid,
    ) -> impl Future<Output = ReferlineResult<Vec<LoanAudit>>> + Send;
}
