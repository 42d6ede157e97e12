//! Referral graph domain model.
//!
//! The referral graph is a forest: every onboarded actor has exactly one
//! edge pointing at the actor who onboarded it. Roots (the bootstrap admin)
//! carry an explicit `is_root` flag so that "no parent" and "no edge
//! recorded" stay distinguishable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::ActorRole;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralEdge {
    pub child_id: Uuid,
    pub child_role: ActorRole,
    pub parent_id: Option<Uuid>,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEdge {
    pub child_id: Uuid,
    pub child_role: ActorRole,
    /// `None` records a root edge.
    pub parent_id: Option<Uuid>,
}

/// Parent-side cache entry used for fast fan-out listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChildDescriptor {
    pub child_id: Uuid,
    pub child_role: ActorRole,
    pub level: u8,
    pub added_at: DateTime<Utc>,
}
