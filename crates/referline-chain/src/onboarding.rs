//! Onboarding coordination: actor creation plus the referral edge and the
//! parent-side child descriptor.
//!
//! The three writes are not transactional. A failure after the actor has
//! been stored is logged and returned; the orphaned actor is left behind.

use futures::TryStreamExt;
use referline_core::error::{ReferlineError, ReferlineResult};
use referline_core::models::actor::{Actor, ActorRole, CreateActor, UpdateActor};
use referline_core::models::referral::{ChildDescriptor, RecordEdge};
use referline_core::repository::{ActorRepository, ReferralRepository};
use referline_core::traversal::{actors_by_role, walk_ancestors};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ChainConfig;
use crate::error::ChainError;

pub struct OnboardingService<A: ActorRepository, R: ReferralRepository> {
    actors: A,
    referrals: R,
    config: ChainConfig,
}

impl<A: ActorRepository, R: ReferralRepository> OnboardingService<A, R> {
    pub fn new(actors: A, referrals: R, config: ChainConfig) -> Self {
        Self {
            actors,
            referrals,
            config,
        }
    }

    pub fn actors(&self) -> &A {
        &self.actors
    }

    /// Create a root admin and its root edge.
    ///
    /// Unless multiple roots are allowed, the root slot is claimed before
    /// anything is written, so of two racing bootstraps exactly one
    /// proceeds. A failed bootstrap gives the slot back.
    pub async fn bootstrap_root(&self, mut input: CreateActor) -> ReferlineResult<Actor> {
        if input.role != ActorRole::Admin {
            return Err(ReferlineError::validation(format!(
                "only an admin can be a referral root, got {}",
                input.role
            )));
        }
        input.parent_id = None;

        let exclusive = !self.config.allow_multiple_roots;
        if exclusive {
            if self.referrals.count_roots().await? > 0 {
                return Err(ChainError::RootAlreadyExists.into());
            }
            self.referrals
                .claim_root_slot()
                .await
                .map_err(|e| match e {
                    ReferlineError::Conflict { .. } => ChainError::RootAlreadyExists.into(),
                    other => other,
                })?;
        }

        let stored = self.store_root(input).await;
        if stored.is_err()
            && exclusive
            && let Err(e) = self.referrals.release_root_slot().await
        {
            error!(error = %e, "Root slot left claimed after failed bootstrap");
        }
        stored
    }

    async fn store_root(&self, input: CreateActor) -> ReferlineResult<Actor> {
        let actor = self.actors.create(input).await?;
        self.referrals
            .record_edge(RecordEdge {
                child_id: actor.id,
                child_role: actor.role,
                parent_id: None,
            })
            .await
            .inspect_err(|e| {
                error!(actor_id = %actor.id, error = %e, "Root admin stored without referral edge");
            })?;

        info!(actor_id = %actor.id, "Root admin bootstrapped");
        Ok(actor)
    }

    /// Onboard a new actor under `parent_id`.
    pub async fn onboard(&self, parent_id: Uuid, mut input: CreateActor) -> ReferlineResult<Actor> {
        let parent = self.actors.get_by_id(parent_id).await?;
        if !parent.role.can_onboard(input.role) {
            return Err(ChainError::IneligibleOnboarder {
                parent_role: parent.role,
                child_role: input.role,
            }
            .into());
        }
        // The parent must itself be attached to the forest.
        self.referrals.get_edge(parent_id).await?;

        input.parent_id = Some(parent_id);
        let actor = self.actors.create(input).await?;

        self.referrals
            .record_edge(RecordEdge {
                child_id: actor.id,
                child_role: actor.role,
                parent_id: Some(parent_id),
            })
            .await
            .inspect_err(|e| {
                error!(
                    actor_id = %actor.id,
                    parent_id = %parent_id,
                    error = %e,
                    "Actor stored but referral edge was not recorded"
                );
            })?;

        self.referrals
            .append_child_descriptor(parent_id, actor.id, actor.role)
            .await
            .inspect_err(|e| {
                error!(
                    actor_id = %actor.id,
                    parent_id = %parent_id,
                    error = %e,
                    "Referral edge recorded but child descriptor is missing"
                );
            })?;

        info!(
            actor_id = %actor.id,
            role = %actor.role,
            parent_id = %parent_id,
            "Actor onboarded"
        );
        Ok(actor)
    }

    pub async fn children(&self, parent_id: Uuid) -> ReferlineResult<Vec<ChildDescriptor>> {
        self.actors.get_by_id(parent_id).await?;
        self.referrals.get_children(parent_id).await
    }

    /// Ancestor ids of `actor_id`, nearest first.
    pub async fn ancestors(&self, actor_id: Uuid) -> ReferlineResult<Vec<Uuid>> {
        walk_ancestors(&self.referrals, actor_id, self.config.max_chain_depth)
            .try_collect()
            .await
    }

    /// Update `target_id` on behalf of `caller_id`, who must be the actor
    /// itself or one of its ancestors.
    pub async fn update_actor(
        &self,
        caller_id: Uuid,
        target_id: Uuid,
        input: UpdateActor,
    ) -> ReferlineResult<Actor> {
        if caller_id != target_id && !self.ancestors(target_id).await?.contains(&caller_id) {
            return Err(ReferlineError::Forbidden {
                reason: "only the actor or one of its ancestors may update it".into(),
            });
        }
        let actor = self.actors.update(target_id, input).await?;
        info!(actor_id = %target_id, updated_by = %caller_id, "Actor updated");
        Ok(actor)
    }

    /// Every actor holding `role`.
    pub async fn members_of(&self, role: ActorRole) -> ReferlineResult<Vec<Actor>> {
        actors_by_role(&self.actors, role, self.config.role_page_size)
            .try_collect()
            .await
    }
}
