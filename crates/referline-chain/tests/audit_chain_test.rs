//! Integration tests for onboarding and the audit chain against
//! in-memory SurrealDB.

use referline_chain::config::ChainConfig;
use referline_chain::ledger::AuditChainLedger;
use referline_chain::onboarding::OnboardingService;
use referline_chain::service::AuditChainService;
use referline_core::error::ReferlineError;
use referline_core::models::actor::{Actor, ActorRole, ActorStatus, CreateActor, UpdateActor};
use referline_core::models::loan_audit::{AuditStatus, HierarchyEntry, LoanAuditMetadata};
use referline_core::repository::{ActorRepository, LoanAuditRepository};
use referline_db::repository::{
    SurrealActorRepository, SurrealLoanAuditRepository, SurrealReferralRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Onboarding = OnboardingService<SurrealActorRepository<Db>, SurrealReferralRepository<Db>>;
type Chain = AuditChainService<
    SurrealActorRepository<Db>,
    SurrealReferralRepository<Db>,
    SurrealLoanAuditRepository<Db>,
>;

struct Fixture {
    onboarding: Onboarding,
    chain: Chain,
    admin: Actor,
    e1: Actor,
}

fn actor_input(role: ActorRole, name: &str) -> CreateActor {
    CreateActor {
        role,
        parent_id: None,
        name: name.into(),
        email: format!("{name}@example.com"),
        phone: None,
        credential_hash: None,
        profile: None,
    }
}

fn metadata() -> LoanAuditMetadata {
    LoanAuditMetadata {
        client_name: "X".into(),
        bank_name: "ICICI".into(),
        loan_type: "home".into(),
        loan_amount: 500_000,
        content: String::new(),
    }
}

/// Services over a fresh in-memory DB with no actors yet.
async fn services() -> (Onboarding, Chain) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    referline_db::run_migrations(&db).await.unwrap();

    let config = ChainConfig::default();
    let onboarding = OnboardingService::new(
        SurrealActorRepository::new(db.clone()),
        SurrealReferralRepository::new(db.clone()),
        config.clone(),
    );
    let chain = AuditChainService::new(AuditChainLedger::new(
        SurrealActorRepository::new(db.clone()),
        SurrealReferralRepository::new(db.clone()),
        SurrealLoanAuditRepository::new(db),
        config,
    ));
    (onboarding, chain)
}

/// In-memory DB with a root admin and one employee under it.
async fn setup() -> Fixture {
    let (onboarding, chain) = services().await;

    let admin = onboarding
        .bootstrap_root(actor_input(ActorRole::Admin, "admin"))
        .await
        .unwrap();
    let e1 = onboarding
        .onboard(admin.id, actor_input(ActorRole::Employee, "e1"))
        .await
        .unwrap();

    Fixture {
        onboarding,
        chain,
        admin,
        e1,
    }
}

#[tokio::test]
async fn create_audit_builds_full_chain() {
    let f = setup().await;

    let r1 = f.chain.create_audit(f.e1.id, metadata()).await.unwrap();

    assert_eq!(
        r1.hierarchy,
        vec![
            HierarchyEntry {
                actor_id: f.e1.id,
                actor_role: ActorRole::Employee,
                updated: true,
            },
            HierarchyEntry::pending(f.admin.id, ActorRole::Admin),
        ]
    );
    assert_eq!(r1.status, AuditStatus::InProgress);
    assert_eq!(r1.version, 1);
}

#[tokio::test]
async fn initiator_always_has_access() {
    let f = setup().await;
    let r1 = f.chain.create_audit(f.e1.id, metadata()).await.unwrap();

    let seen = f.chain.access_audit(r1.id, f.e1.id).await.unwrap();
    assert_eq!(seen.id, r1.id);
}

#[tokio::test]
async fn next_in_chain_is_granted_after_initiator() {
    let f = setup().await;
    let r1 = f.chain.create_audit(f.e1.id, metadata()).await.unwrap();

    let seen = f.chain.access_audit(r1.id, f.admin.id).await.unwrap();
    assert_eq!(seen.id, r1.id);
}

#[tokio::test]
async fn outsider_is_forbidden() {
    let f = setup().await;
    let e2 = f
        .onboarding
        .onboard(f.admin.id, actor_input(ActorRole::Employee, "e2"))
        .await
        .unwrap();
    let r1 = f.chain.create_audit(f.e1.id, metadata()).await.unwrap();

    let err = f.chain.access_audit(r1.id, e2.id).await.unwrap_err();
    assert!(matches!(err, ReferlineError::Forbidden { ref reason } if reason == "not in chain"));
}

#[tokio::test]
async fn advancing_past_root_persists_sign_off() {
    let f = setup().await;
    let r1 = f.chain.create_audit(f.e1.id, metadata()).await.unwrap();

    let err = f.chain.advance_audit(r1.id, f.admin.id).await.unwrap_err();
    assert!(
        matches!(err, ReferlineError::Unresolved { ref reason } if reason.ends_with("no parent, cannot advance"))
    );

    let stored = f.chain.ledger().audits().get_by_id(r1.id).await.unwrap();
    assert!(stored.hierarchy[1].updated);
    assert_eq!(stored.status, AuditStatus::Completed);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn onboarded_dsa_walks_back_to_root() {
    let f = setup().await;
    let dsa = f
        .onboarding
        .onboard(f.e1.id, actor_input(ActorRole::Dsa, "dsa"))
        .await
        .unwrap();

    let ancestors = f.onboarding.ancestors(dsa.id).await.unwrap();
    assert_eq!(ancestors, vec![f.e1.id, f.admin.id]);

    let children = f.onboarding.children(f.e1.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].child_id, dsa.id);
    assert_eq!(children[0].child_role, ActorRole::Dsa);
}

#[tokio::test]
async fn pipeline_access_follows_sign_offs() {
    let f = setup().await;
    let dsa = f
        .onboarding
        .onboard(f.e1.id, actor_input(ActorRole::Dsa, "dsa"))
        .await
        .unwrap();
    let r = f.chain.create_audit(dsa.id, metadata()).await.unwrap();
    assert_eq!(r.hierarchy.len(), 3);

    // Admin waits for the employee.
    let err = f.chain.access_audit(r.id, f.admin.id).await.unwrap_err();
    assert!(
        matches!(err, ReferlineError::Forbidden { ref reason } if reason == "predecessor not updated")
    );
    assert!(f.chain.pending_for(f.admin.id).await.unwrap().is_empty());
    assert_eq!(f.chain.pending_for(f.e1.id).await.unwrap().len(), 1);

    let err = f.chain.advance_audit(r.id, f.admin.id).await.unwrap_err();
    assert!(matches!(err, ReferlineError::Forbidden { .. }));

    let advanced = f.chain.advance_audit(r.id, f.e1.id).await.unwrap();
    assert!(advanced.hierarchy[1].updated);
    assert_eq!(advanced.hierarchy.len(), 3);
    assert_eq!(advanced.status, AuditStatus::InProgress);

    f.chain.access_audit(r.id, f.admin.id).await.unwrap();
    assert_eq!(f.chain.pending_for(f.admin.id).await.unwrap().len(), 1);
    assert!(f.chain.pending_for(f.e1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn hierarchy_only_grows() {
    let f = setup().await;
    let dsa = f
        .onboarding
        .onboard(f.e1.id, actor_input(ActorRole::Dsa, "dsa"))
        .await
        .unwrap();
    let r = f.chain.create_audit(dsa.id, metadata()).await.unwrap();
    let ids: Vec<Uuid> = r.hierarchy.iter().map(|e| e.actor_id).collect();

    let after_dsa = f.chain.advance_audit(r.id, dsa.id).await.unwrap();
    let after_e1 = f.chain.advance_audit(r.id, f.e1.id).await.unwrap();
    let _ = f.chain.advance_audit(r.id, f.admin.id).await;
    let done = f.chain.ledger().audits().get_by_id(r.id).await.unwrap();

    for snapshot in [&after_dsa, &after_e1, &done] {
        assert!(snapshot.hierarchy.len() >= ids.len());
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(snapshot.hierarchy[i].actor_id, *id);
        }
    }
    assert_eq!(done.status, AuditStatus::Completed);
    assert!(done.hierarchy.iter().all(|e| e.updated));
}

#[tokio::test]
async fn stale_advance_is_conflict() {
    let f = setup().await;
    let r1 = f.chain.create_audit(f.e1.id, metadata()).await.unwrap();

    // Another writer bumps the version after our read.
    f.chain
        .ledger()
        .audits()
        .replace_hierarchy(r1.id, r1.version, r1.hierarchy.clone(), r1.status)
        .await
        .unwrap();

    let err = f
        .chain
        .ledger()
        .advance_loaded(r1, f.e1.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ReferlineError::Conflict { .. }));
}

#[tokio::test]
async fn root_initiated_audit_is_complete() {
    let f = setup().await;
    let r = f.chain.create_audit(f.admin.id, metadata()).await.unwrap();
    assert_eq!(r.hierarchy.len(), 1);
    assert_eq!(r.status, AuditStatus::Completed);
}

#[tokio::test]
async fn unknown_initiator_is_not_found() {
    let f = setup().await;
    let err = f
        .chain
        .create_audit(Uuid::new_v4(), metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, ReferlineError::NotFound { .. }));
}

#[tokio::test]
async fn second_root_is_rejected() {
    let f = setup().await;
    let err = f
        .onboarding
        .bootstrap_root(actor_input(ActorRole::Admin, "admin2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReferlineError::Conflict { .. }));
}

#[tokio::test]
async fn ineligible_onboarder_is_rejected() {
    let f = setup().await;
    let err = f
        .onboarding
        .onboard(f.admin.id, actor_input(ActorRole::Client, "client"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReferlineError::Validation { .. }));
}

#[tokio::test]
async fn members_of_lists_role() {
    let f = setup().await;
    f.onboarding
        .onboard(f.admin.id, actor_input(ActorRole::Employee, "e2"))
        .await
        .unwrap();

    let employees = f.onboarding.members_of(ActorRole::Employee).await.unwrap();
    assert_eq!(employees.len(), 2);
    let admins = f.onboarding.members_of(ActorRole::Admin).await.unwrap();
    assert_eq!(admins.len(), 1);
}

#[tokio::test]
async fn ancestors_may_update_descendants() {
    let f = setup().await;
    let dsa = f
        .onboarding
        .onboard(f.e1.id, actor_input(ActorRole::Dsa, "dsa"))
        .await
        .unwrap();

    let updated = f
        .onboarding
        .update_actor(
            f.admin.id,
            dsa.id,
            UpdateActor {
                status: Some(ActorStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, ActorStatus::Active);
    assert_eq!(updated.role, ActorRole::Dsa);

    // A descendant may not update its ancestor.
    let err = f
        .onboarding
        .update_actor(
            dsa.id,
            f.e1.id,
            UpdateActor {
                name: Some("renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReferlineError::Forbidden { .. }));
}

#[tokio::test]
async fn concurrent_advances_lose_as_conflict() {
    let f = setup().await;
    let dsa = f
        .onboarding
        .onboard(f.e1.id, actor_input(ActorRole::Dsa, "dsa"))
        .await
        .unwrap();
    let r = f.chain.create_audit(dsa.id, metadata()).await.unwrap();

    let (a, b) = tokio::join!(
        f.chain.advance_audit(r.id, dsa.id),
        f.chain.advance_audit(r.id, dsa.id),
    );

    let outcomes = [a, b];
    assert!(outcomes.iter().any(|o| o.is_ok()));
    for err in outcomes.iter().filter_map(|o| o.as_ref().err()) {
        assert!(
            matches!(err, ReferlineError::Conflict { .. }),
            "unexpected error: {err}"
        );
    }

    let stored = f.chain.ledger().audits().get_by_id(r.id).await.unwrap();
    assert_eq!(stored.hierarchy.len(), 3);
    assert!(stored.version >= 2);
}

#[tokio::test]
async fn concurrent_bootstraps_yield_one_root() {
    let (onboarding, _) = services().await;

    let (a, b) = tokio::join!(
        onboarding.bootstrap_root(actor_input(ActorRole::Admin, "admin1")),
        onboarding.bootstrap_root(actor_input(ActorRole::Admin, "admin2")),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    for err in outcomes.iter().filter_map(|o| o.as_ref().err()) {
        assert!(
            matches!(err, ReferlineError::Conflict { .. }),
            "unexpected error: {err}"
        );
    }
    let admins = onboarding.members_of(ActorRole::Admin).await.unwrap();
    assert_eq!(admins.len(), 1);
}

#[tokio::test]
async fn failed_bootstrap_frees_the_root_slot() {
    let (onboarding, _) = services().await;
    // An admin already holding the email, but with no referral edge.
    onboarding
        .actors()
        .create(actor_input(ActorRole::Admin, "taken"))
        .await
        .unwrap();

    let err = onboarding
        .bootstrap_root(actor_input(ActorRole::Admin, "taken"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReferlineError::Conflict { ref entity, .. } if entity == "actor"));

    let root = onboarding
        .bootstrap_root(actor_input(ActorRole::Admin, "root"))
        .await
        .unwrap();
    assert_eq!(root.role, ActorRole::Admin);
}
