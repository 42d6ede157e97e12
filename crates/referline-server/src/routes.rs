//! Router construction and request handlers.
//!
//! GET  /health                  liveness
//! POST /audits                  create an audit initiated by the caller
//! GET  /audits/pending          audits the caller may sign off now
//! GET  /audits/:id              read an audit through the access gate
//! PUT  /audits/:id/advance      sign off and advance the chain
//! POST /actors                  onboard an actor under the caller
//! GET  /actors?role=            list actors holding a role
//! GET  /actors/:id              fetch an actor
//! PATCH /actors/:id             update an actor (self or ancestor)
//! GET  /actors/:id/children     child descriptors
//! GET  /actors/:id/ancestors    ancestor ids, nearest first

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router, middleware};
use referline_chain::{AuditChainLedger, AuditChainService, ChainConfig, OnboardingService};
use referline_core::models::actor::{Actor, ActorRole, CreateActor, RoleProfile, UpdateActor};
use referline_core::models::loan_audit::{LoanAudit, LoanAuditMetadata};
use referline_core::models::referral::ChildDescriptor;
use referline_core::repository::ActorRepository;
use referline_db::repository::{
    SurrealActorRepository, SurrealLoanAuditRepository, SurrealReferralRepository,
};
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::caller::{Caller, CallerVerifier, require_caller};
use crate::error::ApiError;

type Onboarding = OnboardingService<SurrealActorRepository<Any>, SurrealReferralRepository<Any>>;
type Chain = AuditChainService<
    SurrealActorRepository<Any>,
    SurrealReferralRepository<Any>,
    SurrealLoanAuditRepository<Any>,
>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub onboarding: Arc<Onboarding>,
    pub chain: Arc<Chain>,
    pub verifier: Arc<CallerVerifier>,
}

impl AppState {
    pub fn new(db: Surreal<Any>, config: ChainConfig, verifier: CallerVerifier) -> Self {
        let onboarding = OnboardingService::new(
            SurrealActorRepository::new(db.clone()),
            SurrealReferralRepository::new(db.clone()),
            config.clone(),
        );
        let ledger = AuditChainLedger::new(
            SurrealActorRepository::new(db.clone()),
            SurrealReferralRepository::new(db.clone()),
            SurrealLoanAuditRepository::new(db),
            config,
        );
        Self {
            onboarding: Arc::new(onboarding),
            chain: Arc::new(AuditChainService::new(ledger)),
            verifier: Arc::new(verifier),
        }
    }
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/audits", post(create_audit))
        .route("/audits/pending", get(pending_audits))
        .route("/audits/:id", get(get_audit))
        .route("/audits/:id/advance", put(advance_audit))
        .route("/actors", post(onboard_actor).get(list_actors))
        .route("/actors/:id", get(get_actor).patch(update_actor))
        .route("/actors/:id/children", get(actor_children))
        .route("/actors/:id/ancestors", get(actor_ancestors))
        .layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_caller,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

// === Audits ===

#[derive(Debug, Deserialize)]
pub struct CreateAuditRequest {
    pub metadata: LoanAuditMetadata,
}

async fn create_audit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<CreateAuditRequest>,
) -> Result<(StatusCode, Json<LoanAudit>), ApiError> {
    let audit = state
        .chain
        .create_audit(caller.actor_id, body.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(audit)))
}

async fn get_audit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<LoanAudit>, ApiError> {
    Ok(Json(state.chain.access_audit(id, caller.actor_id).await?))
}

async fn advance_audit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<LoanAudit>, ApiError> {
    Ok(Json(state.chain.advance_audit(id, caller.actor_id).await?))
}

async fn pending_audits(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<LoanAudit>>, ApiError> {
    Ok(Json(state.chain.pending_for(caller.actor_id).await?))
}

// === Actors ===

#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub role: ActorRole,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile: Option<RoleProfile>,
    pub credential_hash: Option<String>,
}

async fn onboard_actor(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<OnboardRequest>,
) -> Result<(StatusCode, Json<Actor>), ApiError> {
    let input = CreateActor {
        role: body.role,
        parent_id: Some(caller.actor_id),
        name: body.name,
        email: body.email,
        phone: body.phone,
        credential_hash: body.credential_hash,
        profile: body.profile,
    };
    let actor = state.onboarding.onboard(caller.actor_id, input).await?;
    Ok((StatusCode::CREATED, Json(actor)))
}

#[derive(Debug, Deserialize)]
pub struct ListActorsQuery {
    pub role: ActorRole,
}

async fn list_actors(
    State(state): State<AppState>,
    Query(query): Query<ListActorsQuery>,
) -> Result<Json<Vec<Actor>>, ApiError> {
    Ok(Json(state.onboarding.members_of(query.role).await?))
}

async fn get_actor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Actor>, ApiError> {
    Ok(Json(state.onboarding.actors().get_by_id(id).await?))
}

async fn update_actor(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateActor>,
) -> Result<Json<Actor>, ApiError> {
    Ok(Json(
        state
            .onboarding
            .update_actor(caller.actor_id, id, body)
            .await?,
    ))
}

async fn actor_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChildDescriptor>>, ApiError> {
    Ok(Json(state.onboarding.children(id).await?))
}

async fn actor_ancestors(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    Ok(Json(state.onboarding.ancestors(id).await?))
}
