//! SurrealDB implementation of [`ActorRepository`].

use chrono::{DateTime, Utc};
use referline_core::error::{ReferlineError, ReferlineResult};
use referline_core::models::actor::{
    Actor, ActorRole, ActorStatus, CreateActor, KycStatus, RoleProfile, UpdateActor,
};
use referline_core::repository::{ActorRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid, statement_error};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ActorRow {
    role: String,
    name: String,
    email: String,
    phone: Option<String>,
    credential_hash: Option<String>,
    status: String,
    kyc_status: String,
    profile: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ActorRowWithId {
    record_id: String,
    role: String,
    name: String,
    email: String,
    phone: Option<String>,
    credential_hash: Option<String>,
    status: String,
    kyc_status: String,
    profile: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RoleRow {
    role: String,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

pub(crate) fn parse_role(s: &str) -> Result<ActorRole, DbError> {
    s.parse::<ActorRole>()
        .map_err(|_| DbError::Decode(format!("unknown actor role: {s}")))
}

fn parse_status(s: &str) -> Result<ActorStatus, DbError> {
    match s {
        "PendingVerification" => Ok(ActorStatus::PendingVerification),
        "Active" => Ok(ActorStatus::Active),
        "Inactive" => Ok(ActorStatus::Inactive),
        other => Err(DbError::Decode(format!("unknown actor status: {other}"))),
    }
}

fn status_to_string(s: &ActorStatus) -> &'static str {
    match s {
        ActorStatus::PendingVerification => "PendingVerification",
        ActorStatus::Active => "Active",
        ActorStatus::Inactive => "Inactive",
    }
}

fn parse_kyc(s: &str) -> Result<KycStatus, DbError> {
    match s {
        "NotSubmitted" => Ok(KycStatus::NotSubmitted),
        "Submitted" => Ok(KycStatus::Submitted),
        "Verified" => Ok(KycStatus::Verified),
        "Rejected" => Ok(KycStatus::Rejected),
        other => Err(DbError::Decode(format!("unknown KYC status: {other}"))),
    }
}

fn kyc_to_string(s: &KycStatus) -> &'static str {
    match s {
        KycStatus::NotSubmitted => "NotSubmitted",
        KycStatus::Submitted => "Submitted",
        KycStatus::Verified => "Verified",
        KycStatus::Rejected => "Rejected",
    }
}

fn parse_profile(value: serde_json::Value) -> Result<RoleProfile, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("invalid profile: {e}")))
}

impl ActorRow {
    fn into_actor(self, id: Uuid) -> Result<Actor, DbError> {
        Ok(Actor {
            id,
            role: parse_role(&self.role)?,
            name: self.name,
            email: self.email,
            phone: self.phone,
            credential_hash: self.credential_hash,
            status: parse_status(&self.status)?,
            kyc_status: parse_kyc(&self.kyc_status)?,
            profile: parse_profile(self.profile)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ActorRowWithId {
    fn try_into_actor(self) -> Result<Actor, DbError> {
        let id = parse_uuid(&self.record_id, "actor")?;
        ActorRow {
            role: self.role,
            name: self.name,
            email: self.email,
            phone: self.phone,
            credential_hash: self.credential_hash,
            status: self.status,
            kyc_status: self.kyc_status,
            profile: self.profile,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_actor(id)
    }
}

/// SurrealDB implementation of the identity store.
#[derive(Clone)]
pub struct SurrealActorRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealActorRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Reject the onboarding request unless the parent exists and its
    /// role may onboard `child_role`.
    async fn check_parent(&self, parent_id: Uuid, child_role: ActorRole) -> ReferlineResult<()> {
        let mut result = self
            .db
            .query("SELECT role FROM type::record('actor', $id)")
            .bind(("id", parent_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Err(ReferlineError::validation(format!(
                "parent actor {parent_id} does not exist"
            )));
        };

        let parent_role = parse_role(&row.role)?;
        if !parent_role.can_onboard(child_role) {
            return Err(ReferlineError::validation(format!(
                "a {parent_role} cannot onboard a {child_role}"
            )));
        }
        Ok(())
    }
}

impl<C: Connection> ActorRepository for SurrealActorRepository<C> {
    async fn create(&self, input: CreateActor) -> ReferlineResult<Actor> {
        let profile = input.validated_profile()?;
        if let Some(parent_id) = input.parent_id {
            self.check_parent(parent_id, input.role).await?;
        }

        let email = input.email.clone();
        let mut check = self
            .db
            .query("SELECT count() AS total FROM actor WHERE email = $email GROUP ALL")
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;
        let existing: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if existing.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Err(ReferlineError::conflict(
                "actor",
                format!("email {email} is already registered"),
            ));
        }

        let taken = || format!("email {email} is already registered");
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let profile_json = serde_json::to_value(&profile)
            .map_err(|e| ReferlineError::Internal(format!("profile encode: {e}")))?;

        let result = self
            .db
            .query(
                "CREATE type::record('actor', $id) SET \
                 role = $role, name = $name, email = $email, \
                 phone = $phone, credential_hash = $credential_hash, \
                 status = $status, kyc_status = $kyc_status, \
                 profile = $profile",
            )
            .bind(("id", id_str.clone()))
            .bind(("role", input.role.as_str()))
            .bind(("name", input.name))
            .bind(("email", email.clone()))
            .bind(("phone", input.phone))
            .bind(("credential_hash", input.credential_hash))
            .bind((
                "status",
                status_to_string(&ActorStatus::PendingVerification),
            ))
            .bind(("kyc_status", kyc_to_string(&KycStatus::NotSubmitted)))
            .bind(("profile", profile_json))
            .await
            .map_err(|e| statement_error(e, "actor", taken))?;

        // The count above does not stop a concurrent writer; the unique
        // email index does.
        let mut result = result
            .check()
            .map_err(|e| statement_error(e, "actor", taken))?;

        let rows: Vec<ActorRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "actor".into(),
            id: id_str,
        })?;

        debug!(actor_id = %id, role = %input.role, "Actor created");
        row.into_actor(id).map_err(Into::into)
    }

    async fn get_by_id(&self, id: Uuid) -> ReferlineResult<Actor> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('actor', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ActorRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "actor".into(),
            id: id_str,
        })?;

        row.into_actor(id).map_err(Into::into)
    }

    async fn update(&self, id: Uuid, input: UpdateActor) -> ReferlineResult<Actor> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ReferlineError::validation("actor name is required"));
        }
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.kyc_status.is_some() {
            sets.push("kyc_status = $kyc_status");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('actor', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status_to_string(&status)));
        }
        if let Some(kyc_status) = input.kyc_status {
            builder = builder.bind(("kyc_status", kyc_to_string(&kyc_status)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ActorRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "actor".into(),
            id: id_str,
        })?;

        row.into_actor(id).map_err(Into::into)
    }

    async fn list_by_role(
        &self,
        role: ActorRole,
        pagination: Pagination,
    ) -> ReferlineResult<PaginatedResult<Actor>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM actor WHERE role = $role GROUP ALL")
            .bind(("role", role.as_str()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM actor \
                 WHERE role = $role \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("role", role.as_str()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ActorRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_actor())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
