//! SurrealDB implementation of [`ReferralRepository`].
//!
//! Each child's edge is a `referral` record keyed by the child id, so an
//! actor can only ever be recorded once. Child descriptors live on the
//! `onboarded` relation (parent -> child) with a unique `(in, out)` index.
//! A fixed `referral_root:singleton` record serialises root bootstraps.

use chrono::{DateTime, Utc};
use referline_core::error::{ReferlineError, ReferlineResult};
use referline_core::models::actor::ActorRole;
use referline_core::models::referral::{ChildDescriptor, RecordEdge, ReferralEdge};
use referline_core::repository::ReferralRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::actor::parse_role;
use crate::error::{DbError, is_write_race, parse_uuid, statement_error};

#[derive(Debug, SurrealValue)]
struct ReferralRow {
    child_role: String,
    parent_id: Option<String>,
    is_root: bool,
    created_at: DateTime<Utc>,
}

impl ReferralRow {
    fn into_edge(self, child_id: Uuid) -> Result<ReferralEdge, DbError> {
        let parent_id = self
            .parent_id
            .map(|p| parse_uuid(&p, "parent"))
            .transpose()?;
        Ok(ReferralEdge {
            child_id,
            child_role: parse_role(&self.child_role)?,
            parent_id,
            is_root: self.is_root,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct DescriptorRow {
    child_id: String,
    child_role: String,
    level: u64,
    added_at: DateTime<Utc>,
}

impl DescriptorRow {
    fn try_into_descriptor(self) -> Result<ChildDescriptor, DbError> {
        let level = u8::try_from(self.level)
            .map_err(|_| DbError::Decode(format!("level out of range: {}", self.level)))?;
        Ok(ChildDescriptor {
            child_id: parse_uuid(&self.child_id, "child")?,
            child_role: parse_role(&self.child_role)?,
            level,
            added_at: self.added_at,
        })
    }
}

/// Record id of the single-root claim.
const ROOT_SLOT: &str = "singleton";

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the referral graph.
#[derive(Clone)]
pub struct SurrealReferralRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealReferralRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_edge(&self, child_id: Uuid) -> Result<Option<ReferralEdge>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('referral', $id)")
            .bind(("id", child_id.to_string()))
            .await?;

        let rows: Vec<ReferralRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_edge(child_id))
            .transpose()
    }
}

impl<C: Connection> ReferralRepository for SurrealReferralRepository<C> {
    async fn record_edge(&self, input: RecordEdge) -> ReferlineResult<ReferralEdge> {
        let child_id = input.child_id;
        if input.parent_id == Some(child_id) {
            return Err(ReferlineError::validation(format!(
                "actor {child_id} cannot be its own parent"
            )));
        }
        if input.parent_id.is_none() && !input.child_role.may_be_root() {
            return Err(ReferlineError::validation(format!(
                "a {} cannot be a referral root",
                input.child_role
            )));
        }

        if self.find_edge(child_id).await?.is_some() {
            return Err(ReferlineError::conflict(
                "referral",
                format!("actor {child_id} has already been onboarded"),
            ));
        }
        if let Some(parent_id) = input.parent_id
            && self.find_edge(parent_id).await?.is_none()
        {
            return Err(ReferlineError::validation(format!(
                "parent {parent_id} is not part of the referral graph"
            )));
        }

        let id_str = child_id.to_string();
        let result = self
            .db
            .query(
                "CREATE type::record('referral', $id) SET \
                 child_role = $child_role, \
                 parent_id = $parent_id, \
                 is_root = $is_root",
            )
            .bind(("id", id_str.clone()))
            .bind(("child_role", input.child_role.as_str()))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .bind(("is_root", input.parent_id.is_none()))
            .await
            .map_err(DbError::from)?;

        // A concurrent onboarding of the same child loses on the record id.
        let mut result = result.check().map_err(|e| {
            statement_error(e, "referral", || {
                format!("actor {child_id} has already been onboarded")
            })
        })?;

        let rows: Vec<ReferralRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "referral".into(),
            id: id_str,
        })?;

        debug!(child_id = %child_id, parent_id = ?input.parent_id, "Referral edge recorded");
        row.into_edge(child_id).map_err(Into::into)
    }

    async fn append_child_descriptor(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
        child_role: ActorRole,
    ) -> ReferlineResult<()> {
        let parent_id_str = parent_id.to_string();
        let child_id_str = child_id.to_string();

        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM onboarded \
                 WHERE in = type::record('actor', $parent_id) \
                 AND out = type::record('actor', $child_id) GROUP ALL",
            )
            .bind(("parent_id", parent_id_str.clone()))
            .bind(("child_id", child_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let existing: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if existing.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Ok(());
        }

        let query = format!(
            "RELATE actor:`{parent_id_str}` -> onboarded -> actor:`{child_id_str}` \
             SET child_role = $child_role, level = $level;"
        );

        let result = self
            .db
            .query(query)
            .bind(("child_role", child_role.as_str()))
            .bind(("level", u64::from(child_role.level())))
            .await
            .map_err(DbError::from)?;

        // Losing a race against the unique (in, out) index still leaves
        // exactly one descriptor behind.
        match result.check() {
            Ok(_) => Ok(()),
            Err(e) if is_write_race(&e.to_string()) => Ok(()),
            Err(e) => Err(DbError::Query(e.to_string()).into()),
        }
    }

    async fn get_edge(&self, child_id: Uuid) -> ReferlineResult<ReferralEdge> {
        self.find_edge(child_id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "referral".into(),
                id: child_id.to_string(),
            }
            .into()
        })
    }

    async fn get_parent(&self, child_id: Uuid) -> ReferlineResult<Option<Uuid>> {
        let edge = self.get_edge(child_id).await?;
        Ok(edge.parent_id)
    }

    async fn get_children(&self, parent_id: Uuid) -> ReferlineResult<Vec<ChildDescriptor>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(out) AS child_id, child_role, level, added_at \
                 FROM onboarded \
                 WHERE in = type::record('actor', $parent_id) \
                 ORDER BY added_at ASC",
            )
            .bind(("parent_id", parent_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DescriptorRow> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_descriptor())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn count_roots(&self) -> ReferlineResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM referral WHERE is_root = true GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn claim_root_slot(&self) -> ReferlineResult<()> {
        let taken = || "the root slot is already claimed".to_string();
        let result = self
            .db
            .query("CREATE type::record('referral_root', $slot)")
            .bind(("slot", ROOT_SLOT))
            .await
            .map_err(|e| statement_error(e, "referral", taken))?;

        result
            .check()
            .map_err(|e| statement_error(e, "referral", taken))?;
        debug!("Referral root slot claimed");
        Ok(())
    }

    async fn release_root_slot(&self) -> ReferlineResult<()> {
        self.db
            .query("DELETE type::record('referral_root', $slot)")
            .bind(("slot", ROOT_SLOT))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}
