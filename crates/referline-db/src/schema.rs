//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "referral_and_audit_chain",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "referral_root_slot",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Actors (identity store)
-- =======================================================================
DEFINE TABLE actor SCHEMAFULL;
DEFINE FIELD role ON TABLE actor TYPE string \
    ASSERT $value IN ['admin', 'employee', 'sub_employee', 'dsa', \
    'sub_dsa', 'client', 'call_centre'];
DEFINE FIELD name ON TABLE actor TYPE string;
DEFINE FIELD email ON TABLE actor TYPE string;
DEFINE FIELD phone ON TABLE actor TYPE option<string>;
DEFINE FIELD credential_hash ON TABLE actor TYPE option<string>;
DEFINE FIELD status ON TABLE actor TYPE string \
    ASSERT $value IN ['PendingVerification', 'Active', 'Inactive'];
DEFINE FIELD kyc_status ON TABLE actor TYPE string \
    ASSERT $value IN ['NotSubmitted', 'Submitted', 'Verified', 'Rejected'];
DEFINE FIELD profile ON TABLE actor TYPE object FLEXIBLE;
DEFINE FIELD created_at ON TABLE actor TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE actor TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_actor_email ON TABLE actor COLUMNS email UNIQUE;
DEFINE INDEX idx_actor_role ON TABLE actor COLUMNS role;

-- =======================================================================
-- Referral edges (child -> parent, record id = child id)
-- =======================================================================
DEFINE TABLE referral SCHEMAFULL;
DEFINE FIELD child_role ON TABLE referral TYPE string;
DEFINE FIELD parent_id ON TABLE referral TYPE option<string>;
DEFINE FIELD is_root ON TABLE referral TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE referral TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_referral_parent ON TABLE referral COLUMNS parent_id;

-- =======================================================================
-- Loan audits (hierarchy list + compare-and-swap version)
-- =======================================================================
DEFINE TABLE loan_audit SCHEMAFULL;
DEFINE FIELD client_name ON TABLE loan_audit TYPE string;
DEFINE FIELD bank_name ON TABLE loan_audit TYPE string;
DEFINE FIELD loan_type ON TABLE loan_audit TYPE string;
DEFINE FIELD loan_amount ON TABLE loan_audit TYPE int;
DEFINE FIELD content ON TABLE loan_audit TYPE string DEFAULT '';
DEFINE FIELD hierarchy ON TABLE loan_audit TYPE array<object>;
DEFINE FIELD hierarchy.*.actor_id ON TABLE loan_audit TYPE string;
DEFINE FIELD hierarchy.*.actor_role ON TABLE loan_audit TYPE string;
DEFINE FIELD hierarchy.*.updated ON TABLE loan_audit TYPE bool;
DEFINE FIELD participants ON TABLE loan_audit TYPE array;
DEFINE FIELD participants.* ON TABLE loan_audit TYPE string;
DEFINE FIELD status ON TABLE loan_audit TYPE string \
    ASSERT $value IN ['InProgress', 'Completed'];
DEFINE FIELD version ON TABLE loan_audit TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE loan_audit TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE loan_audit TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- Parent actor -> child actor, carrying the cached child descriptor
DEFINE TABLE onboarded TYPE RELATION SCHEMAFULL;
DEFINE FIELD child_role ON TABLE onboarded TYPE string;
DEFINE FIELD level ON TABLE onboarded TYPE int;
DEFINE FIELD added_at ON TABLE onboarded TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_onboarded_pair ON TABLE onboarded COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2
// -----------------------------------------------------------------------

// One fixed record (`referral_root:singleton`). Creating it is how a
// bootstrap claims the root; the record id makes the claim exclusive.
const SCHEMA_V2: &str = "\
DEFINE TABLE referral_root SCHEMAFULL;
DEFINE FIELD claimed_at ON TABLE referral_root TYPE datetime \
    DEFAULT time::now();
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Migrations at or below the highest recorded version are skipped. A
/// database recorded at a version this build does not know is refused
/// rather than run against an older schema.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current_version = recorded_version(db).await?;
    let latest = latest_version();
    if current_version > latest {
        return Err(DbError::Migration(format!(
            "database is at schema v{current_version}, this build only knows v{latest}"
        )));
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect();
    if pending.is_empty() {
        info!(version = current_version, "Schema is up to date");
        return Ok(());
    }

    for migration in pending {
        apply(db, migration).await?;
    }
    Ok(())
}

async fn recorded_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    info!(
        version = migration.version,
        name = migration.name,
        "Applying migration"
    );
    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "v{} '{}' failed: {e}",
            migration.version, migration.name
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!("could not record v{}: {e}", migration.version))
        })?;

    info!(version = migration.version, "Migration applied");
    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
