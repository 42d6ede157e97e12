//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use surrealdb_types::SurrealValue;

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    referline_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("actor"), "missing actor table");
    assert!(info_str.contains("referral"), "missing referral table");
    assert!(info_str.contains("loan_audit"), "missing loan_audit table");
    assert!(info_str.contains("onboarded"), "missing onboarded edge");
    assert!(info_str.contains("referral_root"), "missing referral_root table");
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    referline_db::run_migrations(&db).await.unwrap();
    referline_db::run_migrations(&db).await.unwrap();

    let mut result = db
        .query("SELECT count() AS total FROM _migration GROUP ALL")
        .await
        .unwrap();
    let rows: Vec<CountRow> = result.take(0).unwrap();
    assert_eq!(rows.first().map(|r| r.total), Some(2));
}

#[tokio::test]
async fn newer_schema_is_refused() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    referline_db::run_migrations(&db).await.unwrap();

    db.query("CREATE _migration SET version = 99, name = 'from_the_future'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let err = referline_db::run_migrations(&db).await.unwrap_err();
    assert!(matches!(err, referline_db::DbError::Migration(_)));
    assert!(err.to_string().contains("v99"));
}
