//! Tests for database initialization
//!
//! Covers first-run creation, idempotent re-open, the seeded "Not Garbage"
//! waste type and the schema constraints the analysis pipeline relies on.

use tempfile::TempDir;
use wastewatch_common::db::init::{init_database, NOT_GARBAGE};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("wastewatch.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("wastewatch.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Schema creation must be idempotent
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("wastewatch.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "analysis_results",
        "hotspot_reports",
        "hotspots",
        "image_processing_queue",
        "locations",
        "reports",
        "system_logs",
        "users",
        "waste_types",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_not_garbage_type_seeded_once() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("wastewatch.db");

    let _ = init_database(&db_path).await.unwrap();
    let pool = init_database(&db_path).await.unwrap();

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT hazard_level, recyclable FROM waste_types WHERE name = ?",
    )
    .bind(NOT_GARBAGE)
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "low");
    assert_eq!(rows[0].1, 0);
}

#[tokio::test]
async fn test_hotspot_membership_primary_key_rejects_duplicates() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("wastewatch.db")).await.unwrap();

    sqlx::query("INSERT INTO users (id, username) VALUES (1, 'reporter')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO reports (id, user_id, latitude, longitude, reported_at) VALUES (1, 1, -8.55, 125.56, '2026-10-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO hotspots (id, name, center_latitude, center_longitude, first_reported, last_reported) VALUES (1, 'h', -8.55, 125.56, '2026-10-01', '2026-10-01')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO hotspot_reports (hotspot_id, report_id) VALUES (1, 1)")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate = sqlx::query("INSERT INTO hotspot_reports (hotspot_id, report_id) VALUES (1, 1)")
        .execute(&pool)
        .await;

    assert!(duplicate.is_err(), "duplicate membership row must be rejected");
}

#[tokio::test]
async fn test_severity_check_constraint() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("wastewatch.db")).await.unwrap();

    sqlx::query("INSERT INTO users (id, username) VALUES (1, 'reporter')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO reports (id, user_id, latitude, longitude, reported_at) VALUES (1, 1, 0, 0, '2026-10-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO analysis_results (report_id, analyzed_at, waste_type_id, confidence_score,
            severity_score, priority_level, processed_by)
        VALUES (1, '2026-10-01T00:00:00Z', 1, 90, 11, 'high', 'test')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "severity 11 must violate the CHECK constraint");
}
