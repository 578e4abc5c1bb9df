//! Database initialization
//!
//! Opens (or creates) the SQLite database and applies the schema. Every
//! statement is `CREATE ... IF NOT EXISTS`, so initialization is idempotent and
//! runs on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Name of the reserved waste type used for negative classifications
pub const NOT_GARBAGE: &str = "Not Garbage";

/// Open the database at `db_path`, creating file and schema if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas must go through the connect options
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Apply the full schema to an already-open pool
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_locations_table(pool).await?;
    create_reports_table(pool).await?;
    create_waste_types_table(pool).await?;
    create_analysis_results_table(pool).await?;
    create_hotspots_table(pool).await?;
    create_hotspot_reports_table(pool).await?;
    create_image_processing_queue_table(pool).await?;
    create_system_logs_table(pool).await?;

    seed_not_garbage_type(pool).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_locations_coords ON locations(latitude, longitude)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            location_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'submitted'
                CHECK (status IN ('submitted', 'analyzing', 'analyzed', 'resolved')),
            image_url TEXT,
            device_info TEXT,
            reported_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reports_status_coords ON reports(status, latitude, longitude)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_waste_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS waste_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            description TEXT NOT NULL DEFAULT '',
            hazard_level TEXT NOT NULL DEFAULT 'medium'
                CHECK (hazard_level IN ('low', 'medium', 'high')),
            recyclable INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_analysis_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL UNIQUE REFERENCES reports(id) ON DELETE CASCADE,
            analyzed_at TEXT NOT NULL,
            waste_type_id INTEGER NOT NULL REFERENCES waste_types(id),
            confidence_score REAL NOT NULL,
            estimated_volume REAL NOT NULL DEFAULT 0 CHECK (estimated_volume >= 0),
            severity_score INTEGER NOT NULL CHECK (severity_score BETWEEN 1 AND 10),
            priority_level TEXT NOT NULL
                CHECK (priority_level IN ('low', 'medium', 'high', 'critical')),
            analysis_notes TEXT NOT NULL DEFAULT '',
            full_description TEXT NOT NULL DEFAULT '',
            processed_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_hotspots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hotspots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            center_latitude REAL NOT NULL,
            center_longitude REAL NOT NULL,
            radius_meters INTEGER NOT NULL DEFAULT 500,
            location_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
            first_reported TEXT NOT NULL,
            last_reported TEXT NOT NULL,
            total_reports INTEGER NOT NULL DEFAULT 0,
            average_severity REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'monitoring', 'resolved'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hotspots_center ON hotspots(center_latitude, center_longitude)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_hotspot_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hotspot_reports (
            hotspot_id INTEGER NOT NULL REFERENCES hotspots(id) ON DELETE CASCADE,
            report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
            linked_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (hotspot_id, report_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_image_processing_queue_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_processing_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL UNIQUE REFERENCES reports(id) ON DELETE CASCADE,
            image_url TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed')),
            queued_at TEXT NOT NULL,
            processed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_system_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS system_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL,
            related_id INTEGER,
            related_table TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_not_garbage_type(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO waste_types (name, description, hazard_level, recyclable)
        VALUES (?, 'Images that do not contain waste materials', 'low', 0)
        "#,
    )
    .bind(NOT_GARBAGE)
    .execute(pool)
    .await?;

    Ok(())
}
