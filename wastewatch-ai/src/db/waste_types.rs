//! Waste taxonomy
//!
//! Types are created on first sight of a classifier label. Names compare
//! case-insensitively (`COLLATE NOCASE` on the column), so "plastic" and
//! "Plastic" resolve to one row.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use wastewatch_common::db::{WasteType, WasteTypeDefaults};
use wastewatch_common::{Error, Result};

fn waste_type_from_row(row: &SqliteRow) -> Result<WasteType> {
    let hazard_level: String = row.get("hazard_level");
    let recyclable: i64 = row.get("recyclable");

    Ok(WasteType {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        hazard_level: hazard_level.parse()?,
        recyclable: recyclable != 0,
    })
}

/// Trim and collapse internal whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Look up a waste type by name, creating it with `defaults` if absent.
///
/// Idempotent: concurrent callers with the same name converge on one row
/// because the insert is `OR IGNORE` against the unique name.
pub async fn get_or_create_waste_type(
    conn: &mut SqliteConnection,
    name: &str,
    defaults: &WasteTypeDefaults,
) -> Result<WasteType> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(Error::InvalidInput("waste type name is empty".to_string()));
    }

    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO waste_types (name, description, hazard_level, recyclable)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&name)
    .bind(&defaults.description)
    .bind(defaults.hazard_level.as_str())
    .bind(i64::from(defaults.recyclable))
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        tracing::info!(waste_type = %name, "Created waste type");
    }

    let row = sqlx::query(
        "SELECT id, name, description, hazard_level, recyclable FROM waste_types WHERE name = ?",
    )
    .bind(&name)
    .fetch_one(&mut *conn)
    .await?;

    waste_type_from_row(&row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wastewatch_common::db::{init_database, HazardLevel, NOT_GARBAGE};

    #[tokio::test]
    async fn test_get_or_create_is_case_insensitive_and_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("wastewatch.db")).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = get_or_create_waste_type(
            &mut conn,
            "Plastic",
            &WasteTypeDefaults::auto_generated("Plastic"),
        )
        .await
        .unwrap();
        let second = get_or_create_waste_type(
            &mut conn,
            "  plastic ",
            &WasteTypeDefaults::auto_generated("plastic"),
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Plastic");
        assert_eq!(first.hazard_level, HazardLevel::Medium);
        assert!(!first.recyclable);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM waste_types WHERE name = 'Plastic'")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_seeded_not_garbage_is_reused() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("wastewatch.db")).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let waste_type =
            get_or_create_waste_type(&mut conn, NOT_GARBAGE, &WasteTypeDefaults::not_garbage())
                .await
                .unwrap();

        assert_eq!(waste_type.hazard_level, HazardLevel::Low);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM waste_types")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("wastewatch.db")).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let result =
            get_or_create_waste_type(&mut conn, "   ", &WasteTypeDefaults::auto_generated("")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Mixed   Waste "), "Mixed Waste");
    }
}
