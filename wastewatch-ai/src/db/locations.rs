//! Named places used to label reports and hotspots

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use wastewatch_common::db::Location;
use wastewatch_common::geo::BoundingBox;
use wastewatch_common::{GeoPoint, Result};

fn location_from_row(row: &SqliteRow) -> Location {
    Location {
        id: row.get("id"),
        name: row.get("name"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
    }
}

pub async fn insert_location<'c, E>(executor: E, name: &str, point: &GeoPoint) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO locations (name, latitude, longitude) VALUES (?, ?, ?)")
        .bind(name)
        .bind(point.latitude)
        .bind(point.longitude)
        .execute(executor)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_location<'c, E>(executor: E, location_id: i64) -> Result<Option<Location>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, name, latitude, longitude FROM locations WHERE id = ?")
        .bind(location_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.as_ref().map(location_from_row))
}

/// Closest known location strictly within `max_km` of `point`
pub async fn nearest_location<'c, E>(
    executor: E,
    point: &GeoPoint,
    max_km: f64,
) -> Result<Option<Location>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let bbox = BoundingBox::around(point, max_km);
    let rows = sqlx::query(
        r#"
        SELECT id, name, latitude, longitude
        FROM locations
        WHERE latitude BETWEEN ? AND ?
          AND longitude BETWEEN ? AND ?
        "#,
    )
    .bind(bbox.min_latitude)
    .bind(bbox.max_latitude)
    .bind(bbox.min_longitude)
    .bind(bbox.max_longitude)
    .fetch_all(executor)
    .await?;

    let nearest = rows
        .iter()
        .map(location_from_row)
        .map(|loc| {
            let distance = point.distance_km(&GeoPoint::new(loc.latitude, loc.longitude));
            (loc, distance)
        })
        .filter(|(_, distance)| *distance < max_km)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(loc, _)| loc);

    Ok(nearest)
}
