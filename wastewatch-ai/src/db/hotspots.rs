//! Hotspot persistence and membership

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use wastewatch_common::db::{Hotspot, HotspotStatus, PriorityLevel, ReportStatus};
use wastewatch_common::geo::BoundingBox;
use wastewatch_common::{Error, GeoPoint, Result};

use super::{format_date, parse_date, parse_timestamp};
use crate::models::{HotspotMember, HotspotSummary, Page};

const HOTSPOT_COLUMNS: &str = "h.id, h.name, h.center_latitude, h.center_longitude, \
     h.radius_meters, h.location_id, h.first_reported, h.last_reported, h.total_reports, \
     h.average_severity, h.status";

/// Insert payload for a new hotspot
#[derive(Debug, Clone)]
pub struct NewHotspot {
    pub name: String,
    pub center: GeoPoint,
    pub radius_meters: i64,
    pub location_id: Option<i64>,
    pub reported_on: NaiveDate,
    pub total_reports: i64,
    pub average_severity: f64,
}

fn hotspot_from_row(row: &SqliteRow) -> Result<Hotspot> {
    let first_reported: String = row.get("first_reported");
    let last_reported: String = row.get("last_reported");
    let status: String = row.get("status");

    Ok(Hotspot {
        id: row.get("id"),
        name: row.get("name"),
        center_latitude: row.get("center_latitude"),
        center_longitude: row.get("center_longitude"),
        radius_meters: row.get("radius_meters"),
        location_id: row.get("location_id"),
        first_reported: parse_date(&first_reported)?,
        last_reported: parse_date(&last_reported)?,
        total_reports: row.get("total_reports"),
        average_severity: row.get("average_severity"),
        status: status.parse()?,
    })
}

/// Hotspots whose centre lies strictly within `radius_km` of `point`, in
/// creation order
pub async fn hotspots_near<'c, E>(
    executor: E,
    point: &GeoPoint,
    radius_km: f64,
) -> Result<Vec<(Hotspot, f64)>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let bbox = BoundingBox::around(point, radius_km);
    let sql = format!(
        r#"
        SELECT {}
        FROM hotspots h
        WHERE h.center_latitude BETWEEN ? AND ?
          AND h.center_longitude BETWEEN ? AND ?
        ORDER BY h.id
        "#,
        HOTSPOT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(bbox.min_latitude)
        .bind(bbox.max_latitude)
        .bind(bbox.min_longitude)
        .bind(bbox.max_longitude)
        .fetch_all(executor)
        .await?;

    let mut found = Vec::new();
    for row in &rows {
        let hotspot = hotspot_from_row(row)?;
        let distance = point.distance_km(&hotspot.center());
        if distance < radius_km {
            found.push((hotspot, distance));
        }
    }
    Ok(found)
}

pub async fn insert_hotspot<'c, E>(executor: E, hotspot: &NewHotspot) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let reported_on = format_date(hotspot.reported_on);
    let result = sqlx::query(
        r#"
        INSERT INTO hotspots (
            name, center_latitude, center_longitude, radius_meters, location_id,
            first_reported, last_reported, total_reports, average_severity, status
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&hotspot.name)
    .bind(hotspot.center.latitude)
    .bind(hotspot.center.longitude)
    .bind(hotspot.radius_meters)
    .bind(hotspot.location_id)
    .bind(&reported_on)
    .bind(&reported_on)
    .bind(hotspot.total_reports)
    .bind(hotspot.average_severity)
    .bind(HotspotStatus::Active.as_str())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Record fresh activity on an existing hotspot
pub async fn touch_hotspot<'c, E>(
    executor: E,
    hotspot_id: i64,
    reported_on: NaiveDate,
    total_reports: i64,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result =
        sqlx::query("UPDATE hotspots SET last_reported = ?, total_reports = ? WHERE id = ?")
            .bind(format_date(reported_on))
            .bind(total_reports)
            .bind(hotspot_id)
            .execute(executor)
            .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Hotspot {} not found", hotspot_id)));
    }
    Ok(())
}

/// Link a report to a hotspot. Returns false when the link already existed.
pub async fn link_report<'c, E>(executor: E, hotspot_id: i64, report_id: i64) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result =
        sqlx::query("INSERT OR IGNORE INTO hotspot_reports (hotspot_id, report_id) VALUES (?, ?)")
            .bind(hotspot_id)
            .bind(report_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Mean severity over the analyses of all linked reports
pub async fn mean_member_severity<'c, E>(executor: E, hotspot_id: i64) -> Result<Option<f64>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let mean: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT AVG(a.severity_score)
        FROM hotspot_reports hr
        JOIN analysis_results a ON a.report_id = hr.report_id
        WHERE hr.hotspot_id = ?
        "#,
    )
    .bind(hotspot_id)
    .fetch_one(executor)
    .await?;
    Ok(mean)
}

pub async fn set_average_severity<'c, E>(executor: E, hotspot_id: i64, average: f64) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("UPDATE hotspots SET average_severity = ? WHERE id = ?")
        .bind(average)
        .bind(hotspot_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn get_hotspot<'c, E>(executor: E, hotspot_id: i64) -> Result<Option<Hotspot>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM hotspots h WHERE h.id = ?", HOTSPOT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(hotspot_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(hotspot_from_row).transpose()
}

pub async fn member_count<'c, E>(executor: E, hotspot_id: i64) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hotspot_reports WHERE hotspot_id = ?")
        .bind(hotspot_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Newest activity first
pub async fn list_hotspots(pool: &SqlitePool, page: Page) -> Result<(Vec<HotspotSummary>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hotspots")
        .fetch_one(pool)
        .await?;

    let sql = format!(
        r#"
        SELECT {}, (SELECT COUNT(*) FROM hotspot_reports hr WHERE hr.hotspot_id = h.id) AS member_count
        FROM hotspots h
        ORDER BY h.last_reported DESC, h.id DESC
        LIMIT ? OFFSET ?
        "#,
        HOTSPOT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    let items = rows
        .iter()
        .map(|row| {
            Ok(HotspotSummary {
                hotspot: hotspot_from_row(row)?,
                member_count: row.get("member_count"),
                distance_km: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((items, total))
}

/// Hotspots within `radius_km` of `point`, nearest first
pub async fn list_hotspots_near(
    pool: &SqlitePool,
    point: &GeoPoint,
    radius_km: f64,
    page: Page,
) -> Result<(Vec<HotspotSummary>, i64)> {
    let mut matches = hotspots_near(pool, point, radius_km).await?;
    matches.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)));

    let total = matches.len() as i64;
    let window: Vec<(Hotspot, f64)> = matches
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();

    let mut items = Vec::with_capacity(window.len());
    for (hotspot, distance) in window {
        let member_count = member_count(pool, hotspot.id).await?;
        items.push(HotspotSummary {
            hotspot,
            member_count,
            distance_km: Some(distance),
        });
    }

    Ok((items, total))
}

/// Reports linked to a hotspot, newest first
pub async fn hotspot_members(
    pool: &SqlitePool,
    hotspot_id: i64,
    page: Page,
) -> Result<(Vec<HotspotMember>, i64)> {
    let total = member_count(pool, hotspot_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT r.id, r.latitude, r.longitude, r.description, r.status, r.reported_at,
               a.severity_score, a.priority_level, w.name AS waste_type
        FROM hotspot_reports hr
        JOIN reports r ON r.id = hr.report_id
        LEFT JOIN analysis_results a ON a.report_id = r.id
        LEFT JOIN waste_types w ON w.id = a.waste_type_id
        WHERE hr.hotspot_id = ?
        ORDER BY r.reported_at DESC, r.id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(hotspot_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let mut members = Vec::with_capacity(rows.len());
    for row in &rows {
        let status: String = row.get("status");
        let reported_at: String = row.get("reported_at");
        let severity: Option<i64> = row.get("severity_score");
        let priority: Option<String> = row.get("priority_level");

        members.push(HotspotMember {
            report_id: row.get("id"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            description: row.get("description"),
            status: status.parse::<ReportStatus>()?,
            reported_at: parse_timestamp(&reported_at)?,
            severity_score: severity.and_then(|s| u8::try_from(s).ok()),
            priority_level: priority.map(|p| p.parse::<PriorityLevel>()).transpose()?,
            waste_type: row.get("waste_type"),
        });
    }

    Ok((members, total))
}
