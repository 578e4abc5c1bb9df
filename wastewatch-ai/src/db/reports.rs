//! Report persistence
//!
//! The analysis pipeline only ever writes `status` and `description` of an
//! existing report; everything else is fixed at submission.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use wastewatch_common::db::{NewReport, Report, ReportStatus};
use wastewatch_common::geo::BoundingBox;
use wastewatch_common::{Error, GeoPoint, Result};

use super::parse_timestamp;

/// Another analyzed report close to the one being clustered
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborReport {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

pub(crate) fn report_from_row(row: &SqliteRow) -> Result<Report> {
    let status: String = row.get("status");
    let reported_at: String = row.get("reported_at");
    let device_info: Option<String> = row.get("device_info");

    Ok(Report {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        location_id: row.get("location_id"),
        description: row.get("description"),
        status: status.parse()?,
        image_url: row.get("image_url"),
        device_info: device_info.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        }),
        reported_at: parse_timestamp(&reported_at)?,
    })
}

/// Insert a new report in `submitted` state
pub async fn insert_report<'c, E>(
    executor: E,
    report: &NewReport,
    location_id: Option<i64>,
) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let device_info = report
        .device_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = sqlx::query(
        r#"
        INSERT INTO reports (
            user_id, latitude, longitude, location_id, description,
            status, image_url, device_info, reported_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.user_id)
    .bind(report.latitude)
    .bind(report.longitude)
    .bind(location_id)
    .bind(&report.description)
    .bind(ReportStatus::Submitted.as_str())
    .bind(&report.image_url)
    .bind(device_info)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load a report with its reporter's username
pub async fn load_report<'c, E>(executor: E, report_id: i64) -> Result<Option<Report>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT r.id, r.user_id, u.username, r.latitude, r.longitude, r.location_id,
               r.description, r.status, r.image_url, r.device_info, r.reported_at
        FROM reports r
        LEFT JOIN users u ON u.id = r.user_id
        WHERE r.id = ?
        "#,
    )
    .bind(report_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(report_from_row).transpose()
}

/// Write the analysis-derived description together with the new status
pub async fn set_description_and_status<'c, E>(
    executor: E,
    report_id: i64,
    description: &str,
    status: ReportStatus,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE reports SET description = ?, status = ? WHERE id = ?")
        .bind(description)
        .bind(status.as_str())
        .bind(report_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Report {} not found", report_id)));
    }
    Ok(())
}

/// Move a `submitted` report to `analyzing`. Returns false when the report
/// is in any other state, so at most one run analyzes a report at a time.
pub async fn begin_analysis<'c, E>(executor: E, report_id: i64) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE reports SET status = ? WHERE id = ? AND status = ?")
        .bind(ReportStatus::Analyzing.as_str())
        .bind(report_id)
        .bind(ReportStatus::Submitted.as_str())
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Revert an in-flight report to `submitted` so a later drain can retry it.
/// Reports that already reached `analyzed` or `resolved` are left alone.
pub async fn revert_to_submitted<'c, E>(executor: E, report_id: i64) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE reports SET status = ? WHERE id = ? AND status IN (?, ?)")
        .bind(ReportStatus::Submitted.as_str())
        .bind(report_id)
        .bind(ReportStatus::Submitted.as_str())
        .bind(ReportStatus::Analyzing.as_str())
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Reports left `analyzing` by a process that stopped mid-run go back to
/// `submitted`. Only safe before any pipeline run has started.
pub async fn reset_interrupted<'c, E>(executor: E) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE reports SET status = ? WHERE status = ?")
        .bind(ReportStatus::Submitted.as_str())
        .bind(ReportStatus::Analyzing.as_str())
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Analyzed reports other than `exclude_id` strictly within `radius_km` of
/// `point`, nearest first
pub async fn analyzed_neighbors<'c, E>(
    executor: E,
    point: &GeoPoint,
    radius_km: f64,
    exclude_id: i64,
) -> Result<Vec<NeighborReport>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let bbox = BoundingBox::around(point, radius_km);
    let rows = sqlx::query(
        r#"
        SELECT id, latitude, longitude
        FROM reports
        WHERE status = ?
          AND id != ?
          AND latitude BETWEEN ? AND ?
          AND longitude BETWEEN ? AND ?
        "#,
    )
    .bind(ReportStatus::Analyzed.as_str())
    .bind(exclude_id)
    .bind(bbox.min_latitude)
    .bind(bbox.max_latitude)
    .bind(bbox.min_longitude)
    .bind(bbox.max_longitude)
    .fetch_all(executor)
    .await?;

    let mut neighbors: Vec<NeighborReport> = rows
        .iter()
        .map(|row| {
            let latitude: f64 = row.get("latitude");
            let longitude: f64 = row.get("longitude");
            NeighborReport {
                id: row.get("id"),
                latitude,
                longitude,
                distance_km: point.distance_km(&GeoPoint::new(latitude, longitude)),
            }
        })
        .filter(|n| n.distance_km < radius_km)
        .collect();

    neighbors.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(neighbors)
}
