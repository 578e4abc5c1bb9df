//! Analysis results (one per report, written once)

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use wastewatch_common::db::{AnalysisRecord, NewAnalysisRecord};
use wastewatch_common::{Error, Result};

use super::parse_timestamp;
use crate::models::AnalysisDetail;

fn analysis_from_row(row: &SqliteRow) -> Result<AnalysisRecord> {
    let analyzed_at: String = row.get("analyzed_at");
    let priority_level: String = row.get("priority_level");
    let severity_score: i64 = row.get("severity_score");

    Ok(AnalysisRecord {
        id: row.get("id"),
        report_id: row.get("report_id"),
        analyzed_at: parse_timestamp(&analyzed_at)?,
        waste_type_id: row.get("waste_type_id"),
        confidence_score: row.get("confidence_score"),
        estimated_volume: row.get("estimated_volume"),
        severity_score: u8::try_from(severity_score).map_err(|_| {
            Error::Internal(format!("severity {} out of range", severity_score))
        })?,
        priority_level: priority_level.parse()?,
        analysis_notes: row.get("analysis_notes"),
        full_description: row.get("full_description"),
        processed_by: row.get("processed_by"),
    })
}

/// Insert the analysis for a report. A second insert for the same report
/// violates the unique `report_id` and fails.
pub async fn insert_analysis<'c, E>(executor: E, record: &NewAnalysisRecord) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO analysis_results (
            report_id, analyzed_at, waste_type_id, confidence_score, estimated_volume,
            severity_score, priority_level, analysis_notes, full_description, processed_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.report_id)
    .bind(Utc::now().to_rfc3339())
    .bind(record.waste_type_id)
    .bind(record.confidence_score)
    .bind(record.estimated_volume.max(0.0))
    .bind(i64::from(record.severity_score))
    .bind(record.priority_level.as_str())
    .bind(&record.analysis_notes)
    .bind(&record.full_description)
    .bind(&record.processed_by)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Analysis of `report_id` with its waste type name
pub async fn analysis_for_report<'c, E>(executor: E, report_id: i64) -> Result<Option<AnalysisDetail>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT a.id, a.report_id, a.analyzed_at, a.waste_type_id, a.confidence_score,
               a.estimated_volume, a.severity_score, a.priority_level, a.analysis_notes,
               a.full_description, a.processed_by, w.name AS waste_type
        FROM analysis_results a
        JOIN waste_types w ON w.id = a.waste_type_id
        WHERE a.report_id = ?
        "#,
    )
    .bind(report_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| {
        Ok(AnalysisDetail {
            record: analysis_from_row(&row)?,
            waste_type: row.get("waste_type"),
        })
    })
    .transpose()
}

/// Remove the analysis of `report_id`; used to undo a run that failed
/// after the analysis was committed
pub async fn delete_analysis<'c, E>(executor: E, report_id: i64) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM analysis_results WHERE report_id = ?")
        .bind(report_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
