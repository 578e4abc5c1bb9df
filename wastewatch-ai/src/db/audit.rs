//! `system_logs` audit trail

use sqlx::{Executor, Sqlite};
use wastewatch_common::Result;

/// Agent name written on every entry from this service
pub const AGENT: &str = "analysis_pipeline";

pub const ACTION_REPORT_CREATED: &str = "report_created";
pub const ACTION_REPORT_ANALYZED: &str = "report_analyzed";
pub const ACTION_ANALYSIS_FAILED: &str = "report_analysis_failed";
pub const ACTION_HOTSPOT_CREATED: &str = "hotspot_created";

/// Append an audit entry about a report
pub async fn log_report_action<'c, E>(
    executor: E,
    action: &str,
    report_id: i64,
    details: &str,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    log_action(executor, action, details, Some(report_id), Some("reports")).await
}

pub async fn log_action<'c, E>(
    executor: E,
    action: &str,
    details: &str,
    related_id: Option<i64>,
    related_table: Option<&str>,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO system_logs (agent, action, details, related_id, related_table)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(AGENT)
    .bind(action)
    .bind(details)
    .bind(related_id)
    .bind(related_table)
    .execute(executor)
    .await?;
    Ok(())
}

/// Actions recorded for a report, oldest first
pub async fn actions_for_report<'c, E>(executor: E, report_id: i64) -> Result<Vec<String>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let actions: Vec<String> = sqlx::query_scalar(
        "SELECT action FROM system_logs WHERE related_table = 'reports' AND related_id = ? ORDER BY id",
    )
    .bind(report_id)
    .fetch_all(executor)
    .await?;
    Ok(actions)
}
