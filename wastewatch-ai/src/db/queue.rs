//! Image processing queue
//!
//! One row per report with an image. Rows cycle `pending -> processing` when
//! a drain picks them up, then end `completed` or fall back to `pending`.

use chrono::Utc;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use wastewatch_common::db::QueueStatus;
use wastewatch_common::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: i64,
    pub report_id: i64,
    pub image_url: String,
}

/// Queue a report. Re-queuing an existing report resets it to `pending`.
pub async fn enqueue<'c, E>(executor: E, report_id: i64, image_url: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    upsert(executor, report_id, image_url, QueueStatus::Pending).await
}

/// Queue a report that the caller is about to process itself. The row starts
/// `processing`, so drains leave it alone until the run settles it.
pub async fn enqueue_claimed<'c, E>(executor: E, report_id: i64, image_url: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    upsert(executor, report_id, image_url, QueueStatus::Processing).await
}

async fn upsert<'c, E>(
    executor: E,
    report_id: i64,
    image_url: &str,
    status: QueueStatus,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO image_processing_queue (report_id, image_url, status, queued_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(report_id) DO UPDATE SET
            image_url = excluded.image_url,
            status = excluded.status,
            processed_at = NULL
        "#,
    )
    .bind(report_id)
    .bind(image_url)
    .bind(status.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Claim up to `limit` pending rows, oldest first, marking them `processing`
pub async fn claim_pending(pool: &SqlitePool, limit: u32) -> Result<Vec<QueueItem>> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        r#"
        SELECT id, report_id, image_url
        FROM image_processing_queue
        WHERE status = ?
        ORDER BY queued_at, id
        LIMIT ?
        "#,
    )
    .bind(QueueStatus::Pending.as_str())
    .bind(i64::from(limit))
    .fetch_all(&mut *tx)
    .await?;

    let items: Vec<QueueItem> = rows
        .iter()
        .map(|row| QueueItem {
            id: row.get("id"),
            report_id: row.get("report_id"),
            image_url: row.get("image_url"),
        })
        .collect();

    for item in &items {
        sqlx::query("UPDATE image_processing_queue SET status = ? WHERE id = ?")
            .bind(QueueStatus::Processing.as_str())
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(items)
}

/// Settle a report's queue row after a pipeline run. No-op when the report
/// was never queued.
pub async fn settle<'c, E>(executor: E, report_id: i64, succeeded: bool) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let (status, processed_at) = if succeeded {
        (QueueStatus::Completed, Some(Utc::now().to_rfc3339()))
    } else {
        (QueueStatus::Pending, None)
    };

    sqlx::query("UPDATE image_processing_queue SET status = ?, processed_at = ? WHERE report_id = ?")
        .bind(status.as_str())
        .bind(processed_at)
        .bind(report_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Rows stuck in `processing` after a restart go back to `pending`
pub async fn requeue_interrupted<'c, E>(executor: E) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE image_processing_queue SET status = ? WHERE status = ?")
        .bind(QueueStatus::Pending.as_str())
        .bind(QueueStatus::Processing.as_str())
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn queue_status<'c, E>(executor: E, report_id: i64) -> Result<Option<String>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM image_processing_queue WHERE report_id = ?")
            .bind(report_id)
            .fetch_optional(executor)
            .await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{reports, users};
    use tempfile::TempDir;
    use wastewatch_common::db::{init_database, NewReport};

    const URL: &str = "https://blobs.example/a.jpg";

    async fn setup() -> (TempDir, SqlitePool, i64) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("wastewatch.db")).await.unwrap();
        let user_id = users::create_user(&pool, "reporter", None).await.unwrap();
        let report_id = reports::insert_report(
            &pool,
            &NewReport {
                user_id,
                latitude: 0.0,
                longitude: 0.0,
                description: "bags".to_string(),
                image_url: Some(URL.to_string()),
                device_info: None,
            },
            None,
        )
        .await
        .unwrap();
        (dir, pool, report_id)
    }

    #[tokio::test]
    async fn test_claimed_rows_are_skipped_by_drains() {
        let (_dir, pool, report_id) = setup().await;
        enqueue_claimed(&pool, report_id, URL).await.unwrap();

        assert_eq!(queue_status(&pool, report_id).await.unwrap().as_deref(), Some("processing"));
        assert!(claim_pending(&pool, 10).await.unwrap().is_empty());

        settle(&pool, report_id, true).await.unwrap();
        assert_eq!(queue_status(&pool, report_id).await.unwrap().as_deref(), Some("completed"));
        assert!(claim_pending(&pool, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requeue_interrupted_releases_processing_rows() {
        let (_dir, pool, report_id) = setup().await;
        enqueue_claimed(&pool, report_id, URL).await.unwrap();

        assert_eq!(requeue_interrupted(&pool).await.unwrap(), 1);

        let claimed = claim_pending(&pool, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].report_id, report_id);
    }
}
