//! Image processing queue drain

use axum::{extract::State, routing::post, Json, Router};

use crate::api::spawn_processing;
use crate::db::queue;
use crate::error::ApiResult;
use crate::models::QueueDrainResponse;
use crate::AppState;

/// POST /api/process-queue
///
/// Claims up to `queue_batch_size` pending entries, oldest first, and starts
/// analysis for each in the background.
pub async fn process_queue(State(state): State<AppState>) -> ApiResult<Json<QueueDrainResponse>> {
    let claimed = queue::claim_pending(&state.db, state.settings.queue_batch_size).await?;
    let report_ids: Vec<i64> = claimed.iter().map(|item| item.report_id).collect();

    for report_id in &report_ids {
        spawn_processing(&state, *report_id);
    }

    tracing::info!(scheduled = report_ids.len(), "Queue drain scheduled");

    Ok(Json(QueueDrainResponse {
        scheduled: report_ids.len(),
        message: format!("Scheduled {} reports for analysis", report_ids.len()),
        report_ids,
    }))
}

pub fn queue_routes() -> Router<AppState> {
    Router::new().route("/api/process-queue", post(process_queue))
}
