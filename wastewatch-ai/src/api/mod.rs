//! HTTP API handlers for wastewatch-ai

pub mod health;
pub mod hotspots;
pub mod queue;
pub mod reports;

pub use health::health_routes;
pub use hotspots::hotspot_routes;
pub use queue::queue_routes;
pub use reports::report_routes;

use crate::AppState;

/// Run `process_report` in the background. Failures are logged and kept as
/// the service's last error.
pub(crate) fn spawn_processing(state: &AppState, report_id: i64) {
    let pipeline = state.pipeline.clone();
    let last_error = state.last_error.clone();

    tokio::spawn(async move {
        tracing::info!(report_id, "Background analysis task started");

        let outcome = pipeline.process_report(report_id).await;
        if outcome.success {
            tracing::info!(report_id, "Background analysis task completed successfully");
        } else {
            tracing::error!(
                report_id,
                message = %outcome.message,
                "Background analysis task failed"
            );
            *last_error.write().await =
                Some(format!("Report {}: {}", report_id, outcome.message));
        }
    });
}
