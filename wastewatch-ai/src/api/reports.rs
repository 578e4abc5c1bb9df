//! Report submission, lookup and synchronous processing

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use wastewatch_common::db::{NewReport, ReportStatus};
use wastewatch_common::GeoPoint;

use crate::api::spawn_processing;
use crate::db::{analysis, audit, locations, queue, reports, users};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ProcessOutcome, ReportDetail, SubmitReportRequest, SubmitReportResponse,
};
use crate::AppState;

/// Known locations closer than this are attached to new reports
pub const LOCATION_MATCH_KM: f64 = 1.0;

pub const QUEUED_MESSAGE: &str = "Report submitted successfully. Report queued for analysis";
pub const NO_IMAGE_MESSAGE: &str = "Report submitted successfully. No image provided, analysis skipped";

/// POST /api/reports
///
/// Stores the report and, when it carries an image, queues it and starts
/// analysis in the background. Returns before analysis finishes.
pub async fn submit_report(
    State(state): State<AppState>,
    Json(request): Json<SubmitReportRequest>,
) -> ApiResult<(StatusCode, Json<SubmitReportResponse>)> {
    let point = GeoPoint::validated(request.latitude, request.longitude)?;

    if !users::user_exists(&state.db, request.user_id).await? {
        return Err(ApiError::NotFound(format!(
            "User {} not found",
            request.user_id
        )));
    }

    let image_url = request
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    let location = locations::nearest_location(&state.db, &point, LOCATION_MATCH_KM).await?;
    let location_id = location.as_ref().map(|l| l.id);

    let new_report = NewReport {
        user_id: request.user_id,
        latitude: point.latitude,
        longitude: point.longitude,
        description: request.description.unwrap_or_default(),
        image_url: image_url.clone(),
        device_info: request.device_info,
    };

    let mut tx = state.db.begin().await.map_err(wastewatch_common::Error::from)?;
    let report_id = reports::insert_report(&mut *tx, &new_report, location_id).await?;
    audit::log_report_action(
        &mut *tx,
        audit::ACTION_REPORT_CREATED,
        report_id,
        &format!("Report {} submitted by user {}", report_id, request.user_id),
    )
    .await?;
    if let Some(url) = &image_url {
        // Claimed up front: the background run below settles the row
        queue::enqueue_claimed(&mut *tx, report_id, url).await?;
    }
    tx.commit().await.map_err(wastewatch_common::Error::from)?;

    tracing::info!(
        report_id,
        user_id = request.user_id,
        location_id = ?location_id,
        has_image = image_url.is_some(),
        "Report submitted"
    );

    let message = if image_url.is_some() {
        spawn_processing(&state, report_id);
        QUEUED_MESSAGE
    } else {
        NO_IMAGE_MESSAGE
    };

    Ok((
        StatusCode::CREATED,
        Json(SubmitReportResponse {
            report_id,
            status: ReportStatus::Submitted,
            location_id,
            message: message.to_string(),
        }),
    ))
}

/// GET /api/reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> ApiResult<Json<ReportDetail>> {
    let report = reports::load_report(&state.db, report_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Report {} not found", report_id)))?;
    let analysis = analysis::analysis_for_report(&state.db, report_id).await?;

    Ok(Json(ReportDetail { report, analysis }))
}

/// POST /api/reports/:id/process
///
/// Runs the pipeline inline and returns its outcome.
pub async fn process_report_now(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> ApiResult<Json<ProcessOutcome>> {
    if reports::load_report(&state.db, report_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Report {} not found", report_id)));
    }

    Ok(Json(state.pipeline.process_report(report_id).await))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", post(submit_report))
        .route("/api/reports/:id", get(get_report))
        .route("/api/reports/:id/process", post(process_report_now))
}
