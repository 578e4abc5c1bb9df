//! Hotspot listing and membership

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use wastewatch_common::GeoPoint;

use crate::db::hotspots;
use crate::error::{ApiError, ApiResult};
use crate::models::{HotspotListQuery, HotspotMember, HotspotSummary, PageQuery, Paginated};
use crate::AppState;

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 10.0;

/// GET /api/hotspots?lat&lon&radius_km&page&per_page
///
/// With coordinates: hotspots within the radius, nearest first. Without:
/// most recently active first.
pub async fn list_hotspots(
    State(state): State<AppState>,
    Query(query): Query<HotspotListQuery>,
) -> ApiResult<Json<Paginated<HotspotSummary>>> {
    let page = query.page();

    let (items, total) = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => {
            let point = GeoPoint::validated(lat, lon)?;
            let radius_km = query.radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
            if !radius_km.is_finite() || radius_km <= 0.0 {
                return Err(ApiError::BadRequest(format!(
                    "radius_km must be positive, got {}",
                    radius_km
                )));
            }
            hotspots::list_hotspots_near(&state.db, &point, radius_km, page).await?
        }
        (None, None) => hotspots::list_hotspots(&state.db, page).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "lat and lon must be given together".to_string(),
            ))
        }
    };

    Ok(Json(Paginated::new(items, page, total)))
}

/// GET /api/hotspots/:id/reports?page&per_page
pub async fn list_hotspot_reports(
    State(state): State<AppState>,
    Path(hotspot_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<HotspotMember>>> {
    if hotspots::get_hotspot(&state.db, hotspot_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Hotspot {} not found",
            hotspot_id
        )));
    }

    let page = query.page();
    let (items, total) = hotspots::hotspot_members(&state.db, hotspot_id, page).await?;
    Ok(Json(Paginated::new(items, page, total)))
}

pub fn hotspot_routes() -> Router<AppState> {
    Router::new()
        .route("/api/hotspots", get(list_hotspots))
        .route("/api/hotspots/:id/reports", get(list_hotspot_reports))
}
