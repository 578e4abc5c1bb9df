//! wastewatch-ai library interface
//!
//! Exposes the router, state and pipeline for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use wastewatch_common::config::PipelineSettings;

use crate::services::ReportPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub pipeline: Arc<ReportPipeline>,
    /// Queue batch size and related knobs
    pub settings: PipelineSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background failure, surfaced by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, pipeline: Arc<ReportPipeline>, settings: PipelineSettings) -> Self {
        Self {
            db,
            pipeline,
            settings,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::report_routes())
        .merge(api::hotspot_routes())
        .merge(api::queue_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
