//! HTTP request and response bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wastewatch_common::db::{AnalysisRecord, Hotspot, PriorityLevel, Report, ReportStatus};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// POST /api/reports
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitReportRequest {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub device_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitReportResponse {
    pub report_id: i64,
    pub status: ReportStatus,
    pub location_id: Option<i64>,
    pub message: String,
}

/// Analysis row joined with its waste type name
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisDetail {
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub waste_type: String,
}

/// GET /api/reports/{id}
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    pub analysis: Option<AnalysisDetail>,
}

/// `?page&per_page`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

/// `?lat&lon&radius_km&page&per_page`
///
/// Page fields are listed inline: query-string decoding cannot flatten
/// numeric fields from a nested struct.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HotspotListQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl HotspotListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotspotSummary {
    #[serde(flatten)]
    pub hotspot: Hotspot,
    /// Rows in `hotspot_reports`, which can differ from `total_reports`
    pub member_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// One report linked to a hotspot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotspotMember {
    pub report_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub status: ReportStatus,
    pub reported_at: DateTime<Utc>,
    pub severity_score: Option<u8>,
    pub priority_level: Option<PriorityLevel>,
    pub waste_type: Option<String>,
}

/// POST /api/process-queue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueDrainResponse {
    pub scheduled: usize,
    pub report_ids: Vec<i64>,
    pub message: String,
}
