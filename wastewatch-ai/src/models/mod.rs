//! Data models for wastewatch-ai
//!
//! - `analysis`: classifier payloads (model responses and the merged result)
//! - `outcome`: result of one pipeline run
//! - `api`: HTTP request and response bodies

pub mod analysis;
pub mod api;
pub mod outcome;

pub use analysis::{Analysis, DetailedAssessment, WasteGate};
pub use api::{
    AnalysisDetail, HotspotListQuery, HotspotMember, HotspotSummary, Page, PageQuery, Paginated,
    QueueDrainResponse, ReportDetail, SubmitReportRequest, SubmitReportResponse,
};
pub use outcome::{ProcessOutcome, QueueDisposition};
