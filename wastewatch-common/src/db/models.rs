//! Database row models
//!
//! Status-like columns are stored as lowercase TEXT; each enum here owns its
//! string mapping so queries and API payloads agree on spelling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, GeoPoint};

/// Report lifecycle. The analysis pipeline moves reports
/// `submitted -> analyzing -> analyzed`; `resolved` is set manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Submitted,
    Analyzing,
    Analyzed,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Submitted => "submitted",
            ReportStatus::Analyzing => "analyzing",
            ReportStatus::Analyzed => "analyzed",
            ReportStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ReportStatus::Submitted),
            "analyzing" => Ok(ReportStatus::Analyzing),
            "analyzed" => Ok(ReportStatus::Analyzed),
            "resolved" => Ok(ReportStatus::Resolved),
            other => Err(Error::Internal(format!("Unknown report status: {}", other))),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleanup priority assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }

    /// Priority implied by a 1-10 severity score
    pub fn from_severity(severity: u8) -> Self {
        match severity {
            0..=3 => PriorityLevel::Low,
            4..=6 => PriorityLevel::Medium,
            7..=8 => PriorityLevel::High,
            _ => PriorityLevel::Critical,
        }
    }
}

impl FromStr for PriorityLevel {
    type Err = Error;

    /// Case-insensitive, whitespace-tolerant
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(PriorityLevel::Low),
            "medium" => Ok(PriorityLevel::Medium),
            "high" => Ok(PriorityLevel::High),
            "critical" => Ok(PriorityLevel::Critical),
            other => Err(Error::InvalidInput(format!("Unknown priority level: {}", other))),
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardLevel {
    Low,
    Medium,
    High,
}

impl HazardLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardLevel::Low => "low",
            HazardLevel::Medium => "medium",
            HazardLevel::High => "high",
        }
    }
}

impl FromStr for HazardLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(HazardLevel::Low),
            "medium" => Ok(HazardLevel::Medium),
            "high" => Ok(HazardLevel::High),
            other => Err(Error::Internal(format!("Unknown hazard level: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotStatus {
    Active,
    Monitoring,
    Resolved,
}

impl HotspotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotspotStatus::Active => "active",
            HotspotStatus::Monitoring => "monitoring",
            HotspotStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for HotspotStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(HotspotStatus::Active),
            "monitoring" => Ok(HotspotStatus::Monitoring),
            "resolved" => Ok(HotspotStatus::Resolved),
            other => Err(Error::Internal(format!("Unknown hotspot status: {}", other))),
        }
    }
}

/// `image_processing_queue.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
        }
    }
}

/// A citizen-submitted waste sighting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    /// Owning user's name, joined on read
    pub username: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub location_id: Option<i64>,
    pub description: String,
    pub status: ReportStatus,
    pub image_url: Option<String>,
    pub device_info: Option<serde_json::Value>,
    pub reported_at: DateTime<Utc>,
}

impl Report {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Insert payload for a new report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub image_url: Option<String>,
    pub device_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteType {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub hazard_level: HazardLevel,
    pub recyclable: bool,
}

/// Attributes applied when a waste type is created on first sight
#[derive(Debug, Clone)]
pub struct WasteTypeDefaults {
    pub description: String,
    pub hazard_level: HazardLevel,
    pub recyclable: bool,
}

impl WasteTypeDefaults {
    /// Defaults for a classifier-supplied name not yet in the taxonomy
    pub fn auto_generated(name: &str) -> Self {
        Self {
            description: format!("Auto-generated waste type for {}", name),
            hazard_level: HazardLevel::Medium,
            recyclable: false,
        }
    }

    pub fn not_garbage() -> Self {
        Self {
            description: "Images that do not contain waste materials".to_string(),
            hazard_level: HazardLevel::Low,
            recyclable: false,
        }
    }
}

/// Persisted analysis of one report (1:1, immutable once written)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub report_id: i64,
    pub analyzed_at: DateTime<Utc>,
    pub waste_type_id: i64,
    pub confidence_score: f64,
    pub estimated_volume: f64,
    pub severity_score: u8,
    pub priority_level: PriorityLevel,
    pub analysis_notes: String,
    pub full_description: String,
    pub processed_by: String,
}

/// Insert payload for an analysis result
#[derive(Debug, Clone)]
pub struct NewAnalysisRecord {
    pub report_id: i64,
    pub waste_type_id: i64,
    pub confidence_score: f64,
    pub estimated_volume: f64,
    pub severity_score: u8,
    pub priority_level: PriorityLevel,
    pub analysis_notes: String,
    pub full_description: String,
    pub processed_by: String,
}

/// Spatial cluster of analyzed reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: i64,
    pub name: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_meters: i64,
    pub location_id: Option<i64>,
    pub first_reported: NaiveDate,
    pub last_reported: NaiveDate,
    pub total_reports: i64,
    pub average_severity: f64,
    pub status: HotspotStatus,
}

impl Hotspot {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.center_latitude, self.center_longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}
