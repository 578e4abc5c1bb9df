//! Shared fixtures for wastewatch-ai integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use wastewatch_ai::db::{reports, users};
use wastewatch_ai::services::{
    ClusterSettings, ClusteringStrategy, HotspotEngine, ImageFetchError, ImageFetcher,
    ReportPipeline, TransportError, TwoStageClassifier, VisionModel,
};
use wastewatch_ai::utils::RetryPolicy;
use wastewatch_common::db::{init_database, Hotspot, NewReport, ReportStatus};
use wastewatch_common::{Error, GeoPoint};

pub const MODEL_ID: &str = "scripted-vision";
pub const IMAGE_URL: &str = "https://blobs.example.test/reports/photo.jpg";

pub const GATE_WASTE: &str = r#"{"contains_waste": true, "confidence": 92, "reasoning": "Bags of trash on the curb", "short_description": "Plastic bags piled beside the road", "full_description": "A pile of plastic bags sits beside the road."}"#;
pub const GATE_CLEAN: &str = r#"{"contains_waste": false, "confidence": 85, "reasoning": "A clean park lawn", "short_description": "Empty park lawn", "full_description": "A mowed lawn with no litter."}"#;

pub fn detail(waste_type: &str, severity: u8, priority: &str) -> String {
    format!(
        r#"Here is my assessment:
{{"waste_type": "{}", "severity_score": {}, "priority_level": "{}", "environmental_impact": "Runoff into drains", "estimated_volume": "2.5 cubic meters", "safety_concerns": "None visible", "analysis_notes": "Roadside dumping"}}"#,
        waste_type, severity, priority
    )
}

/// Temporary on-disk database; keep the `TempDir` alive for the test
pub async fn test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("wastewatch.db")).await.unwrap();
    (dir, pool)
}

/// Vision model replaying canned replies in order; an exhausted script
/// answers with a network error
pub struct ScriptedVisionModel {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedVisionModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn reply(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn fail(&self, error: TransportError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Script Stage A waste + Stage B assessment
    pub fn waste(&self, waste_type: &str, severity: u8, priority: &str) {
        self.reply(GATE_WASTE);
        self.reply(detail(waste_type, severity, priority));
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionModel for ScriptedVisionModel {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn invoke(&self, prompt: &str, _image: Option<&[u8]>) -> Result<String, TransportError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string())))
    }
}

/// Vision model whose calls park until `release`, then fail. Calls made
/// after the release fail straight away.
pub struct GatedVisionModel {
    gate: Notify,
    open: AtomicBool,
    calls: AtomicUsize,
}

impl GatedVisionModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Notify::new(),
            open: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for GatedVisionModel {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn invoke(&self, _prompt: &str, _image: Option<&[u8]>) -> Result<String, TransportError> {
        let released = self.gate.notified();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.open.load(Ordering::SeqCst) {
            released.await;
        }
        Err(TransportError::Network("connection reset".to_string()))
    }
}

/// Clustering strategy that fails every selection
pub struct FailingStrategy;

#[async_trait]
impl ClusteringStrategy for FailingStrategy {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn select_hotspot(
        &self,
        _conn: &mut SqliteConnection,
        _point: &GeoPoint,
        _radius_km: f64,
    ) -> wastewatch_common::Result<Option<Hotspot>> {
        Err(Error::Internal("hotspot index unavailable".to_string()))
    }
}

/// Serves the same bytes for every URL, or fails every fetch
pub struct StaticImageFetcher {
    available: bool,
}

impl StaticImageFetcher {
    pub fn serving() -> Arc<Self> {
        Arc::new(Self { available: true })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { available: false })
    }
}

#[async_trait]
impl ImageFetcher for StaticImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        if self.available {
            Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
        } else {
            Err(ImageFetchError::Status {
                status: 404,
                url: url.to_string(),
            })
        }
    }
}

pub fn pipeline_with(
    pool: &SqlitePool,
    model: Arc<dyn VisionModel>,
    fetcher: Arc<dyn ImageFetcher>,
) -> ReportPipeline {
    pipeline_with_engine(
        pool,
        model,
        fetcher,
        HotspotEngine::first_match(ClusterSettings::default()),
    )
}

pub fn pipeline_with_engine(
    pool: &SqlitePool,
    model: Arc<dyn VisionModel>,
    fetcher: Arc<dyn ImageFetcher>,
    engine: HotspotEngine,
) -> ReportPipeline {
    ReportPipeline::new(
        pool.clone(),
        TwoStageClassifier::new(model, RetryPolicy::immediate(3)),
        fetcher,
        engine,
    )
}

/// Force a report's status, bypassing the pipeline
pub async fn mark_status(pool: &SqlitePool, report_id: i64, status: ReportStatus) {
    sqlx::query("UPDATE reports SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(report_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Poll until the report reaches `status`; panics after about two seconds
pub async fn wait_for_status(pool: &SqlitePool, report_id: i64, status: ReportStatus) {
    for _ in 0..100 {
        let report = reports::load_report(pool, report_id).await.unwrap().unwrap();
        if report.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("report {} never reached {:?}", report_id, status);
}

pub async fn seed_user(pool: &SqlitePool) -> i64 {
    users::create_user(pool, "reporter", Some("reporter@example.test"))
        .await
        .unwrap()
}

pub async fn seed_report(
    pool: &SqlitePool,
    user_id: i64,
    latitude: f64,
    longitude: f64,
    image_url: Option<&str>,
) -> i64 {
    seed_report_in(pool, user_id, latitude, longitude, image_url, None).await
}

pub async fn seed_report_in(
    pool: &SqlitePool,
    user_id: i64,
    latitude: f64,
    longitude: f64,
    image_url: Option<&str>,
    location_id: Option<i64>,
) -> i64 {
    reports::insert_report(
        pool,
        &NewReport {
            user_id,
            latitude,
            longitude,
            description: "Trash by the road".to_string(),
            image_url: image_url.map(str::to_string),
            device_info: None,
        },
        location_id,
    )
    .await
    .unwrap()
}
