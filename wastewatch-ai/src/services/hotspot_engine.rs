//! Incremental hotspot clustering
//!
//! Runs once per newly analyzed waste report. A report with enough analyzed
//! neighbours either joins the hotspot already centred near it or founds a
//! new one; the report and its neighbours are then linked and the hotspot's
//! average severity recomputed from its members.
//!
//! Each run is one SQL transaction executed while holding the grid-cell
//! neighbourhood lock of the report, so two nearby reports finishing at the
//! same moment cannot both create a hotspot.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use wastewatch_common::config::PipelineSettings;
use wastewatch_common::db::{Hotspot, Report};
use wastewatch_common::{GeoPoint, Result};

use crate::db::{audit, hotspots, locations, reports};
use crate::db::hotspots::NewHotspot;
use crate::utils::{retry_on_lock, ClusterLocks};

/// Picks the hotspot a report should join, if any
#[async_trait]
pub trait ClusteringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn select_hotspot(
        &self,
        conn: &mut SqliteConnection,
        point: &GeoPoint,
        radius_km: f64,
    ) -> Result<Option<Hotspot>>;
}

/// The oldest hotspot whose centre is within the radius wins. Hotspots never
/// split, merge or give up members.
pub struct FirstMatchStrategy;

#[async_trait]
impl ClusteringStrategy for FirstMatchStrategy {
    fn name(&self) -> &'static str {
        "first_match"
    }

    async fn select_hotspot(
        &self,
        conn: &mut SqliteConnection,
        point: &GeoPoint,
        radius_km: f64,
    ) -> Result<Option<Hotspot>> {
        let candidates = hotspots::hotspots_near(&mut *conn, point, radius_km).await?;
        Ok(candidates.into_iter().next().map(|(hotspot, _)| hotspot))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSettings {
    /// Neighbour and hotspot-centre search radius
    pub radius_km: f64,
    /// Analyzed neighbours required before a report is clustered
    pub min_neighbors: usize,
    /// Radius recorded on newly created hotspots
    pub hotspot_radius_meters: i64,
    /// Budget for retrying a transaction that hit SQLITE_BUSY
    pub max_lock_wait_ms: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            radius_km: 0.5,
            min_neighbors: 2,
            hotspot_radius_meters: 500,
            max_lock_wait_ms: 5000,
        }
    }
}

impl From<&PipelineSettings> for ClusterSettings {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            radius_km: settings.cluster_radius_km,
            min_neighbors: settings.min_cluster_neighbors,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutcome {
    /// Too few analyzed neighbours; nothing written
    BelowThreshold { neighbors: usize },
    Created(ClusterUpdate),
    Joined(ClusterUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterUpdate {
    pub hotspot_id: i64,
    pub total_reports: i64,
    pub average_severity: f64,
    /// Membership rows added by this run
    pub newly_linked: usize,
}

impl ClusterOutcome {
    pub fn hotspot_id(&self) -> Option<i64> {
        match self {
            ClusterOutcome::BelowThreshold { .. } => None,
            ClusterOutcome::Created(update) | ClusterOutcome::Joined(update) => {
                Some(update.hotspot_id)
            }
        }
    }
}

pub struct HotspotEngine {
    strategy: Arc<dyn ClusteringStrategy>,
    locks: ClusterLocks,
    settings: ClusterSettings,
}

impl HotspotEngine {
    pub fn new(strategy: Arc<dyn ClusteringStrategy>, settings: ClusterSettings) -> Self {
        Self {
            strategy,
            locks: ClusterLocks::default(),
            settings,
        }
    }

    pub fn first_match(settings: ClusterSettings) -> Self {
        Self::new(Arc::new(FirstMatchStrategy), settings)
    }

    /// Cluster a report that has just been analyzed as real waste.
    ///
    /// `report` must already be persisted with status `analyzed` and its
    /// analysis row (carrying `severity_score`) inserted.
    pub async fn on_report_analyzed(
        &self,
        pool: &SqlitePool,
        report: &Report,
        severity_score: u8,
    ) -> Result<ClusterOutcome> {
        let point = report.point();
        let _neighborhood = self.locks.lock_around(&point).await;

        retry_on_lock("hotspot_clustering", self.settings.max_lock_wait_ms, || {
            self.cluster_once(pool, report, severity_score)
        })
        .await
    }

    async fn cluster_once(
        &self,
        pool: &SqlitePool,
        report: &Report,
        severity_score: u8,
    ) -> Result<ClusterOutcome> {
        let point = report.point();
        let radius_km = self.settings.radius_km;
        let mut tx = pool.begin().await?;

        let neighbors = reports::analyzed_neighbors(&mut *tx, &point, radius_km, report.id).await?;

        if neighbors.len() < self.settings.min_neighbors {
            tracing::debug!(
                report_id = report.id,
                neighbors = neighbors.len(),
                required = self.settings.min_neighbors,
                "Not enough analyzed neighbours for a hotspot"
            );
            return Ok(ClusterOutcome::BelowThreshold {
                neighbors: neighbors.len(),
            });
        }

        let today = Utc::now().date_naive();
        let total_reports = neighbors.len() as i64 + 1;

        let existing = self
            .strategy
            .select_hotspot(&mut tx, &point, radius_km)
            .await?;

        let (hotspot_id, created) = match existing {
            Some(hotspot) => {
                hotspots::touch_hotspot(&mut *tx, hotspot.id, today, total_reports).await?;
                (hotspot.id, false)
            }
            None => {
                let name = hotspot_name(&mut tx, report).await?;
                let hotspot_id = hotspots::insert_hotspot(
                    &mut *tx,
                    &NewHotspot {
                        name: name.clone(),
                        center: point,
                        radius_meters: self.settings.hotspot_radius_meters,
                        location_id: report.location_id,
                        reported_on: today,
                        total_reports,
                        average_severity: f64::from(severity_score),
                    },
                )
                .await?;

                audit::log_action(
                    &mut *tx,
                    audit::ACTION_HOTSPOT_CREATED,
                    &format!("{} created from report {}", name, report.id),
                    Some(hotspot_id),
                    Some("hotspots"),
                )
                .await?;

                (hotspot_id, true)
            }
        };

        let mut newly_linked = 0;
        let members = std::iter::once(report.id).chain(neighbors.iter().map(|n| n.id));
        for report_id in members {
            if hotspots::link_report(&mut *tx, hotspot_id, report_id).await? {
                newly_linked += 1;
            }
        }

        let average_severity = match hotspots::mean_member_severity(&mut *tx, hotspot_id).await? {
            Some(mean) => {
                hotspots::set_average_severity(&mut *tx, hotspot_id, mean).await?;
                mean
            }
            None => f64::from(severity_score),
        };

        tx.commit().await?;

        let update = ClusterUpdate {
            hotspot_id,
            total_reports,
            average_severity,
            newly_linked,
        };

        tracing::info!(
            report_id = report.id,
            hotspot_id,
            created,
            strategy = self.strategy.name(),
            total_reports,
            average_severity,
            newly_linked,
            "Hotspot updated"
        );

        Ok(if created {
            ClusterOutcome::Created(update)
        } else {
            ClusterOutcome::Joined(update)
        })
    }
}

async fn hotspot_name(conn: &mut SqliteConnection, report: &Report) -> Result<String> {
    if let Some(location_id) = report.location_id {
        if let Some(location) = locations::get_location(&mut *conn, location_id).await? {
            return Ok(format!("Hotspot near {}", location.name));
        }
    }
    Ok(format!(
        "Hotspot near {:.4}, {:.4}",
        report.latitude, report.longitude
    ))
}
