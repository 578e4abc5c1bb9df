//! Report analysis pipeline
//!
//! `process_report` drives one report through
//! `submitted -> analyzing -> analyzed`: fetch the image, classify it,
//! persist the analysis and, for real waste, update hotspots. Failures are
//! returned as a [`ProcessOutcome`] and leave the report `submitted` with its
//! queue row `pending`, so a later queue drain picks it up again.
//!
//! Only the run that moves a report out of `submitted` may write its status
//! afterwards; a second run on the same report backs off without touching
//! the report or its queue row.

use sqlx::SqlitePool;
use std::sync::Arc;
use wastewatch_common::db::{
    NewAnalysisRecord, PriorityLevel, Report, ReportStatus, WasteTypeDefaults, NOT_GARBAGE,
};
use wastewatch_common::Result;

use crate::db::{analysis, audit, queue, reports, waste_types};
use crate::models::analysis::truncate_words;
use crate::models::{Analysis, ProcessOutcome, QueueDisposition};
use crate::services::classifier::{TwoStageClassifier, SHORT_DESCRIPTION_WORDS};
use crate::services::hotspot_engine::{ClusterOutcome, HotspotEngine};
use crate::services::image_fetcher::ImageFetcher;
use crate::services::volume_parser::parse_volume;

pub const NO_IMAGE_MESSAGE: &str = "No image available for analysis";
pub const ANALYSIS_FAILED_MESSAGE: &str = "Image analysis failed";
pub const NOT_GARBAGE_DESCRIPTION: &str = "Not garbage.";

pub struct ReportPipeline {
    db: SqlitePool,
    classifier: TwoStageClassifier,
    fetcher: Arc<dyn ImageFetcher>,
    hotspots: HotspotEngine,
}

impl ReportPipeline {
    pub fn new(
        db: SqlitePool,
        classifier: TwoStageClassifier,
        fetcher: Arc<dyn ImageFetcher>,
        hotspots: HotspotEngine,
    ) -> Self {
        Self {
            db,
            classifier,
            fetcher,
            hotspots,
        }
    }

    /// Analyze one report. Never panics and never returns an error: every
    /// failure is folded into the outcome.
    pub async fn process_report(&self, report_id: i64) -> ProcessOutcome {
        tracing::info!(report_id, "Processing report");

        let outcome = match self.run(report_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(report_id, error = %err, "Report processing failed");
                ProcessOutcome::failed(format!("Error processing report: {}", err))
            }
        };

        self.settle(report_id, &outcome).await;

        if outcome.success {
            tracing::info!(report_id, message = %outcome.message, "Report processed");
        } else {
            tracing::warn!(report_id, message = %outcome.message, "Report not analyzed");
        }

        outcome
    }

    async fn run(&self, report_id: i64) -> Result<ProcessOutcome> {
        let Some(report) = reports::load_report(&self.db, report_id).await? else {
            return Ok(ProcessOutcome::failed(format!(
                "Report {} not found",
                report_id
            )));
        };

        if analysis::analysis_for_report(&self.db, report_id)
            .await?
            .is_some()
        {
            return Ok(ProcessOutcome::already_analyzed(report_id));
        }

        let image_url = match report
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            Some(url) => url.to_string(),
            None => {
                reports::revert_to_submitted(&self.db, report_id).await?;
                return Ok(ProcessOutcome::failed(NO_IMAGE_MESSAGE));
            }
        };

        if !reports::begin_analysis(&self.db, report_id).await? {
            let current = reports::load_report(&self.db, report_id)
                .await?
                .map(|r| r.status);
            tracing::info!(report_id, status = ?current, "Report not claimable, skipping");
            return Ok(match current {
                Some(ReportStatus::Analyzing) => ProcessOutcome::in_progress(report_id),
                _ => ProcessOutcome::already_analyzed(report_id),
            });
        }

        match self.analyze(report, &image_url).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if let Err(revert_err) = reports::revert_to_submitted(&self.db, report_id).await {
                    tracing::warn!(
                        report_id,
                        error = %revert_err,
                        "Could not revert report to submitted"
                    );
                }
                Err(err)
            }
        }
    }

    /// Runs with the report held in `analyzing` by this run
    async fn analyze(&self, report: Report, image_url: &str) -> Result<ProcessOutcome> {
        let report_id = report.id;

        let image = match self.fetcher.fetch(image_url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(report_id, error = %err, "Image download failed");
                reports::revert_to_submitted(&self.db, report_id).await?;
                return Ok(ProcessOutcome::failed(ANALYSIS_FAILED_MESSAGE));
            }
        };

        let analysis = match self.classifier.classify(&image).await {
            Ok(analysis) => analysis,
            Err(err) => {
                tracing::error!(report_id, error = %err, "Classification failed");
                reports::revert_to_submitted(&self.db, report_id).await?;
                return Ok(ProcessOutcome::failed(ANALYSIS_FAILED_MESSAGE));
            }
        };

        if analysis.is_not_garbage() {
            self.record_not_garbage(&report, analysis).await
        } else {
            self.record_waste(report, analysis).await
        }
    }

    async fn record_not_garbage(&self, report: &Report, analysis: Analysis) -> Result<ProcessOutcome> {
        let mut tx = self.db.begin().await?;

        let waste_type = waste_types::get_or_create_waste_type(
            &mut tx,
            NOT_GARBAGE,
            &WasteTypeDefaults::not_garbage(),
        )
        .await?;

        reports::set_description_and_status(
            &mut *tx,
            report.id,
            NOT_GARBAGE_DESCRIPTION,
            ReportStatus::Analyzed,
        )
        .await?;

        analysis::insert_analysis(
            &mut *tx,
            &NewAnalysisRecord {
                report_id: report.id,
                waste_type_id: waste_type.id,
                confidence_score: analysis.waste_detection_confidence,
                estimated_volume: 0.0,
                severity_score: 1,
                priority_level: PriorityLevel::Low,
                analysis_notes: analysis.analysis_notes.clone(),
                full_description: analysis.full_description.clone(),
                processed_by: self.classifier.model_id().to_string(),
            },
        )
        .await?;

        audit::log_report_action(
            &mut *tx,
            audit::ACTION_REPORT_ANALYZED,
            report.id,
            &format!("Report {} analyzed: {}", report.id, NOT_GARBAGE),
        )
        .await?;

        tx.commit().await?;

        Ok(ProcessOutcome::succeeded(
            format!("Report {} analyzed successfully: {}", report.id, NOT_GARBAGE),
            analysis,
        ))
    }

    async fn record_waste(&self, report: Report, analysis: Analysis) -> Result<ProcessOutcome> {
        let description = report_description(&analysis);
        let estimated_volume = parse_volume(&analysis.estimated_volume);

        let mut tx = self.db.begin().await?;

        let waste_type = waste_types::get_or_create_waste_type(
            &mut tx,
            &analysis.waste_type,
            &WasteTypeDefaults::auto_generated(&analysis.waste_type),
        )
        .await?;

        reports::set_description_and_status(
            &mut *tx,
            report.id,
            &description,
            ReportStatus::Analyzed,
        )
        .await?;

        analysis::insert_analysis(
            &mut *tx,
            &NewAnalysisRecord {
                report_id: report.id,
                waste_type_id: waste_type.id,
                confidence_score: analysis.waste_detection_confidence,
                estimated_volume,
                severity_score: analysis.severity_score,
                priority_level: analysis.priority_level,
                analysis_notes: analysis.analysis_notes.clone(),
                full_description: analysis.full_description.clone(),
                processed_by: self.classifier.model_id().to_string(),
            },
        )
        .await?;

        tx.commit().await?;

        let submitted_description = report.description.clone();
        let analyzed = Report {
            description,
            status: ReportStatus::Analyzed,
            ..report
        };

        match self
            .hotspots
            .on_report_analyzed(&self.db, &analyzed, analysis.severity_score)
            .await
        {
            Ok(ClusterOutcome::BelowThreshold { neighbors }) => {
                tracing::debug!(report_id = analyzed.id, neighbors, "Report not clustered");
            }
            Ok(outcome) => {
                tracing::debug!(
                    report_id = analyzed.id,
                    hotspot_id = outcome.hotspot_id(),
                    "Report clustered"
                );
            }
            Err(err) => {
                self.undo_analysis(analyzed.id, &submitted_description).await;
                return Err(err);
            }
        }

        // Written once the report is clustered, so an undone analysis leaves no entry
        if let Err(err) = audit::log_report_action(
            &self.db,
            audit::ACTION_REPORT_ANALYZED,
            analyzed.id,
            &format!(
                "Report {} analyzed: {} (severity {}, {} priority)",
                analyzed.id, waste_type.name, analysis.severity_score, analysis.priority_level
            ),
        )
        .await
        {
            tracing::warn!(report_id = analyzed.id, error = %err, "Could not write audit entry");
        }

        Ok(ProcessOutcome::succeeded(
            format!("Report {} analyzed successfully", analyzed.id),
            analysis,
        ))
    }

    /// Drop a committed analysis so the report can be processed again
    async fn undo_analysis(&self, report_id: i64, description: &str) {
        let result = async {
            let mut tx = self.db.begin().await?;
            analysis::delete_analysis(&mut *tx, report_id).await?;
            reports::set_description_and_status(
                &mut *tx,
                report_id,
                description,
                ReportStatus::Submitted,
            )
            .await?;
            tx.commit().await?;
            Ok::<(), wastewatch_common::Error>(())
        }
        .await;

        if let Err(err) = result {
            tracing::error!(report_id, error = %err, "Could not undo analysis after clustering failure");
        }
    }

    /// Queue bookkeeping and failure audit; errors here are logged only
    async fn settle(&self, report_id: i64, outcome: &ProcessOutcome) {
        let completed = match outcome.disposition {
            QueueDisposition::Completed => true,
            QueueDisposition::Retry => false,
            QueueDisposition::Untouched => return,
        };

        if let Err(err) = queue::settle(&self.db, report_id, completed).await {
            tracing::warn!(report_id, error = %err, "Could not update queue entry");
        }

        if outcome.is_failure() {
            if let Err(err) = audit::log_report_action(
                &self.db,
                audit::ACTION_ANALYSIS_FAILED,
                report_id,
                &outcome.message,
            )
            .await
            {
                tracing::warn!(report_id, error = %err, "Could not write audit entry");
            }
        }
    }
}

/// Report description written after analysis: the classifier's short
/// description, or "{waste_type} waste" when it has none
pub fn report_description(analysis: &Analysis) -> String {
    let short = truncate_words(&analysis.short_description, SHORT_DESCRIPTION_WORDS);
    if short.is_empty() {
        format!("{} waste", analysis.waste_type)
    } else {
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis_with_short(short: &str) -> Analysis {
        Analysis {
            waste_type: "Plastic".to_string(),
            severity_score: 6,
            priority_level: PriorityLevel::Medium,
            environmental_impact: String::new(),
            estimated_volume: "1 cubic meter".to_string(),
            safety_concerns: String::new(),
            analysis_notes: String::new(),
            full_description: String::new(),
            waste_detection_confidence: 90.0,
            short_description: short.to_string(),
        }
    }

    #[test]
    fn test_report_description_truncates_to_eight_words() {
        let analysis = analysis_with_short("one two three four five six seven eight nine");
        assert_eq!(
            report_description(&analysis),
            "one two three four five six seven eight"
        );
    }

    #[test]
    fn test_report_description_falls_back_to_waste_type() {
        assert_eq!(report_description(&analysis_with_short("   ")), "Plastic waste");
    }
}
