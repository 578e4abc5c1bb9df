//! Result of one pipeline run

use serde::{Deserialize, Serialize};

use super::Analysis;

/// What a finished run does to the report's queue row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueDisposition {
    /// Row is done; drains skip it from now on
    Completed,
    /// Row goes back to `pending` for the next drain
    #[default]
    Retry,
    /// Another run owns the report and settles the row itself
    Untouched,
}

/// What `process_report` reports back. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    #[serde(skip)]
    pub disposition: QueueDisposition,
}

impl ProcessOutcome {
    pub fn succeeded(message: impl Into<String>, analysis: Analysis) -> Self {
        Self {
            success: true,
            message: message.into(),
            analysis: Some(analysis),
            disposition: QueueDisposition::Completed,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            analysis: None,
            disposition: QueueDisposition::Retry,
        }
    }

    /// Report was analyzed by an earlier run
    pub fn already_analyzed(report_id: i64) -> Self {
        Self {
            disposition: QueueDisposition::Completed,
            ..Self::failed(format!("Report {} already analyzed", report_id))
        }
    }

    /// Report is being analyzed by a concurrent run
    pub fn in_progress(report_id: i64) -> Self {
        Self {
            disposition: QueueDisposition::Untouched,
            ..Self::failed(format!("Report {} is already being analyzed", report_id))
        }
    }

    /// Whether this run should leave a `report_analysis_failed` audit entry
    pub fn is_failure(&self) -> bool {
        self.disposition == QueueDisposition::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_analyzed_completes_queue_row() {
        let outcome = ProcessOutcome::already_analyzed(7);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Report 7 already analyzed");
        assert_eq!(outcome.disposition, QueueDisposition::Completed);
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_disposition_is_not_serialized() {
        let json = serde_json::to_value(ProcessOutcome::in_progress(3)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("disposition").is_none());
    }
}
