//! Two-stage waste classifier
//!
//! Stage A asks whether the image contains waste at all. Only a positive
//! answer triggers Stage B, the detailed assessment. Each stage runs under
//! the same [`RetryPolicy`]; what happens on exhaustion differs:
//!
//! | Stage | Transport exhausted      | Parse exhausted             |
//! |-------|--------------------------|-----------------------------|
//! | A     | classification fails     | "no waste" at confidence 75 |
//! | B     | `Unknown / 5 / medium`   | `Mixed / 5 / medium`        |

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use wastewatch_common::db::{PriorityLevel, NOT_GARBAGE};

use crate::models::analysis::{truncate_words, RawDetailedAssessment, RawWasteGate};
use crate::models::{Analysis, DetailedAssessment, WasteGate};
use crate::services::prompts::{DETAILED_ASSESSMENT_PROMPT, WASTE_GATE_PROMPT};
use crate::services::response_extractor::{extract, ParseError};
use crate::services::vision_client::{TransportError, VisionModel};
use crate::utils::{retry_with_policy, Exhaustion, RetryPolicy};

pub const SHORT_DESCRIPTION_WORDS: usize = 8;

/// Longest prefix of an unparseable reply kept as analysis notes
pub const NOTES_PREFIX_CHARS: usize = 500;

const DEFAULT_SEVERITY: u8 = 5;
const NOT_GARBAGE_CONFIDENCE: f64 = 90.0;
const WASTE_CONFIDENCE: f64 = 100.0;
const PARSE_FAILURE_CONFIDENCE: f64 = 75.0;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Waste detection unavailable after {attempts} attempts: {source}")]
    WasteGateUnavailable {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

/// Failure of a single stage attempt
#[derive(Debug)]
enum StageError {
    Transport(TransportError),
    Parse { error: ParseError, raw: String },
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Transport(e) => write!(f, "transport: {}", e),
            StageError::Parse { error, .. } => write!(f, "parse: {}", error),
        }
    }
}

pub struct TwoStageClassifier {
    model: Arc<dyn VisionModel>,
    policy: RetryPolicy,
}

impl TwoStageClassifier {
    pub fn new(model: Arc<dyn VisionModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Classify one image.
    ///
    /// Only Stage A transport exhaustion is an error; every other failure
    /// degrades to a default analysis.
    pub async fn classify(&self, image: &[u8]) -> Result<Analysis, ClassificationError> {
        let gate = self.detect_waste(image).await?;

        if !gate.contains_waste {
            tracing::info!(reasoning = %gate.reasoning, "Image does not contain waste");
            return Ok(not_garbage_analysis(gate));
        }

        let detail = self.assess_waste(image, &gate).await;

        tracing::info!(
            waste_type = %detail.waste_type,
            severity = detail.severity_score,
            priority = %detail.priority_level,
            "Detailed assessment complete"
        );

        Ok(merge(gate, detail))
    }

    async fn detect_waste(&self, image: &[u8]) -> Result<WasteGate, ClassificationError> {
        let model = &self.model;

        let result = retry_with_policy(
            "waste_gate",
            self.policy,
            |attempt| async move {
                tracing::debug!(attempt, "Requesting waste detection");
                let raw = model
                    .invoke(WASTE_GATE_PROMPT, Some(image))
                    .await
                    .map_err(StageError::Transport)?;
                parse_stage::<RawWasteGate>(&raw).map(normalize_gate)
            },
            |err, _| match err {
                StageError::Parse { .. } => Exhaustion::Fallback(WasteGate::parse_failure()),
                StageError::Transport(_) => Exhaustion::Fail,
            },
        )
        .await;

        match result {
            Ok(gate) => Ok(gate),
            Err(StageError::Transport(source)) => Err(ClassificationError::WasteGateUnavailable {
                attempts: self.policy.max_attempts,
                source,
            }),
            Err(StageError::Parse { .. }) => Ok(WasteGate::parse_failure()),
        }
    }

    async fn assess_waste(&self, image: &[u8], gate: &WasteGate) -> DetailedAssessment {
        let model = &self.model;
        let attempts = self.policy.max_attempts;

        let result = retry_with_policy(
            "detailed_assessment",
            self.policy,
            |attempt| async move {
                tracing::debug!(attempt, "Requesting detailed assessment");
                let raw = model
                    .invoke(DETAILED_ASSESSMENT_PROMPT, Some(image))
                    .await
                    .map_err(StageError::Transport)?;
                parse_stage::<RawDetailedAssessment>(&raw).map(|r| normalize_detail(r, gate))
            },
            |err, attempts| Exhaustion::Fallback(detail_fallback(err, attempts, gate)),
        )
        .await;

        result.unwrap_or_else(|err| detail_fallback(&err, attempts, gate))
    }
}

fn parse_stage<T: DeserializeOwned>(raw: &str) -> Result<T, StageError> {
    let parse_error = |error| StageError::Parse {
        error,
        raw: raw.to_string(),
    };

    let object = extract(raw).map_err(parse_error)?;
    serde_json::from_value(Value::Object(object))
        .map_err(|e| parse_error(ParseError::Schema(e.to_string())))
}

fn normalize_gate(raw: RawWasteGate) -> WasteGate {
    let reasoning = raw.reasoning.unwrap_or_default().trim().to_string();
    let short_description = truncate_words(
        raw.short_description.as_deref().unwrap_or_default(),
        SHORT_DESCRIPTION_WORDS,
    );

    let full_description = match raw.full_description.map(|s| s.trim().to_string()) {
        Some(full) if !full.is_empty() => full,
        _ => {
            let lead = if reasoning.is_empty() {
                "No details available."
            } else {
                reasoning.as_str()
            };
            format!("{} {}", lead, short_description).trim().to_string()
        }
    };

    WasteGate {
        contains_waste: raw.contains_waste.unwrap_or(false),
        confidence: raw
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 100.0)),
        reasoning,
        short_description,
        full_description,
    }
}

fn normalize_detail(raw: RawDetailedAssessment, gate: &WasteGate) -> DetailedAssessment {
    let severity_score = raw
        .severity_score
        .filter(|s| s.is_finite())
        .map(|s| s.round().clamp(1.0, 10.0) as u8)
        .unwrap_or(DEFAULT_SEVERITY);

    let priority_level = raw
        .priority_level
        .as_deref()
        .and_then(|p| p.parse::<PriorityLevel>().ok())
        .unwrap_or_else(|| PriorityLevel::from_severity(severity_score));

    DetailedAssessment {
        waste_type: non_empty(raw.waste_type).unwrap_or_else(|| "Mixed".to_string()),
        severity_score,
        priority_level,
        environmental_impact: raw.environmental_impact.unwrap_or_default(),
        estimated_volume: non_empty(raw.estimated_volume).unwrap_or_else(|| "Unknown".to_string()),
        safety_concerns: raw.safety_concerns.unwrap_or_default(),
        analysis_notes: raw.analysis_notes.unwrap_or_default(),
        full_description: non_empty(raw.full_description)
            .unwrap_or_else(|| gate.full_description.clone()),
    }
}

fn detail_fallback(err: &StageError, attempts: u32, gate: &WasteGate) -> DetailedAssessment {
    match err {
        StageError::Parse { raw, .. } => DetailedAssessment {
            waste_type: "Mixed".to_string(),
            severity_score: DEFAULT_SEVERITY,
            priority_level: PriorityLevel::Medium,
            environmental_impact: "Unable to determine from image after multiple attempts"
                .to_string(),
            estimated_volume: "Unknown".to_string(),
            safety_concerns: "Unable to determine from image after multiple attempts".to_string(),
            analysis_notes: truncate_notes(raw),
            full_description: gate.full_description.clone(),
        },
        StageError::Transport(e) => DetailedAssessment {
            waste_type: "Unknown".to_string(),
            severity_score: DEFAULT_SEVERITY,
            priority_level: PriorityLevel::Medium,
            environmental_impact: "Unknown - analysis failed".to_string(),
            estimated_volume: "Unknown".to_string(),
            safety_concerns: "Unknown - analysis failed".to_string(),
            analysis_notes: format!("Analysis failed after {} attempts. Error: {}", attempts, e),
            full_description: gate.full_description.clone(),
        },
    }
}

fn not_garbage_analysis(gate: WasteGate) -> Analysis {
    let analysis_notes = format!(
        "This image does not appear to contain waste material. {}",
        gate.reasoning
    )
    .trim_end()
    .to_string();

    Analysis {
        waste_type: NOT_GARBAGE.to_string(),
        severity_score: 1,
        priority_level: PriorityLevel::Low,
        environmental_impact: "None - not waste material".to_string(),
        estimated_volume: "0".to_string(),
        safety_concerns: "None".to_string(),
        analysis_notes,
        waste_detection_confidence: gate.confidence.unwrap_or(NOT_GARBAGE_CONFIDENCE),
        short_description: if gate.short_description.is_empty() {
            "Not garbage".to_string()
        } else {
            gate.short_description
        },
        full_description: gate.full_description,
    }
}

fn merge(gate: WasteGate, detail: DetailedAssessment) -> Analysis {
    let short_description = if gate.short_description.is_empty() {
        format!(
            "{} waste, {} priority",
            detail.waste_type, detail.priority_level
        )
    } else {
        gate.short_description
    };

    let full_description = if detail.full_description.trim().is_empty() {
        gate.full_description
    } else {
        detail.full_description
    };

    Analysis {
        waste_type: detail.waste_type,
        severity_score: detail.severity_score,
        priority_level: detail.priority_level,
        environmental_impact: detail.environmental_impact,
        estimated_volume: detail.estimated_volume,
        safety_concerns: detail.safety_concerns,
        analysis_notes: detail.analysis_notes,
        full_description,
        waste_detection_confidence: gate.confidence.unwrap_or(WASTE_CONFIDENCE),
        short_description,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn truncate_notes(raw: &str) -> String {
    if raw.chars().count() <= NOTES_PREFIX_CHARS {
        return raw.to_string();
    }
    let prefix: String = raw.chars().take(NOTES_PREFIX_CHARS).collect();
    format!("{}... (truncated)", prefix)
}

impl WasteGate {
    /// Stand-in when Stage A never produced parseable output
    pub fn parse_failure() -> Self {
        Self {
            contains_waste: false,
            confidence: Some(PARSE_FAILURE_CONFIDENCE),
            reasoning: "Failed to parse response after multiple attempts, defaulting to no waste detection".to_string(),
            short_description: "Unable to determine content".to_string(),
            full_description: "Unable to generate a detailed description due to parsing issues after multiple attempts.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies in order and records which prompts were sent
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, TransportError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        fn model_id(&self) -> &str {
            "scripted"
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

    fn ok(text: &str) -> Result<String, TransportError> {
        Ok(text.to_string())
    }

    fn down() -> Result<String, TransportError> {
        Err(TransportError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    fn classifier(model: Arc<ScriptedModel>) -> TwoStageClassifier {
        TwoStageClassifier::new(model, RetryPolicy::immediate(3))
    }

    const GATE_YES: &str = r#"{"contains_waste": true, "confidence": 88, "reasoning": "bags dumped by the river", "short_description": "Plastic bags dumped along a riverbank near several houses", "full_description": "Several plastic bags lie on the riverbank."}"#;

    #[tokio::test]
    async fn test_negative_gate_skips_detailed_stage() {
        let model = ScriptedModel::new(vec![ok(
            r#"{"contains_waste": false, "confidence": 95, "reasoning": "a tidy office desk", "short_description": "Office desk", "full_description": "A clean desk."}"#,
        )]);

        let analysis = classifier(model.clone()).classify(b"img").await.unwrap();

        assert!(analysis.is_not_garbage());
        assert_eq!(analysis.severity_score, 1);
        assert_eq!(analysis.priority_level, PriorityLevel::Low);
        assert_eq!(analysis.estimated_volume, "0");
        assert_eq!(analysis.waste_detection_confidence, 95.0);
        assert_eq!(analysis.short_description, "Office desk");
        assert_eq!(model.calls(), vec![WASTE_GATE_PROMPT.to_string()]);
    }

    #[tokio::test]
    async fn test_positive_gate_then_detailed_assessment() {
        let model = ScriptedModel::new(vec![
            ok(GATE_YES),
            ok(r#"Sure! {"waste_type": "Plastic", "severity_score": 7, "priority_level": "High", "estimated_volume": "2 cubic meters", "environmental_impact": "river pollution", "safety_concerns": "none", "analysis_notes": "schedule cleanup", "full_description": "Plastic waste near water."}"#),
        ]);

        let analysis = classifier(model.clone()).classify(b"img").await.unwrap();

        assert_eq!(analysis.waste_type, "Plastic");
        assert_eq!(analysis.severity_score, 7);
        assert_eq!(analysis.priority_level, PriorityLevel::High);
        assert_eq!(analysis.waste_detection_confidence, 88.0);
        assert_eq!(
            analysis.short_description,
            "Plastic bags dumped along a riverbank near several"
        );
        assert_eq!(analysis.full_description, "Plastic waste near water.");
        assert_eq!(model.calls().len(), 2);
        assert_eq!(model.calls()[1], DETAILED_ASSESSMENT_PROMPT);
    }

    #[tokio::test]
    async fn test_gate_transport_exhaustion_is_fatal() {
        let model = ScriptedModel::new(vec![down(), down(), down()]);

        let result = classifier(model.clone()).classify(b"img").await;

        assert!(matches!(
            result,
            Err(ClassificationError::WasteGateUnavailable { attempts: 3, .. })
        ));
        assert_eq!(model.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_gate_parse_exhaustion_defaults_to_not_garbage() {
        let model = ScriptedModel::new(vec![ok("no idea"), ok("still prose"), ok("{broken")]);

        let analysis = classifier(model.clone()).classify(b"img").await.unwrap();

        assert!(analysis.is_not_garbage());
        assert_eq!(analysis.waste_detection_confidence, 75.0);
        assert_eq!(analysis.short_description, "Unable to determine content");
        assert_eq!(model.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_gate_recovers_after_one_parse_failure() {
        let model = ScriptedModel::new(vec![
            ok("hmm"),
            ok(GATE_YES),
            ok(r#"{"waste_type": "Plastic", "severity_score": 4}"#),
        ]);

        let analysis = classifier(model.clone()).classify(b"img").await.unwrap();

        assert_eq!(analysis.waste_type, "Plastic");
        assert_eq!(analysis.priority_level, PriorityLevel::Medium);
        assert_eq!(model.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_detail_parse_exhaustion_uses_mixed_defaults() {
        let long_prose = "x".repeat(800);
        let model = ScriptedModel::new(vec![
            ok(GATE_YES),
            ok("not json"),
            ok("still not json"),
            ok(&long_prose),
        ]);

        let analysis = classifier(model).classify(b"img").await.unwrap();

        assert_eq!(analysis.waste_type, "Mixed");
        assert_eq!(analysis.severity_score, 5);
        assert_eq!(analysis.priority_level, PriorityLevel::Medium);
        assert_eq!(analysis.estimated_volume, "Unknown");
        assert!(analysis.analysis_notes.starts_with(&"x".repeat(NOTES_PREFIX_CHARS)));
        assert!(analysis.analysis_notes.ends_with("... (truncated)"));
        assert_eq!(analysis.full_description, "Several plastic bags lie on the riverbank.");
    }

    #[tokio::test]
    async fn test_detail_transport_exhaustion_uses_unknown_defaults() {
        let model = ScriptedModel::new(vec![ok(GATE_YES), down(), down(), down()]);

        let analysis = classifier(model).classify(b"img").await.unwrap();

        assert_eq!(analysis.waste_type, "Unknown");
        assert_eq!(analysis.severity_score, 5);
        assert_eq!(analysis.priority_level, PriorityLevel::Medium);
        assert!(analysis.analysis_notes.contains("after 3 attempts"));
    }

    #[tokio::test]
    async fn test_detail_mixed_failures_last_error_decides() {
        // Transport, transport, then an unparseable reply: parse fallback wins
        let model = ScriptedModel::new(vec![ok(GATE_YES), down(), down(), ok("garbled")]);

        let analysis = classifier(model).classify(b"img").await.unwrap();

        assert_eq!(analysis.waste_type, "Mixed");
        assert_eq!(analysis.analysis_notes, "garbled");
    }

    #[tokio::test]
    async fn test_severity_clamped_and_priority_derived() {
        let model = ScriptedModel::new(vec![
            ok(GATE_YES),
            ok(r#"{"waste_type": " Electronic ", "severity_score": "14", "priority_level": "urgent"}"#),
        ]);

        let analysis = classifier(model).classify(b"img").await.unwrap();

        assert_eq!(analysis.waste_type, "Electronic");
        assert_eq!(analysis.severity_score, 10);
        assert_eq!(analysis.priority_level, PriorityLevel::Critical);
    }

    #[tokio::test]
    async fn test_missing_short_description_is_synthesized() {
        let model = ScriptedModel::new(vec![
            ok(r#"{"contains_waste": true, "confidence": 70, "reasoning": "rubble"}"#),
            ok(r#"{"waste_type": "Construction", "severity_score": 6, "priority_level": "medium"}"#),
        ]);

        let analysis = classifier(model).classify(b"img").await.unwrap();

        assert_eq!(analysis.short_description, "Construction waste, medium priority");
        assert_eq!(analysis.full_description, "rubble");
    }

    #[test]
    fn test_truncate_notes_keeps_short_text() {
        assert_eq!(truncate_notes("short"), "short");
    }
}
