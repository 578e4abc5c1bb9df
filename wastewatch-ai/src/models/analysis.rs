//! Classifier payloads
//!
//! Model output is loosely typed: numbers arrive as strings, booleans as
//! "yes", lists where a sentence was asked for. The `Raw*` structs accept
//! those shapes; a field that is present but cannot be coerced is a
//! deserialization error, which the classifier treats as a parse failure.

use serde::{Deserialize, Serialize};
use wastewatch_common::db::PriorityLevel;

/// Stage A answer as sent by the model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWasteGate {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub contains_waste: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reasoning: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub full_description: Option<String>,
}

/// Stage B answer as sent by the model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDetailedAssessment {
    #[serde(default, deserialize_with = "lenient::text")]
    pub waste_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub severity_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub priority_level: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub environmental_impact: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub estimated_volume: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub safety_concerns: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub analysis_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub full_description: Option<String>,
}

/// Normalized Stage A result
#[derive(Debug, Clone, PartialEq)]
pub struct WasteGate {
    pub contains_waste: bool,
    /// 0-100, absent when the model omitted it
    pub confidence: Option<f64>,
    pub reasoning: String,
    /// At most eight words
    pub short_description: String,
    pub full_description: String,
}

/// Normalized Stage B result
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedAssessment {
    pub waste_type: String,
    pub severity_score: u8,
    pub priority_level: PriorityLevel,
    pub environmental_impact: String,
    pub estimated_volume: String,
    pub safety_concerns: String,
    pub analysis_notes: String,
    pub full_description: String,
}

/// Merged classifier output handed to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub waste_type: String,
    pub severity_score: u8,
    pub priority_level: PriorityLevel,
    pub environmental_impact: String,
    /// Free text, e.g. "about 2 cubic meters"
    pub estimated_volume: String,
    pub safety_concerns: String,
    pub analysis_notes: String,
    pub full_description: String,
    pub waste_detection_confidence: f64,
    pub short_description: String,
}

impl Analysis {
    pub fn is_not_garbage(&self) -> bool {
        self.waste_type
            .trim()
            .eq_ignore_ascii_case(wastewatch_common::db::NOT_GARBAGE)
    }
}

/// First `max_words` whitespace-separated words of `text`
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, got \"{}\"", s))),
            Some(other) => Err(D::Error::custom(format!("expected a number, got {}", other))),
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Some(true)),
                "false" | "no" => Ok(Some(false)),
                _ => Err(D::Error::custom(format!("expected a boolean, got \"{}\"", s))),
            },
            Some(other) => Err(D::Error::custom(format!("expected a boolean, got {}", other))),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            Some(other) => Some(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gate_accepts_stringly_typed_fields() {
        let raw: RawWasteGate = serde_json::from_value(json!({
            "contains_waste": "Yes",
            "confidence": "87.5",
            "reasoning": "Bags on the roadside"
        }))
        .unwrap();

        assert_eq!(raw.contains_waste, Some(true));
        assert_eq!(raw.confidence, Some(87.5));
        assert!(raw.short_description.is_none());
    }

    #[test]
    fn test_gate_rejects_uncoercible_confidence() {
        let result = serde_json::from_value::<RawWasteGate>(json!({
            "contains_waste": true,
            "confidence": "very"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_detailed_accepts_numeric_volume_and_list_concerns() {
        let raw: RawDetailedAssessment = serde_json::from_value(json!({
            "waste_type": "Plastic",
            "severity_score": 7,
            "estimated_volume": 2.5,
            "safety_concerns": ["sharp edges", "runoff"]
        }))
        .unwrap();

        assert_eq!(raw.estimated_volume.as_deref(), Some("2.5"));
        assert_eq!(raw.safety_concerns.as_deref(), Some("sharp edges; runoff"));
        assert_eq!(raw.severity_score, Some(7.0));
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(
            truncate_words("one two three four five six seven eight nine ten", 8),
            "one two three four five six seven eight"
        );
        assert_eq!(truncate_words("  spaced   out  ", 8), "spaced out");
        assert_eq!(truncate_words("", 8), "");
    }

    #[test]
    fn test_not_garbage_detection_ignores_case() {
        let analysis = Analysis {
            waste_type: "not garbage".to_string(),
            severity_score: 1,
            priority_level: PriorityLevel::Low,
            environmental_impact: String::new(),
            estimated_volume: "0".to_string(),
            safety_concerns: String::new(),
            analysis_notes: String::new(),
            full_description: String::new(),
            waste_detection_confidence: 90.0,
            short_description: String::new(),
        };
        assert!(analysis.is_not_garbage());
    }
}
