//! Structured response extraction
//!
//! Models wrap their JSON in prose or code fences. The extractor takes the
//! first balanced top-level `{...}` span, skipping braces inside string
//! literals, and hands it to `serde_json`. Text with no balanced span is
//! parsed whole.

use serde_json::{Map, Value};
use thiserror::Error;

pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Unexpected field value: {0}")]
    Schema(String),
}

/// Parse the first JSON object embedded in `text`
pub fn extract(text: &str) -> Result<JsonObject, ParseError> {
    let candidate = find_object_span(text).unwrap_or(text).trim();

    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(ParseError::NotAnObject("array")),
        Value::String(_) => Err(ParseError::NotAnObject("string")),
        Value::Number(_) => Err(ParseError::NotAnObject("number")),
        Value::Bool(_) => Err(ParseError::NotAnObject("boolean")),
        Value::Null => Err(ParseError::NotAnObject("null")),
    }
}

/// Byte span of the first balanced `{...}`, if any
pub fn find_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
