//! Vision model client
//!
//! Sends a prompt, optionally with image bytes, to a hosted multimodal model
//! through the Bedrock `converse` API and returns the first text block of the
//! reply. Every failure comes back as a [`TransportError`] value.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use wastewatch_common::config::VisionConfig;

const USER_AGENT: &str = concat!("wastewatch-ai/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in a [`TransportError`]
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// A model that turns a prompt (plus optional image) into text
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Identifier recorded as `processed_by` on analysis rows
    fn model_id(&self) -> &str;

    async fn invoke(&self, prompt: &str, image: Option<&[u8]>) -> Result<String, TransportError>;
}

/// Decoding bounds sent with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.1,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConverseRequest {
    inference_config: ConverseInference,
    messages: Vec<ConverseMessage>,
}

#[derive(Debug, Serialize)]
struct ConverseInference {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ConverseMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ContentBlock {
    Text(String),
    Image(ImageBlock),
}

#[derive(Debug, Serialize)]
struct ImageBlock {
    format: &'static str,
    source: ImageSource,
}

#[derive(Debug, Serialize)]
struct ImageSource {
    /// Base64 of the raw image file
    bytes: String,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: Option<ConverseOutput>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<ConverseReply>,
}

#[derive(Debug, Deserialize)]
struct ConverseReply {
    #[serde(default)]
    content: Vec<ReplyBlock>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    text: Option<String>,
}

impl ConverseRequest {
    /// Single user turn; the image block is added only when bytes are present
    pub(crate) fn new(prompt: &str, image: Option<&[u8]>, inference: &InferenceConfig) -> Self {
        let mut content = vec![ContentBlock::Text(prompt.to_string())];
        if let Some(bytes) = image {
            content.push(ContentBlock::Image(ImageBlock {
                format: "jpeg",
                source: ImageSource {
                    bytes: BASE64.encode(bytes),
                },
            }));
        }

        Self {
            inference_config: ConverseInference {
                max_new_tokens: inference.max_tokens,
                temperature: inference.temperature,
                top_p: inference.top_p,
            },
            messages: vec![ConverseMessage {
                role: "user",
                content,
            }],
        }
    }
}

/// First text block of a `converse` reply
pub(crate) fn extract_reply_text(body: &str) -> Result<String, TransportError> {
    let response: ConverseResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::UnexpectedShape(format!("invalid JSON body: {}", e)))?;

    let text = response
        .output
        .and_then(|output| output.message)
        .and_then(|message| message.content.into_iter().next())
        .and_then(|block| block.text)
        .ok_or_else(|| {
            TransportError::UnexpectedShape("missing output.message.content[0].text".to_string())
        })?;

    if text.trim().is_empty() {
        return Err(TransportError::UnexpectedShape("empty reply text".to_string()));
    }

    Ok(text)
}

/// Bedrock `converse` client with bearer-token auth
pub struct BedrockVisionClient {
    http_client: reqwest::Client,
    endpoint: String,
    model_id: String,
    bearer_token: String,
    timeout: Duration,
    inference: InferenceConfig,
}

impl BedrockVisionClient {
    pub fn new(
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
        bearer_token: impl Into<String>,
        timeout: Duration,
        inference: InferenceConfig,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            model_id: model_id.into(),
            bearer_token: bearer_token.into(),
            timeout,
            inference,
        })
    }

    pub fn from_config(config: &VisionConfig, bearer_token: String) -> Result<Self, TransportError> {
        Self::new(
            config.endpoint.clone(),
            config.model_id.clone(),
            bearer_token,
            Duration::from_secs(config.timeout_secs),
            InferenceConfig {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            },
        )
    }

    fn converse_url(&self) -> String {
        format!(
            "{}/model/{}/converse",
            self.endpoint.trim_end_matches('/'),
            self.model_id
        )
    }
}

#[async_trait]
impl VisionModel for BedrockVisionClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, prompt: &str, image: Option<&[u8]>) -> Result<String, TransportError> {
        let request = ConverseRequest::new(prompt, image, &self.inference);

        tracing::debug!(
            model = %self.model_id,
            with_image = image.is_some(),
            image_bytes = image.map(|b| b.len()).unwrap_or(0),
            "Invoking vision model"
        );

        let response = self
            .http_client
            .post(self.converse_url())
            .bearer_auth(&self.bearer_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Vision model returned an error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        extract_reply_text(&body)
    }
}
