//! Vision extraction via an OpenAI-compatible chat-completions API.
//!
//! The image travels as a base64 data URL; the output shape travels as a
//! strict JSON Schema (`response_format.type = json_schema`) so the model
//! answers with a single JSON object. Works against the hosted OpenAI API
//! and against local servers exposing `/v1/chat/completions` (Ollama,
//! vLLM, llama.cpp).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ExtractionError, ExtractionPort};
use crate::config::Config;
use crate::models::{AnalysisResult, OutputShape};

const USER_PROMPT: &str = "Extract the structured data from this document image.";

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: Value,
    strict: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

// ──────────────────────────────────────────────
// VisionExtractor
// ──────────────────────────────────────────────

/// Production extraction port backed by an OpenAI-compatible vision model.
pub struct VisionExtractor {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl VisionExtractor {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ExtractionError> {
        Self::new(
            &config.vision_base_url,
            &config.vision_model,
            config.vision_api_key.clone(),
            config.extraction_timeout,
        )
    }

    fn build_request<'a>(
        &'a self,
        shape: OutputShape,
        instructions: &'a str,
        image: &[u8],
    ) -> ChatRequest<'a> {
        let data_url = format!(
            "data:{};base64,{}",
            detect_image_mime(image),
            base64::engine::general_purpose::STANDARD.encode(image)
        );

        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::System {
                    content: instructions,
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_url },
                        },
                    ],
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: shape.schema_name(),
                    schema: shape.json_schema(),
                    strict: true,
                },
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_timeout() {
            ExtractionError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ExtractionError::Connection(self.base_url.clone())
        } else {
            ExtractionError::HttpClient(e.to_string())
        }
    }
}

#[async_trait]
impl ExtractionPort for VisionExtractor {
    async fn extract(
        &self,
        shape: OutputShape,
        instructions: &str,
        image: &[u8],
    ) -> Result<AnalysisResult, ExtractionError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(shape, instructions, image);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Timeout(self.timeout_secs)
            } else {
                ExtractionError::MalformedResponse(e.to_string())
            }
        })?;

        let result = parse_reply(shape, parsed)?;

        tracing::info!(
            model = %self.model,
            shape = shape.schema_name(),
            image_size = image.len(),
            status = result.status.as_str(),
            elapsed_ms = %start.elapsed().as_millis(),
            "Vision extraction complete"
        );

        Ok(result)
    }
}

/// Turn the first chat choice into a shape-conforming analysis.
fn parse_reply(shape: OutputShape, response: ChatResponse) -> Result<AnalysisResult, ExtractionError> {
    let reply = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| ExtractionError::MalformedResponse("response has no choices".into()))?;

    if let Some(refusal) = reply.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(ExtractionError::Refused(refusal));
    }

    let content = reply
        .content
        .ok_or_else(|| ExtractionError::MalformedResponse("response has no content".into()))?;

    let value: Value = serde_json::from_str(strip_code_fence(&content))
        .map_err(|e| ExtractionError::MalformedResponse(format!("content is not JSON: {e}")))?;

    shape.conform(value).map_err(ExtractionError::ShapeMismatch)
}

/// Local models sometimes wrap JSON in a Markdown fence despite the schema.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// Sniff the image MIME type from magic bytes, defaulting to JPEG.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }
    if bytes.starts_with(b"GIF8") {
        return "image/gif";
    }
    if bytes.starts_with(b"%PDF") {
        return "application/pdf";
    }
    // WebP: RIFF....WEBP
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return "image/webp";
    }
    // HEIF/HEIC: ....ftyp at offset 4
    if bytes.len() >= 12 && bytes[4..8] == *b"ftyp" {
        let brand = &bytes[8..12];
        if brand == b"heic" || brand == b"heix" || brand == b"mif1" {
            return "image/heic";
        }
    }
    "image/jpeg"
}

// ──────────────────────────────────────────────
// MockExtractor
// ──────────────────────────────────────────────

/// Mock extraction port. Returns a configured JSON document (checked
/// against the requested shape) or a configured failure.
pub struct MockExtractor {
    response: Result<Value, String>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new(response: Value) -> Self {
        Self {
            response: Ok(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionPort for MockExtractor {
    async fn extract(
        &self,
        shape: OutputShape,
        _instructions: &str,
        _image: &[u8],
    ) -> Result<AnalysisResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(value) => shape
                .conform(value.clone())
                .map_err(ExtractionError::ShapeMismatch),
            Err(message) => Err(ExtractionError::MalformedResponse(message.clone())),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
