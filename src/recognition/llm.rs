//! OpenAI-compatible chat completion client
//!
//! Shared by the text extractor and the vision fallback. Both ask the model
//! for a single JSON object describing the component.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::candidate::{RecognitionCandidate, SourcePath};
use super::error::CollaboratorError;
use crate::classifier;

/// Chat completion client for one model on one endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
pub struct ChatMessage {
    role: &'static str,
    content: Value,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: Value::String(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: Value::String(text.into()),
        }
    }

    /// User turn carrying a prompt and an inline image
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: serde_json::json!([
                { "type": "text", "text": text.into() },
                { "type": "image_url", "image_url": { "url": image_url.into() } },
            ]),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Bound every request with a client-side timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one completion request and return the assistant's text
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CollaboratorError> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, "Sending request to {}", self.name);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(&self.name, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = format!("{} returned {}: {}", self.name, status, truncate(&error_body, 300));
            return Err(if is_transient(status) {
                CollaboratorError::unavailable(&self.name, message)
            } else {
                CollaboratorError::invalid_response(&self.name, message)
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            CollaboratorError::invalid_response(&self.name, format!("Failed to parse response: {}", e))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "{} responded with {} characters",
            self.name,
            content.len()
        );

        Ok(content)
    }
}

/// Statuses worth retrying later: auth, rate limits and server errors
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Component description as returned by the models.
///
/// Every field is optional and loosely typed; models routinely return
/// numbers as strings, `null` for unknown fields and arrays where objects
/// were asked for.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ComponentJson {
    pub component_type: Option<Value>,
    pub name: Option<Value>,
    pub part_number: Option<Value>,
    pub manufacturer: Option<Value>,
    pub specifications: Option<Value>,
    pub description: Option<Value>,
    pub tags: Option<Value>,
    pub visual_features: Option<Value>,
    pub recognition_confidence: Option<Value>,
}

/// Parse a model reply into a candidate
pub fn parse_component_reply(
    collaborator: &str,
    content: &str,
    source: SourcePath,
) -> Result<RecognitionCandidate, CollaboratorError> {
    let json = strip_code_fence(content);
    let parsed: ComponentJson = serde_json::from_str(json).map_err(|e| {
        debug!("Unparseable {} reply: {}", collaborator, truncate(content, 500));
        CollaboratorError::invalid_response(collaborator, format!("reply is not a JSON object: {}", e))
    })?;
    Ok(parsed.into_candidate(source))
}

impl ComponentJson {
    /// Validate and clean into a candidate
    pub fn into_candidate(self, source: SourcePath) -> RecognitionCandidate {
        let raw_type = text_field(self.component_type)
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        let component_type = classifier::normalize_type(&raw_type);
        let name = text_field(self.name).unwrap_or_else(|| "Unknown Component".to_string());

        let mut candidate =
            RecognitionCandidate::new(component_type, name, confidence_field(self.recognition_confidence), source);
        candidate.part_number = text_field(self.part_number);
        candidate.manufacturer = text_field(self.manufacturer);
        candidate.specifications = specifications_field(self.specifications);
        candidate.tags = tags_field(self.tags);

        let description = text_field(self.description);
        let features = text_field(self.visual_features);
        candidate.description = match (description, features) {
            (Some(d), Some(f)) => Some(format!("{} (visual features: {})", d, f)),
            (Some(d), None) => Some(d),
            (None, Some(f)) => Some(format!("Visual features: {}", f)),
            (None, None) => None,
        };

        candidate
    }
}

/// String-like value, `None` for null, empty or "null"
fn text_field(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text.to_string())
    }
}

/// Confidence clamped to 0-100; missing or garbage counts as 50
fn confidence_field(value: Option<Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|v| v.is_finite())
        .unwrap_or(50.0)
        .clamp(0.0, 100.0)
        .round() as u8
}

/// Specifications must be an object; other shapes are dropped
fn specifications_field(value: Option<Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(key, value)| text_field(Some(value)).map(|v| (key, v)))
        .collect()
}

fn tags_field(value: Option<Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|v| text_field(Some(v)))
        .collect()
}
