//! Structured extractor: company and position via one completion call.
//!
//! Every failure mode degrades to [`ExtractionResult::unknown`]; a missing
//! key defaults only that field.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ExtractionError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionService};
use crate::pipeline::types::{ExtractionResult, UNKNOWN};

/// Longest body excerpt embedded in the prompt, in characters.
pub const MAX_PROMPT_BODY_CHARS: usize = 8000;

/// Sampling temperature. Zero for repeatable output.
const EXTRACTION_TEMPERATURE: f32 = 0.0;

const PROMPT_PREFIX: &str = "Extract the company name and position title from this job \
application confirmation email. Respond ONLY in JSON exactly like: \
{\"company\":\"...\", \"position\":\"...\"}.\n\nEmail:\n";

/// Fields for one message, plus why they fell back to the sentinel.
#[derive(Debug)]
pub struct Extraction {
    pub result: ExtractionResult,
    pub failure: Option<ExtractionError>,
}

/// Calls the completion service and parses its answer defensively.
pub struct StructuredExtractor {
    llm: Arc<dyn CompletionService>,
}

impl StructuredExtractor {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Extract fields, falling back to the sentinel on any failure.
    ///
    /// The failure, if any, is handed back so the caller can log and count it.
    pub async fn extract(&self, body: &str) -> Extraction {
        match self.try_extract(body).await {
            Ok(result) => Extraction {
                result,
                failure: None,
            },
            Err(e) => {
                debug!(error = %e, "Extraction failed, using placeholder fields");
                Extraction {
                    result: ExtractionResult::unknown(),
                    failure: Some(e),
                }
            }
        }
    }

    async fn try_extract(&self, body: &str) -> Result<ExtractionResult, ExtractionError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(build_prompt(body))])
            .with_temperature(EXTRACTION_TEMPERATURE);

        let raw = self.llm.complete(request).await?;
        if !(200..300).contains(&raw.status) {
            debug!(status = raw.status, "Completion service returned non-success status");
        }

        let content = parse_envelope(&raw.body)?;
        parse_fields(&content)
    }
}

/// The fixed instruction with the (truncated) body appended.
pub fn build_prompt(body: &str) -> String {
    let excerpt: String = body.chars().take(MAX_PROMPT_BODY_CHARS).collect();
    format!("{PROMPT_PREFIX}{excerpt}")
}

/// Pull the generated text out of a chat-completions envelope.
pub fn parse_envelope(body: &str) -> Result<String, ExtractionError> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| ExtractionError::MissingContent(format!("envelope is not JSON: {e}")))?;

    envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ExtractionError::MissingContent("no choices[0].message.content string".into())
        })
}

/// Parse generated text into fields. Missing keys default individually.
pub fn parse_fields(content: &str) -> Result<ExtractionResult, ExtractionError> {
    let json_str = extract_json_object(content);
    let value: Value =
        serde_json::from_str(&json_str).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(ExtractionError::NotAnObject)?;

    Ok(ExtractionResult {
        company: string_field(object, "company"),
        position: string_field(object, "position"),
    })
}

/// A non-blank string value, trimmed, or the sentinel.
fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Locate a JSON object in model output that may carry a code fence or prose.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
