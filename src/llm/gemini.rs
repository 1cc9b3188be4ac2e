use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::media::ImageFile;
use crate::utils::http::get_http_client;
use crate::utils::logging::{redact_secrets, truncate_for_log};
use crate::utils::timing::log_upstream_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

/// One `generateContent` call. The credential is always supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub api_key: &'a str,
    pub prompt: &'a str,
    pub image: Option<&'a ImageFile>,
    pub max_output_tokens: i32,
    pub operation: &'a str,
    /// Message used when the error envelope carries none.
    pub fallback_error: &'a str,
}

fn build_parts(prompt: &str, image: Option<&ImageFile>) -> Vec<Value> {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some(image) = image {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.to_base64()
            }
        }));
    }
    parts
}

fn build_payload(config: &Config, request: &GenerationRequest<'_>) -> Value {
    json!({
        "contents": [{ "parts": build_parts(request.prompt, request.image) }],
        "generationConfig": {
            "temperature": config.gemini_temperature,
            "maxOutputTokens": request.max_output_tokens,
        },
    })
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized: Vec<Value> = contents
            .iter()
            .map(|content| {
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_gemini_parts(parts))
                    .unwrap_or_default();
                json!({ "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

/// Pulls a human-readable message out of an error body: `.error.message`,
/// then `.message`. Also returns the body as JSON (or as a string when it is
/// not JSON) so callers can pass the raw payload along.
pub fn summarize_error_body(body: &str) -> (Option<String>, Option<Value>) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, None);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            })
            .filter(|message| !message.trim().is_empty());
        return (message, Some(value));
    }

    (None, Some(Value::String(truncate_for_log(trimmed, 2000))))
}

fn first_text(response: GeminiResponse) -> Option<String> {
    response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?
        .into_iter()
        .next()?
        .text
}

async fn call_gemini_api(
    config: &Config,
    request: &GenerationRequest<'_>,
    payload: &Value,
) -> Result<GeminiResponse, PipelineError> {
    let client = get_http_client();
    let url = format!(
        "{}/models/{}:generateContent",
        config.gemini_base_url, config.gemini_model
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        let payload_summary = summarize_gemini_payload(payload);
        debug!(target: "llm.gemini", model = %config.gemini_model, payload = %payload_summary);
    }

    let response = client
        .post(&url)
        .header("x-goog-api-key", request.api_key)
        .json(payload)
        .send()
        .await
        .map_err(|err| {
            let err_text = redact_secrets(&err.to_string(), [request.api_key]);
            warn!(
                "Gemini request failed to send: {} (timeout={}, connect={})",
                err_text,
                err.is_timeout(),
                err.is_connect()
            );
            PipelineError::transport(format!("Gemini request failed: {err_text}"))
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body = redact_secrets(&body, [request.api_key]);
        let (message, details) = summarize_error_body(&body);
        warn!(
            "Gemini API error: operation={}, status={}, body={}",
            request.operation,
            status,
            truncate_for_log(&body, 2000)
        );
        let message = message.unwrap_or_else(|| request.fallback_error.to_string());
        return Err(PipelineError::from_upstream(status.as_u16(), message, details));
    }

    response.json::<GeminiResponse>().await.map_err(|err| {
        PipelineError::MalformedModelOutput {
            message: format!("Invalid Gemini response body: {err}"),
            raw: String::new(),
        }
    })
}

/// Performs a single `generateContent` call and returns the first candidate's
/// first text part, if any. No retries.
pub async fn generate_content(
    config: &Config,
    request: GenerationRequest<'_>,
) -> Result<Option<String>, PipelineError> {
    let payload = build_payload(config, &request);
    let metadata = json!({
        "multimodal": request.image.is_some(),
        "imageBytes": request.image.map(|image| image.bytes.len()).unwrap_or(0),
        "maxOutputTokens": request.max_output_tokens,
    });

    log_upstream_timing(
        "gemini",
        &config.gemini_model,
        request.operation,
        Some(metadata),
        || async {
            let response = call_gemini_api(config, &request, &payload).await?;
            let text = first_text(response);
            if tracing::enabled!(tracing::Level::DEBUG) {
                let preview = text.as_deref().map(|value| truncate_for_log(value, 200));
                debug!(target: "llm.gemini", operation = request.operation, text_preview = ?preview);
            }
            Ok(text)
        },
    )
    .await
}
