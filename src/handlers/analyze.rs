use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Config, ANALYSIS_PROMPT};
use crate::error::PipelineError;
use crate::llm::gemini::{generate_content, GenerationRequest};
use crate::llm::media::load_image;
use crate::models::{AnalysisResult, CinematographyAnalysis};
use crate::utils::logging::truncate_for_log;

const ANALYSIS_FALLBACK_ERROR: &str = "Failed to analyze image";
const EMPTY_MODEL_OUTPUT: &str = "{}";

/// Picks the request credential when one was sent, else the configured key.
pub fn resolve_api_key(explicit: Option<&str>, configured: &str) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| Some(configured.trim()).filter(|key| !key.is_empty()))
        .map(str::to_string)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the info string (e.g. `json`), with or without a line break after it.
    body.trim_start_matches(|ch: char| ch.is_ascii_alphanumeric()).trim()
}

pub fn parse_analysis(text: &str) -> Result<CinematographyAnalysis, PipelineError> {
    serde_json::from_str::<CinematographyAnalysis>(strip_code_fence(text)).map_err(|err| {
        PipelineError::MalformedModelOutput {
            message: format!("Model output is not a valid cinematography analysis: {err}"),
            raw: truncate_for_log(text, 2000),
        }
    })
}

/// Fetches the image, asks Gemini for a structured breakdown and parses it.
pub async fn analyze_shot(
    config: &Config,
    image_url: Option<&str>,
    api_key: Option<&str>,
) -> Result<AnalysisResult, PipelineError> {
    let image_url = image_url
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| PipelineError::MissingInput("imageUrl is required".to_string()))?;
    let api_key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            PipelineError::MissingCredential("GEMINI_API_KEY not configured".to_string())
        })?;

    let image = load_image(image_url).await?;
    info!(
        "Analyzing shot: {} bytes of {}",
        image.bytes.len(),
        image.mime_type
    );

    let text = generate_content(
        config,
        GenerationRequest {
            api_key,
            prompt: ANALYSIS_PROMPT,
            image: Some(&image),
            max_output_tokens: config.gemini_analysis_max_output_tokens,
            operation: "analyze_shot",
            fallback_error: ANALYSIS_FALLBACK_ERROR,
        },
    )
    .await?;

    let text = text.unwrap_or_else(|| EMPTY_MODEL_OUTPUT.to_string());
    let analysis = parse_analysis(&text).inspect_err(|err| {
        warn!("Discarding unparsable analysis output: {err}");
    })?;

    Ok(AnalysisResult {
        id: Utc::now().timestamp_millis().to_string(),
        analysis,
        image_url: image_url.to_string(),
    })
}
