use tracing::info;

use crate::config::{Config, DEFAULT_USER_EQUIPMENT, GUIDE_PROMPT_TEMPLATE};
use crate::error::PipelineError;
use crate::llm::gemini::{generate_content, GenerationRequest};
use crate::models::{CinematographyAnalysis, GuideResult};

const GUIDE_FALLBACK_ERROR: &str = "Failed to generate guide";

pub fn build_guide_prompt(analysis: &CinematographyAnalysis, user_equipment: &str) -> String {
    let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_else(|_| "{}".to_string());
    GUIDE_PROMPT_TEMPLATE
        .replace("{analysis_json}", &analysis_json)
        .replace("{user_equipment}", user_equipment)
}

/// Turns an analysis into a markdown recreation guide. An empty model reply
/// yields an empty guide rather than an error.
pub async fn generate_guide(
    config: &Config,
    analysis: Option<&CinematographyAnalysis>,
    api_key: Option<&str>,
    user_equipment: Option<&str>,
) -> Result<GuideResult, PipelineError> {
    let analysis =
        analysis.ok_or_else(|| PipelineError::MissingInput("analysis is required".to_string()))?;
    let api_key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| PipelineError::MissingCredential("apiKey is required".to_string()))?;
    let user_equipment = user_equipment
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER_EQUIPMENT);

    let prompt = build_guide_prompt(analysis, user_equipment);
    info!("Generating recreation guide for equipment: {}", user_equipment);

    let guide = generate_content(
        config,
        GenerationRequest {
            api_key,
            prompt: &prompt,
            image: None,
            max_output_tokens: config.gemini_guide_max_output_tokens,
            operation: "generate_guide",
            fallback_error: GUIDE_FALLBACK_ERROR,
        },
    )
    .await?
    .unwrap_or_default();

    Ok(GuideResult { guide })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_analysis;
    use crate::utils::test_support::{gemini_text_response, spawn_gemini_stub, test_config};
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn prompt_embeds_analysis_equipment_and_outline() {
        let prompt = build_guide_prompt(&sample_analysis(), "iPhone 15 and a reflector");
        assert!(prompt.contains("\"focalLength\": \"35mm\""));
        assert!(prompt.contains("User has: iPhone 15 and a reflector"));
        for heading in [
            "## Step 1: Camera Setup",
            "## Step 2: Lighting Setup",
            "## Step 3: Composition & Framing",
            "## Step 4: Color Grading",
            "## Step 5: Common Mistakes to Avoid",
            "## Budget Breakdown",
            "## Pro Tips",
        ] {
            assert!(prompt.contains(heading), "missing {heading}");
        }
        assert!(!prompt.contains("{analysis_json}"));
    }

    #[tokio::test]
    async fn returns_model_text_verbatim() {
        let base = spawn_gemini_stub(
            StatusCode::OK,
            gemini_text_response("# Recreation Guide\n\n## Step 1: Camera Setup\n"),
        )
        .await;
        let config = test_config(&base, &base);
        let analysis = sample_analysis();

        let result = generate_guide(&config, Some(&analysis), Some("gem-key"), None)
            .await
            .unwrap();
        assert_eq!(result.guide, "# Recreation Guide\n\n## Step 1: Camera Setup\n");
    }

    #[tokio::test]
    async fn empty_reply_is_an_empty_guide() {
        let base = spawn_gemini_stub(StatusCode::OK, json!({ "candidates": [] })).await;
        let config = test_config(&base, &base);
        let analysis = sample_analysis();

        let result = generate_guide(&config, Some(&analysis), Some("gem-key"), Some(""))
            .await
            .unwrap();
        assert_eq!(result.guide, "");
    }

    #[tokio::test]
    async fn credential_is_checked_regardless_of_analysis_content() {
        let config = test_config("http://127.0.0.1:9", "http://127.0.0.1:9");
        let mut analysis = sample_analysis();
        analysis.lighting.back_light = None;
        analysis.references.clear();

        for key in [None, Some(""), Some("   ")] {
            let err = generate_guide(&config, Some(&analysis), key, None)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "MissingCredential");
        }
    }

    #[tokio::test]
    async fn missing_analysis_is_reported_first() {
        let config = test_config("http://127.0.0.1:9", "http://127.0.0.1:9");
        let err = generate_guide(&config, None, None, None).await.unwrap_err();
        assert_eq!(err.kind(), "MissingInput");
    }

    #[tokio::test]
    async fn upstream_failure_keeps_raw_payload() {
        let payload = json!({ "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" } });
        let base = spawn_gemini_stub(StatusCode::FORBIDDEN, payload.clone()).await;
        let config = test_config(&base, &base);
        let analysis = sample_analysis();

        let err = generate_guide(&config, Some(&analysis), Some("gem-key"), None)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Permission denied");
        assert_eq!(err.details(), Some(&payload));
    }

    #[tokio::test]
    async fn unlabelled_failure_uses_guide_fallback() {
        let base = spawn_gemini_stub(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
        let config = test_config(&base, &base);
        let analysis = sample_analysis();

        let err = generate_guide(&config, Some(&analysis), Some("gem-key"), None)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), GUIDE_FALLBACK_ERROR);
    }
}
