use std::env;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_dir: String,
    pub ping_message: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
    pub gemini_analysis_max_output_tokens: i32,
    pub gemini_guide_max_output_tokens: i32,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub tmdb_default_query: String,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_port(name: &str, default: u16) -> Result<u16> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid {name} value: {value}")),
        _ => Ok(default),
    }
}

fn normalize_base_url(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Config {
            host: env_string("HOST", "0.0.0.0"),
            port: env_port("PORT", 8080)?,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_string("LOG_DIR", "logs"),
            ping_message: env_string("PING_MESSAGE", "ping"),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            )),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_analysis_max_output_tokens: env_i32("GEMINI_ANALYSIS_MAX_OUTPUT_TOKENS", 2000),
            gemini_guide_max_output_tokens: env_i32("GEMINI_GUIDE_MAX_OUTPUT_TOKENS", 3000),
            tmdb_api_key: env_string("TMDB_API_KEY", "").trim().to_string(),
            tmdb_base_url: normalize_base_url(env_string(
                "TMDB_BASE_URL",
                "https://api.themoviedb.org/3",
            )),
            tmdb_image_base_url: normalize_base_url(env_string(
                "TMDB_IMAGE_BASE_URL",
                "https://image.tmdb.org/t/p",
            )),
            tmdb_default_query: env_string("TMDB_DEFAULT_QUERY", "blade runner"),
        })
    }
}

pub const DEFAULT_USER_EQUIPMENT: &str = "basic DSLR setup";

pub const ANALYSIS_PROMPT: &str = r#"Analyze this cinematography shot in detail. Provide a JSON response with:

{
  "lighting": {
    "type": "three-point / natural / low-key / high-key",
    "keyLight": { "position": "description", "intensity": "soft/medium/hard", "color": "warm/neutral/cool" },
    "fillLight": { "position": "description", "intensity": "ratio to key" },
    "backLight": { "position": "description", "purpose": "description" },
    "practicals": ["list any visible practical lights"],
    "mood": "description"
  },
  "camera": {
    "focalLength": "estimated mm",
    "aperture": "estimated f-stop",
    "iso": "estimated ISO range",
    "shutterSpeed": "estimated",
    "movement": "static/pan/tilt/dolly/handheld/steadicam",
    "height": "eye-level/low-angle/high-angle/dutch"
  },
  "composition": {
    "ruleOfThirds": "yes/no with explanation",
    "leadingLines": "description if present",
    "symmetry": "symmetrical/asymmetrical",
    "depth": "shallow/medium/deep with foreground/midground/background elements",
    "headroom": "appropriate/tight/excessive",
    "lookingRoom": "description"
  },
  "colorGrading": {
    "palette": "description of color scheme",
    "contrast": "low/medium/high",
    "saturation": "desaturated/natural/vibrant/oversaturated",
    "temperature": "warm/neutral/cool with Kelvin estimate",
    "style": "description (e.g., teal and orange, vintage, cinematic, etc.)",
    "lut": "suggested LUT pack or style"
  },
  "mood": "overall emotional tone",
  "genre": "film genre this suits",
  "references": ["similar movies/cinematographers"]
}

Return ONLY valid JSON, no markdown code blocks."#;

/// Placeholders: `{analysis_json}`, `{user_equipment}`.
pub const GUIDE_PROMPT_TEMPLATE: &str = r#"Based on this cinematography analysis:
{analysis_json}

User has: {user_equipment}

Create a detailed, step-by-step recreation guide with:

# Recreation Guide

## Step 1: Camera Setup
- Exact camera settings (list aperture, ISO, shutter speed recommendations)
- Lens recommendation with focal length
- Alternative options for budget setups
- Settings summary

## Step 2: Lighting Setup
- Key light: position, type, modifier, distance, intensity
- Fill light: details and positioning
- Back light: details and purpose if applicable
- Any practical lights to use
- DIY alternatives for expensive equipment
- Quick lighting checklist

## Step 3: Composition & Framing
- How to position camera (height, distance, angle)
- Where to place subject or main action
- What to include in frame for depth
- Grid overlay suggestions (rule of thirds application)

## Step 4: Color Grading
- In-camera settings (picture profile if applicable)
- Recommended LUTs or manual adjustments
- Free alternatives to expensive plugins
- Step-by-step color correction in DaVinci Resolve (free)

## Step 5: Common Mistakes to Avoid
- List 5 pitfalls to avoid when recreating this look

## Budget Breakdown
- Professional setup: $X
- Intermediate setup: $Y
- Budget/DIY setup: $Z with specific equipment recommendations

## Pro Tips
- 3-5 professional tips for nailing this look
- Common challenges and how to overcome them

Format as markdown with clear headers. Be practical and specific."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_lose_trailing_slashes() {
        assert_eq!(
            normalize_base_url(" https://api.themoviedb.org/3/ ".to_string()),
            "https://api.themoviedb.org/3"
        );
    }

    #[test]
    fn guide_template_has_both_placeholders() {
        assert!(GUIDE_PROMPT_TEMPLATE.contains("{analysis_json}"));
        assert!(GUIDE_PROMPT_TEMPLATE.contains("{user_equipment}"));
        assert!(ANALYSIS_PROMPT.contains("\"backLight\""));
    }
}
