use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CinematographyAnalysis {
    pub lighting: Lighting,
    pub camera: Camera,
    pub composition: Composition,
    pub color_grading: ColorGrading,
    pub mood: String,
    pub genre: String,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lighting {
    #[serde(rename = "type")]
    pub lighting_type: String,
    pub key_light: KeyLight,
    pub fill_light: FillLight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_light: Option<BackLight>,
    pub practicals: Vec<String>,
    pub mood: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyLight {
    pub position: String,
    pub intensity: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillLight {
    pub position: String,
    pub intensity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackLight {
    pub position: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub focal_length: String,
    pub aperture: String,
    pub iso: String,
    pub shutter_speed: String,
    pub movement: String,
    pub height: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub rule_of_thirds: String,
    pub leading_lines: String,
    pub symmetry: String,
    pub depth: String,
    pub headroom: String,
    pub looking_room: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorGrading {
    pub palette: String,
    pub contrast: String,
    pub saturation: String,
    pub temperature: String,
    pub style: String,
    pub lut: String,
}

/// One successful analysis. `id` is the creation time in Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub analysis: CinematographyAnalysis,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideResult {
    pub guide: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieShot {
    pub id: i64,
    pub title: String,
    pub year: String,
    pub backdrop: Option<String>,
    pub stills: Vec<Still>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Still {
    pub url: String,
    pub thumbnail: String,
    pub aspect: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmdbShotsResponse {
    pub movies: Vec<MovieShot>,
}

// Request bodies keep every field optional so absence surfaces as a
// `MissingInput`/`MissingCredential` instead of a deserialization rejection.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeShotRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateGuideRequest {
    #[serde(default)]
    pub analysis: Option<CinematographyAnalysis>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub user_equipment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShotsQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample_analysis() -> CinematographyAnalysis {
    CinematographyAnalysis {
        lighting: Lighting {
            lighting_type: "low-key".to_string(),
            key_light: KeyLight {
                position: "45 degrees camera left".to_string(),
                intensity: "hard".to_string(),
                color: "cool".to_string(),
            },
            fill_light: FillLight {
                position: "camera right, bounced".to_string(),
                intensity: "1:8 to key".to_string(),
            },
            back_light: Some(BackLight {
                position: "behind subject, high".to_string(),
                purpose: "separate hair from the smoky background".to_string(),
            }),
            practicals: vec!["neon sign".to_string()],
            mood: "moody, isolated".to_string(),
        },
        camera: Camera {
            focal_length: "35mm".to_string(),
            aperture: "f/2.0".to_string(),
            iso: "800-1600".to_string(),
            shutter_speed: "1/48".to_string(),
            movement: "static".to_string(),
            height: "eye-level".to_string(),
        },
        composition: Composition {
            rule_of_thirds: "yes, subject on the left third".to_string(),
            leading_lines: "wet street reflections".to_string(),
            symmetry: "asymmetrical".to_string(),
            depth: "deep with haze in the background".to_string(),
            headroom: "tight".to_string(),
            looking_room: "generous to frame right".to_string(),
        },
        color_grading: ColorGrading {
            palette: "teal shadows, amber highlights".to_string(),
            contrast: "high".to_string(),
            saturation: "natural".to_string(),
            temperature: "cool, around 4300K".to_string(),
            style: "neo-noir".to_string(),
            lut: "Kodak 2383 print emulation".to_string(),
        },
        mood: "melancholic".to_string(),
        genre: "science fiction noir".to_string(),
        references: vec!["Blade Runner 2049".to_string(), "Roger Deakins".to_string()],
    }
}
