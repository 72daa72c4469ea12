use std::path::Path;

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

pub const VISION_API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: u64,
    pub max_faces: u32,
}

impl DetectorConfig {
    pub(crate) fn new() -> Self {
        DetectorConfig {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key: None,
            timeout: 30,
            max_faces: 10,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextGeneratorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model_name: String,
    pub timeout: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl TextGeneratorConfig {
    pub(crate) fn new() -> Self {
        TextGeneratorConfig {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model_name: "gpt-4o-mini".to_string(),
            timeout: 60,
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl Default for TextGeneratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Policy constants of the scorer and the composite indices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Approximate millimetres per pixel for the raw-distance metrics.
    pub pixel_to_mm: f64,
    pub lift_angle_weight: f64,
    pub lower_face_ratio_weight: f64,
    pub overall_cdi_weight: f64,
    pub overall_jla_weight: f64,
    pub overall_baseline: f64,
    pub slim_cheek_weight: f64,
    pub slim_jaw_weight: f64,
    pub slim_area_weight: f64,
    /// Saturation (percent) treated as an even skin tone.
    pub saturation_target: f64,
    /// Number of highest scoring dominant colours used for skin metrics.
    pub color_samples: usize,
}

impl ScoringConfig {
    pub(crate) fn new() -> Self {
        ScoringConfig {
            pixel_to_mm: 0.1,
            lift_angle_weight: 0.6,
            lower_face_ratio_weight: 0.4,
            overall_cdi_weight: 0.6,
            overall_jla_weight: 0.4,
            overall_baseline: 50.0,
            slim_cheek_weight: 0.4,
            slim_jaw_weight: 0.3,
            slim_area_weight: 0.3,
            saturation_target: 35.0,
            color_samples: 3,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Re-detect landmarks on a before image warped onto the after pose.
    pub realign: bool,
    pub fallback_commentary: String,
}

impl PipelineConfig {
    pub(crate) fn new() -> Self {
        PipelineConfig {
            realign: true,
            fallback_commentary: "Commentary could not be generated for this comparison.".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub text_generator: TextGeneratorConfig,
    pub scoring: ScoringConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Reads a JSON config file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Fills missing API keys from the environment.
    pub fn with_env_credentials(mut self) -> Self {
        if self.detector.api_key.is_none() {
            self.detector.api_key = std::env::var(VISION_API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        if self.text_generator.api_key.is_none() {
            self.text_generator.api_key = std::env::var(OPENAI_API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        self
    }
}
