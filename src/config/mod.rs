//! Application Configuration
//!
//! User settings stored in TOML format. API keys are never written to the
//! file; each model section names the environment variable holding its key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::recognition::policy::RecognitionPolicy;
use crate::vision::ocr_preprocess::OcrStrategy;
use crate::vision::segmenter::SegmenterConfig;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Acceptance policy and fallback behaviour
    pub recognition: RecognitionSettings,
    /// Colour band segmentation thresholds
    pub segmentation: SegmenterConfig,
    /// Tesseract OCR settings
    pub ocr: OcrSettings,
    /// Text extraction model
    pub extractor: ExtractorSettings,
    /// Vision fallback model
    pub vision: VisionSettings,
    /// Local inventory database
    pub inventory: InventorySettings,
}

/// Recognition policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Minimum confidence for an accepted result
    pub acceptance_floor: u8,
    /// Local candidates at or above this confidence skip the vision fallback
    pub skip_fallback_threshold: u8,
    /// Confidence assigned to a decoded resistor
    pub color_confidence: u8,
    /// Minimum trimmed OCR text length handed to the extractor
    pub min_text_chars: usize,
    /// Minimum number of bands before decoding is attempted
    pub min_color_bands: usize,
    /// Upper bound on a single vision call
    pub vision_timeout_secs: u64,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            acceptance_floor: RecognitionPolicy::ACCEPTANCE_FLOOR,
            skip_fallback_threshold: RecognitionPolicy::SKIP_FALLBACK_THRESHOLD,
            color_confidence: RecognitionPolicy::COLOR_CONFIDENCE,
            min_text_chars: RecognitionPolicy::MIN_TEXT_CHARS,
            min_color_bands: RecognitionPolicy::MIN_COLOR_BANDS,
            vision_timeout_secs: 30,
        }
    }
}

impl RecognitionSettings {
    pub fn policy(&self) -> RecognitionPolicy {
        RecognitionPolicy {
            acceptance_floor: self.acceptance_floor,
            skip_fallback_threshold: self.skip_fallback_threshold,
            color_confidence: self.color_confidence,
            min_text_chars: self.min_text_chars,
            min_color_bands: self.min_color_bands,
        }
    }
}

/// Tesseract settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Run OCR at all
    pub enabled: bool,
    /// Tesseract executable (name on PATH or absolute path)
    pub binary: String,
    /// Tesseract language pack
    pub language: String,
    /// Preprocessing strategies, tried in order
    pub strategies: Vec<OcrStrategy>,
    /// Sparse-text results shorter than this retry with automatic page segmentation
    pub sparse_retry_below: usize,
    /// Stop trying strategies once text is longer than this
    pub good_enough_chars: usize,
    /// Per-invocation timeout
    pub timeout_secs: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            strategies: OcrStrategy::ORDER.to_vec(),
            sparse_retry_below: 5,
            good_enough_chars: 15,
            timeout_secs: 20,
        }
    }
}

/// OpenAI-compatible text extraction model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Use the model; when false only offline pattern extraction runs
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

impl ExtractorSettings {
    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }
}

/// OpenAI-compatible vision model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

impl VisionSettings {
    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }
}

/// Inventory database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Database file; defaults to `inventory.db` in the data directory
    pub database_path: Option<PathBuf>,
    /// Minimum quantity given to new components when none is specified
    pub default_minimum_quantity: u32,
}

fn read_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|key| !key.trim().is_empty())
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Recognition defaults
        assert_eq!(config.recognition.acceptance_floor, 20);
        assert_eq!(config.recognition.skip_fallback_threshold, 25);
        assert_eq!(config.recognition.color_confidence, 70);
        assert_eq!(config.recognition.min_text_chars, 5);
        assert_eq!(config.recognition.vision_timeout_secs, 30);

        // Segmentation defaults
        assert_eq!(config.segmentation.max_dimension, 800);
        assert_eq!(config.segmentation.min_band_area, 100);

        // OCR defaults
        assert_eq!(config.ocr.binary, "tesseract");
        assert_eq!(config.ocr.strategies, OcrStrategy::ORDER.to_vec());
        assert_eq!(config.ocr.good_enough_chars, 15);

        // Model defaults
        assert_eq!(config.extractor.model, "llama-3.3-70b-versatile");
        assert_eq!(config.extractor.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.vision.model, "gpt-4o");
        assert_eq!(config.vision.api_key_env, "OPENAI_API_KEY");

        assert!(config.inventory.database_path.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.recognition.acceptance_floor, parsed.recognition.acceptance_floor);
        assert_eq!(config.ocr.strategies, parsed.ocr.strategies);
        assert_eq!(config.extractor.base_url, parsed.extractor.base_url);
        assert_eq!(config.segmentation.max_distinct_colors, parsed.segmentation.max_distinct_colors);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [recognition]
            acceptance_floor = 40

            [ocr]
            strategies = ["minimal"]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.recognition.acceptance_floor, 40);
        assert_eq!(parsed.recognition.color_confidence, 70);
        assert_eq!(parsed.ocr.strategies, vec![OcrStrategy::Minimal]);
        assert_eq!(parsed.ocr.language, "eng");
        assert_eq!(parsed.vision.model, "gpt-4o");
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = RecognitionSettings::default();
        settings.skip_fallback_threshold = 50;
        let policy = settings.policy();
        assert_eq!(policy.skip_fallback_threshold, 50);
        assert_eq!(policy.acceptance_floor, 20);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.inventory.database_path = Some(PathBuf::from("/tmp/parts.db"));

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.inventory.database_path, Some(PathBuf::from("/tmp/parts.db")));
        assert_eq!(config.ocr.timeout_secs, loaded.ocr.timeout_secs);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_api_key_env() {
        let mut settings = ExtractorSettings::default();
        settings.api_key_env = "PARTSCAN_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(settings.api_key().is_none());
    }
}
