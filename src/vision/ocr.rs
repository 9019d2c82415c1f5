//! OCR (Optical Character Recognition) module
//!
//! Runs the Tesseract CLI over several preprocessed variants of the photo
//! and keeps the longest text.

use async_trait::async_trait;
use image::{GrayImage, RgbImage};
use std::io::Cursor;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ocr_preprocess::{preprocess, OcrStrategy};
use super::photo::Photo;
use crate::config::OcrSettings;
use crate::recognition::error::CollaboratorError;

/// Best-effort text read from a photo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    /// Raw text, possibly empty
    pub text: String,
    /// Preprocessing strategy that produced `text`
    pub strategy: Option<OcrStrategy>,
}

/// Extracts printed text from a photo. Carries no confidence of its own.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize_text(&self, photo: &Photo) -> Result<OcrOutput, CollaboratorError>;
}

/// Tesseract page segmentation modes
const PSM_SPARSE_TEXT: u8 = 11;
const PSM_AUTO: u8 = 3;

/// Tesseract CLI backend
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    settings: OcrSettings,
}

impl TesseractOcr {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// Run one Tesseract pass on a greyscale image
    async fn run_tesseract(&self, image: &GrayImage, psm: u8) -> Result<String, CollaboratorError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| CollaboratorError::invalid_response(self.name(), format!("PNG encoding failed: {}", e)))?;

        let mut child = Command::new(&self.settings.binary)
            .args(["stdin", "stdout", "--oem", "3", "--psm"])
            .arg(psm.to_string())
            .arg("-l")
            .arg(&self.settings.language)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CollaboratorError::unavailable(
                    self.name(),
                    format!("failed to start '{}': {}", self.settings.binary, e),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .await
                .map_err(|e| CollaboratorError::unavailable(self.name(), format!("failed to send image: {}", e)))?;
        }

        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CollaboratorError::unavailable(self.name(), format!("timed out after {:?}", timeout)))?
            .map_err(|e| CollaboratorError::unavailable(self.name(), e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::unavailable(
                self.name(),
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Sparse-text pass, retried in automatic mode when it finds too little
    async fn read_variant(&self, image: &GrayImage) -> Result<String, CollaboratorError> {
        let sparse = self.run_tesseract(image, PSM_SPARSE_TEXT).await?;
        if sparse.chars().count() >= self.settings.sparse_retry_below {
            return Ok(sparse);
        }

        let auto = self.run_tesseract(image, PSM_AUTO).await?;
        Ok(longer(sparse, auto))
    }
}

fn longer(a: String, b: String) -> String {
    if b.chars().count() > a.chars().count() {
        b
    } else {
        a
    }
}

async fn preprocess_blocking(
    pixels: Arc<RgbImage>,
    strategy: OcrStrategy,
) -> Result<GrayImage, CollaboratorError> {
    tokio::task::spawn_blocking(move || preprocess(&pixels, strategy))
        .await
        .map_err(|e| CollaboratorError::invalid_response("tesseract", format!("preprocessing task failed: {}", e)))
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize_text(&self, photo: &Photo) -> Result<OcrOutput, CollaboratorError> {
        let Some(pixels) = photo.shared_pixels() else {
            debug!("Photo has no decodable pixels, skipping OCR");
            return Ok(OcrOutput::default());
        };

        let mut best = OcrOutput::default();
        let mut first_error: Option<CollaboratorError> = None;
        for &strategy in &self.settings.strategies {
            let attempt = match preprocess_blocking(pixels.clone(), strategy).await {
                Ok(processed) => self.read_variant(&processed).await,
                Err(e) => Err(e),
            };
            let text = match attempt {
                Ok(text) => text,
                Err(e) => {
                    warn!("OCR strategy {} failed: {}", strategy, e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            debug!("OCR strategy {} read {} characters", strategy, text.chars().count());

            if text.chars().count() > best.text.chars().count() {
                best = OcrOutput {
                    text,
                    strategy: Some(strategy),
                };
            }

            if best.text.chars().count() > self.settings.good_enough_chars {
                break;
            }
        }

        if best.text.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
            info!("OCR found no text");
        } else {
            info!(
                "OCR read {} characters using {} preprocessing",
                best.text.chars().count(),
                best.strategy.map(|s| s.name()).unwrap_or("no")
            );
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longer_prefers_first_on_tie() {
        assert_eq!(longer("abc".into(), "xyz".into()), "abc");
        assert_eq!(longer("ab".into(), "xyz".into()), "xyz");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let settings = OcrSettings {
            binary: "/nonexistent/tesseract-binary".to_string(),
            strategies: vec![OcrStrategy::Minimal],
            ..OcrSettings::default()
        };
        let ocr = TesseractOcr::new(settings);
        let photo = Photo::from_rgb(RgbImage::from_pixel(20, 10, image::Rgb([255, 255, 255])));

        let err = ocr.recognize_text(&photo).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.collaborator(), "tesseract");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_strategy_keeps_earlier_text() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OcrSettings {
            binary: fake_tesseract::flaky(dir.path(), "NE555 TIMER")
                .display()
                .to_string(),
            strategies: OcrStrategy::ORDER.to_vec(),
            ..OcrSettings::default()
        };
        let ocr = TesseractOcr::new(settings);
        let photo = Photo::from_rgb(RgbImage::from_pixel(20, 40, image::Rgb([255, 255, 255])));

        let output = ocr.recognize_text(&photo).await.unwrap();
        assert_eq!(
            output,
            OcrOutput {
                text: "NE555 TIMER".to_string(),
                strategy: Some(OcrStrategy::Balanced),
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_every_strategy_failing_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OcrSettings {
            binary: fake_tesseract::flaky(dir.path(), "").display().to_string(),
            strategies: vec![OcrStrategy::Minimal, OcrStrategy::Minimal],
            ..OcrSettings::default()
        };
        // The first call succeeds with no text, every later one fails
        let ocr = TesseractOcr::new(settings);
        let photo = Photo::from_rgb(RgbImage::from_pixel(20, 40, image::Rgb([255, 255, 255])));

        let err = ocr.recognize_text(&photo).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_undecodable_photo_yields_empty_text() {
        let ocr = TesseractOcr::new(OcrSettings::default());
        let output = ocr
            .recognize_text(&Photo::from_bytes(b"not an image".to_vec()))
            .await
            .unwrap();
        assert!(output.text.is_empty());
        assert!(output.strategy.is_none());
    }
}
