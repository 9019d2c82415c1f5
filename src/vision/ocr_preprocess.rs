//! Image preprocessing for OCR
//!
//! Component markings are small, low contrast and often laser-etched, so the
//! recognizer tries several preprocessing strategies and keeps the best text.

use image::{imageops::FilterType, GrayImage, Luma, RgbImage};
use imageproc::contrast::{self, ThresholdType};
use imageproc::filter;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Preprocessing strategy applied before running OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrStrategy {
    /// Upscale, denoise and equalise. Good for most printed labels.
    Balanced,
    /// Greyscale and upscale only. Clean, high-contrast photos.
    Minimal,
    /// Blur, binarise, denoise. Faint or etched markings.
    Aggressive,
}

impl OcrStrategy {
    /// Order in which strategies are attempted
    pub const ORDER: [OcrStrategy; 3] = [
        OcrStrategy::Balanced,
        OcrStrategy::Minimal,
        OcrStrategy::Aggressive,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OcrStrategy::Balanced => "balanced",
            OcrStrategy::Minimal => "minimal",
            OcrStrategy::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for OcrStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one preprocessing strategy, producing a greyscale image for OCR
pub fn preprocess(image: &RgbImage, strategy: OcrStrategy) -> GrayImage {
    let gray = to_grayscale(image);
    debug!(
        "Preprocessing {}x{} image with {} strategy",
        gray.width(),
        gray.height(),
        strategy
    );

    match strategy {
        OcrStrategy::Minimal => upscale_to_height(&gray, 800, 1200),
        OcrStrategy::Balanced => {
            let scaled = upscale_to_height(&gray, 1000, 1500);
            let denoised = filter::median_filter(&scaled, 1, 1);
            contrast::equalize_histogram(&denoised)
        }
        OcrStrategy::Aggressive => {
            let blurred = filter::gaussian_blur_f32(&gray, 1.0);
            let level = contrast::otsu_level(&blurred);
            let binary = contrast::threshold(&blurred, level, ThresholdType::Binary);
            let denoised = filter::median_filter(&binary, 1, 1);
            upscale_to_height(&denoised, 800, 1200)
        }
    }
}

/// Luminance greyscale (ITU-R BT.601 weights)
fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([gray as u8])
    })
}

/// Upscale so the image is `target` pixels tall when shorter than `below`
fn upscale_to_height(image: &GrayImage, below: u32, target: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if height == 0 || height >= below {
        return image.clone();
    }

    let scale = target as f32 / height as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    image::imageops::resize(image, new_w, target, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_grayscale() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        // 0.299 * 255 = 76.245
        assert_eq!(to_grayscale(&img).get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn test_minimal_upscales_small_images() {
        let img = RgbImage::from_pixel(100, 50, Rgb([200, 200, 200]));
        let out = preprocess(&img, OcrStrategy::Minimal);
        assert_eq!(out.height(), 1200);
        assert_eq!(out.width(), 2400);
    }

    #[test]
    fn test_large_images_keep_their_size() {
        let img = RgbImage::from_pixel(60, 1600, Rgb([200, 200, 200]));
        for strategy in OcrStrategy::ORDER {
            assert_eq!(preprocess(&img, strategy).dimensions(), (60, 1600));
        }
    }

    #[test]
    fn test_balanced_targets_taller_height() {
        let img = RgbImage::from_pixel(40, 20, Rgb([90, 90, 90]));
        assert_eq!(preprocess(&img, OcrStrategy::Balanced).height(), 1500);
    }

    #[test]
    fn test_aggressive_output_is_binary() {
        let mut img = RgbImage::from_pixel(60, 1000, Rgb([230, 230, 230]));
        for y in 400..600 {
            for x in 20..40 {
                img.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let out = preprocess(&img, OcrStrategy::Aggressive);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(30, 500).0[0], 0);
        assert_eq!(out.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn test_strategy_order_and_names() {
        let names: Vec<_> = OcrStrategy::ORDER.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["balanced", "minimal", "aggressive"]);
    }
}
