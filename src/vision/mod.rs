//! Vision Layer
//!
//! Pixel-level work on component photos: colour classification and band
//! segmentation for the colour path, preprocessing and Tesseract OCR for
//! the text path.

pub mod color;
pub mod ocr;
pub mod ocr_preprocess;
pub mod photo;
pub mod segmenter;

pub use color::{CanonicalColor, ColorBandSequence};
pub use ocr::{OcrOutput, TesseractOcr, TextRecognizer};
pub use ocr_preprocess::OcrStrategy;
pub use photo::{Photo, PhotoError};
pub use segmenter::{BandRegion, ColorSegmenter, SegmenterConfig};
