//! Photo data structures for component images

use image::RgbImage;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Errors reading a photo from disk
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("failed to read photo {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A component photo: the raw encoded bytes plus decoded RGB pixels.
///
/// Undecodable input is kept as bytes with no pixels, so the pipeline can
/// still report an empty result instead of failing.
#[derive(Debug, Clone)]
pub struct Photo {
    bytes: Arc<[u8]>,
    pixels: Option<Arc<RgbImage>>,
}

impl Photo {
    /// Build a photo from encoded image bytes (JPEG, PNG, ...)
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let pixels = if bytes.is_empty() {
            None
        } else {
            match image::load_from_memory(&bytes) {
                Ok(img) => Some(Arc::new(img.to_rgb8())),
                Err(e) => {
                    warn!("Could not decode photo ({} bytes): {}", bytes.len(), e);
                    None
                }
            }
        };

        Self {
            bytes: bytes.into(),
            pixels,
        }
    }

    /// Build a photo from already decoded pixels
    pub fn from_rgb(image: RgbImage) -> Self {
        let mut encoded = Vec::new();
        if let Err(e) = image::DynamicImage::ImageRgb8(image.clone()).write_to(
            &mut std::io::Cursor::new(&mut encoded),
            image::ImageFormat::Png,
        ) {
            warn!("Could not encode photo as PNG: {}", e);
        }

        Self {
            bytes: encoded.into(),
            pixels: Some(Arc::new(image)),
        }
    }

    /// Read and decode a photo file
    pub async fn open(path: &Path) -> Result<Self, PhotoError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| PhotoError::Read {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Read {} bytes from {:?}", bytes.len(), path);
        Ok(Self::from_bytes(bytes))
    }

    /// Raw encoded bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decoded pixels, if the bytes were a readable image
    pub fn pixels(&self) -> Option<&RgbImage> {
        self.pixels.as_deref()
    }

    /// Shared handle to the decoded pixels
    pub fn shared_pixels(&self) -> Option<Arc<RgbImage>> {
        self.pixels.clone()
    }

    /// Get photo dimensions as (width, height)
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.pixels.as_ref().map(|p| p.dimensions())
    }

    /// Best-effort MIME type of the encoded bytes
    pub fn mime_type(&self) -> &'static str {
        match image::guess_format(&self.bytes) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::WebP) => "image/webp",
            Ok(image::ImageFormat::Gif) => "image/gif",
            _ => "image/jpeg",
        }
    }

    /// SHA-256 of the encoded bytes, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes_have_no_pixels() {
        let photo = Photo::from_bytes(Vec::new());
        assert!(photo.pixels().is_none());
        assert!(photo.dimensions().is_none());
    }

    #[test]
    fn test_garbage_bytes_have_no_pixels() {
        let photo = Photo::from_bytes(b"definitely not a jpeg".to_vec());
        assert!(photo.pixels().is_none());
        assert_eq!(photo.bytes().len(), 21);
    }

    #[test]
    fn test_from_rgb_roundtrips_through_png() {
        let img = RgbImage::from_pixel(8, 4, image::Rgb([10, 20, 30]));
        let photo = Photo::from_rgb(img);
        assert_eq!(photo.dimensions(), Some((8, 4)));
        assert_eq!(photo.mime_type(), "image/png");

        let decoded = Photo::from_bytes(photo.bytes().to_vec());
        assert_eq!(decoded.dimensions(), Some((8, 4)));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Photo::from_bytes(b"abc".to_vec());
        let b = Photo::from_bytes(b"abc".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            a.fingerprint(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
