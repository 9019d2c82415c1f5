//! Colour band segmentation
//!
//! Finds contiguous painted regions of canonical colours and returns them in
//! left-to-right order. Knows nothing about resistor semantics.

use image::{imageops::FilterType, GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info};

use super::color::{classify_pixel, CanonicalColor, ColorBandSequence};
use super::photo::Photo;

/// Configuration for band segmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Longest image side processed; larger photos are scaled down
    pub max_dimension: u32,
    /// Minimum contiguous area (pixels) for a region to count as a band
    pub min_band_area: u32,
    /// Regions larger than this fraction of the image are background
    pub max_band_area_fraction: f32,
    /// Maximum share of edge pixels inside a band (textured regions exceed it)
    pub max_local_edge_density: f32,
    /// Whole-image edge density above which the photo is treated as a busy board
    pub max_global_edge_density: f32,
    /// More distinct colours than this means the photo is not a resistor
    pub max_distinct_colors: usize,
    /// Canny hysteresis thresholds
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            min_band_area: 100,
            max_band_area_fraction: 0.4,
            max_local_edge_density: 0.2,
            max_global_edge_density: 0.15,
            max_distinct_colors: 6,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

/// A detected band before ordering
#[derive(Debug, Clone, PartialEq)]
pub struct BandRegion {
    pub color: CanonicalColor,
    /// Pixel count
    pub area: u32,
    /// Centroid (x, y)
    pub centroid: (f32, f32),
    /// Edge pixels / interior pixels
    pub edge_density: f32,
}

#[derive(Debug, Default)]
struct RegionStats {
    area: u32,
    sum_x: u64,
    sum_y: u64,
    interior: u32,
    interior_edges: u32,
}

/// Colour band segmenter
#[derive(Debug, Clone, Default)]
pub struct ColorSegmenter {
    config: SegmenterConfig,
}

impl ColorSegmenter {
    /// Create a segmenter with default thresholds
    pub fn new() -> Self {
        Self::with_config(SegmenterConfig::default())
    }

    /// Create a segmenter with custom thresholds
    pub fn with_config(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Segment a photo; undecodable photos yield no bands
    pub fn segment_photo(&self, photo: &Photo) -> ColorBandSequence {
        match photo.pixels() {
            Some(pixels) => self.segment(pixels),
            None => Vec::new(),
        }
    }

    /// Detect colour bands, left to right
    pub fn segment(&self, image: &RgbImage) -> ColorBandSequence {
        self.detect_regions(image)
            .into_iter()
            .map(|region| region.color)
            .collect()
    }

    /// Detect band regions with their statistics, left to right
    pub fn detect_regions(&self, image: &RgbImage) -> Vec<BandRegion> {
        let start = Instant::now();
        let image = self.downscale(image);
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let gray = image::DynamicImage::ImageRgb8(image.clone()).to_luma8();
        let edges = imageproc::edges::canny(&gray, self.config.canny_low, self.config.canny_high);

        let total = (width * height) as f32;
        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count() as f32;
        let global_density = edge_pixels / total;
        if global_density > self.config.max_global_edge_density {
            info!(
                "High edge density ({:.3}), likely a board or module, skipping band detection",
                global_density
            );
            return Vec::new();
        }

        let masks = build_color_masks(&image);
        let mut regions = Vec::new();
        for (color, mask) in &masks {
            regions.extend(self.regions_for_mask(*color, mask, &edges));
        }

        let distinct: BTreeSet<CanonicalColor> = regions.iter().map(|r| r.color).collect();
        if distinct.len() > self.config.max_distinct_colors {
            info!(
                "Too many distinct colours ({}), not a resistor",
                distinct.len()
            );
            return Vec::new();
        }

        order_left_to_right(&mut regions);

        debug!(
            "Band segmentation complete in {:?}: {:?}",
            start.elapsed(),
            regions.iter().map(|r| r.color.name()).collect::<Vec<_>>()
        );

        regions
    }

    /// Label a single colour mask and keep the regions that qualify as bands
    fn regions_for_mask(
        &self,
        color: CanonicalColor,
        mask: &GrayImage,
        edges: &GrayImage,
    ) -> Vec<BandRegion> {
        let (width, height) = mask.dimensions();
        let total = (width * height) as f32;
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        let mut stats: BTreeMap<u32, RegionStats> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0];
            if label == 0 {
                continue;
            }

            let entry = stats.entry(label).or_default();
            entry.area += 1;
            entry.sum_x += x as u64;
            entry.sum_y += y as u64;

            let same = |nx: i64, ny: i64| -> bool {
                nx >= 0
                    && ny >= 0
                    && (nx as u32) < width
                    && (ny as u32) < height
                    && labels.get_pixel(nx as u32, ny as u32).0[0] == label
            };
            let (xi, yi) = (x as i64, y as i64);
            if same(xi - 1, yi) && same(xi + 1, yi) && same(xi, yi - 1) && same(xi, yi + 1) {
                entry.interior += 1;
                if edges.get_pixel(x, y).0[0] > 0 {
                    entry.interior_edges += 1;
                }
            }
        }

        stats
            .into_values()
            .filter_map(|s| self.qualify(color, s, total))
            .collect()
    }

    /// Apply the area and smoothness thresholds to one region
    fn qualify(&self, color: CanonicalColor, stats: RegionStats, total: f32) -> Option<BandRegion> {
        if stats.area < self.config.min_band_area {
            return None;
        }
        if stats.area as f32 / total > self.config.max_band_area_fraction {
            debug!("Dropping {} region of {} px as background", color, stats.area);
            return None;
        }
        if stats.interior == 0 {
            return None;
        }

        let edge_density = stats.interior_edges as f32 / stats.interior as f32;
        if edge_density > self.config.max_local_edge_density {
            debug!(
                "Dropping textured {} region (edge density {:.3})",
                color, edge_density
            );
            return None;
        }

        Some(BandRegion {
            color,
            area: stats.area,
            centroid: (
                stats.sum_x as f32 / stats.area as f32,
                stats.sum_y as f32 / stats.area as f32,
            ),
            edge_density,
        })
    }

    fn downscale(&self, image: &RgbImage) -> RgbImage {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if longest <= self.config.max_dimension || self.config.max_dimension == 0 {
            return image.clone();
        }

        let scale = self.config.max_dimension as f32 / longest as f32;
        let new_w = ((width as f32 * scale) as u32).max(1);
        let new_h = ((height as f32 * scale) as u32).max(1);
        debug!("Downscaling {}x{} to {}x{} for segmentation", width, height, new_w, new_h);
        image::imageops::resize(image, new_w, new_h, FilterType::Triangle)
    }
}

/// One binary mask per palette colour present in the image
fn build_color_masks(image: &RgbImage) -> BTreeMap<CanonicalColor, GrayImage> {
    let (width, height) = image.dimensions();
    let mut masks: BTreeMap<CanonicalColor, GrayImage> = BTreeMap::new();

    for (x, y, pixel) in image.enumerate_pixels() {
        if let Some(color) = classify_pixel(pixel.0) {
            masks
                .entry(color)
                .or_insert_with(|| GrayImage::new(width, height))
                .put_pixel(x, y, Luma([255]));
        }
    }

    masks
}

/// Sort by centroid x, then y, then palette order
fn order_left_to_right(regions: &mut [BandRegion]) {
    regions.sort_by(|a, b| {
        a.centroid
            .0
            .total_cmp(&b.centroid.0)
            .then(a.centroid.1.total_cmp(&b.centroid.1))
            .then(a.color.cmp(&b.color))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const WHITE: Rgb<u8> = Rgb([250, 250, 250]);
    const BROWN: Rgb<u8> = Rgb([120, 60, 20]);
    const BLACK: Rgb<u8> = Rgb([10, 10, 10]);
    const RED: Rgb<u8> = Rgb([200, 20, 20]);
    const GOLD: Rgb<u8> = Rgb([190, 170, 120]);
    const ORANGE: Rgb<u8> = Rgb([230, 120, 20]);

    /// 200x100 white card with 20x60 stripes starting at x=20, 60, 100, ...
    /// The card stays one connected background region.
    fn striped(colors: &[Rgb<u8>]) -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 100, WHITE);
        for (i, color) in colors.iter().enumerate() {
            let x0 = 20 + i as u32 * 40;
            for x in x0..x0 + 20 {
                for y in 20..80 {
                    img.put_pixel(x, y, *color);
                }
            }
        }
        img
    }

    #[test]
    fn test_four_band_resistor() {
        let img = striped(&[BROWN, BLACK, RED, GOLD]);
        let bands = ColorSegmenter::new().segment(&img);
        assert_eq!(
            bands,
            vec![
                CanonicalColor::Brown,
                CanonicalColor::Black,
                CanonicalColor::Red,
                CanonicalColor::Gold,
            ]
        );
    }

    #[test]
    fn test_repeated_colour_yields_separate_bands() {
        let img = striped(&[ORANGE, ORANGE, BROWN, GOLD]);
        let bands = ColorSegmenter::new().segment(&img);
        assert_eq!(
            bands,
            vec![
                CanonicalColor::Orange,
                CanonicalColor::Orange,
                CanonicalColor::Brown,
                CanonicalColor::Gold,
            ]
        );
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let img = striped(&[BROWN, BLACK, RED, GOLD]);
        let segmenter = ColorSegmenter::new();
        assert_eq!(segmenter.segment(&img), segmenter.segment(&img));
    }

    #[test]
    fn test_blank_image_has_no_bands() {
        let img = RgbImage::from_pixel(200, 100, WHITE);
        assert!(ColorSegmenter::new().segment(&img).is_empty());
    }

    #[test]
    fn test_speckles_below_min_area_are_dropped() {
        let mut img = RgbImage::from_pixel(200, 100, WHITE);
        for (x, y) in [(10, 10), (50, 50), (150, 80)] {
            for dx in 0..3 {
                for dy in 0..3 {
                    img.put_pixel(x + dx, y + dy, RED);
                }
            }
        }
        assert!(ColorSegmenter::new().segment(&img).is_empty());
    }

    #[test]
    fn test_undecodable_photo_has_no_bands() {
        let photo = Photo::from_bytes(b"junk".to_vec());
        assert!(ColorSegmenter::new().segment_photo(&photo).is_empty());
    }

    #[test]
    fn test_textured_region_is_rejected() {
        let segmenter = ColorSegmenter::new();
        let mut mask = GrayImage::new(60, 60);
        let mut edges = GrayImage::new(60, 60);
        for y in 5..35 {
            for x in 5..35 {
                mask.put_pixel(x, y, Luma([255]));
                if (x + y) % 2 == 0 {
                    edges.put_pixel(x, y, Luma([255]));
                }
            }
        }
        let regions = segmenter.regions_for_mask(CanonicalColor::Blue, &mask, &edges);
        assert!(regions.is_empty());

        let smooth = GrayImage::new(60, 60);
        let regions = segmenter.regions_for_mask(CanonicalColor::Blue, &mask, &smooth);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 900);
        assert!((regions[0].centroid.0 - 19.5).abs() < 1e-3);
    }

    #[test]
    fn test_busy_image_is_skipped() {
        let mut img = RgbImage::from_pixel(100, 100, WHITE);
        for y in 0..100 {
            for x in 0..100 {
                if (x / 4 + y / 4) % 2 == 0 {
                    img.put_pixel(x, y, BLACK);
                }
            }
        }
        assert!(ColorSegmenter::new().segment(&img).is_empty());
    }

    #[test]
    fn test_large_photo_is_downscaled() {
        let config = SegmenterConfig {
            max_dimension: 100,
            min_band_area: 20,
            ..Default::default()
        };
        let img = striped(&[BROWN, BLACK, RED, GOLD]);
        let segmenter = ColorSegmenter::with_config(config);
        let regions = segmenter.detect_regions(&img);
        assert!(regions.iter().all(|r| r.centroid.0 < 100.0));
    }
}
