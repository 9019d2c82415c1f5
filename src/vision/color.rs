//! Canonical colour palette for resistor band detection
//!
//! Colours are matched in HSV space using OpenCV-style scaling
//! (hue 0-180, saturation and value 0-255).

use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One member of the fixed palette the segmenter is allowed to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalColor {
    Black,
    Brown,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    Gray,
    White,
    Gold,
    Silver,
    /// Explicitly absent band (no tolerance band painted)
    None,
}

/// Ordered left-to-right band colours as produced by the segmenter
pub type ColorBandSequence = Vec<CanonicalColor>;

impl CanonicalColor {
    /// Every palette member, in palette order
    pub const ALL: [CanonicalColor; 13] = [
        CanonicalColor::Black,
        CanonicalColor::Brown,
        CanonicalColor::Red,
        CanonicalColor::Orange,
        CanonicalColor::Yellow,
        CanonicalColor::Green,
        CanonicalColor::Blue,
        CanonicalColor::Violet,
        CanonicalColor::Gray,
        CanonicalColor::White,
        CanonicalColor::Gold,
        CanonicalColor::Silver,
        CanonicalColor::None,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalColor::Black => "black",
            CanonicalColor::Brown => "brown",
            CanonicalColor::Red => "red",
            CanonicalColor::Orange => "orange",
            CanonicalColor::Yellow => "yellow",
            CanonicalColor::Green => "green",
            CanonicalColor::Blue => "blue",
            CanonicalColor::Violet => "violet",
            CanonicalColor::Gray => "gray",
            CanonicalColor::White => "white",
            CanonicalColor::Gold => "gold",
            CanonicalColor::Silver => "silver",
            CanonicalColor::None => "none",
        }
    }
}

impl fmt::Display for CanonicalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for colour names outside the palette
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a canonical band colour")]
pub struct UnknownColor(pub String);

impl FromStr for CanonicalColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let color = match s.trim().to_ascii_lowercase().as_str() {
            "black" => CanonicalColor::Black,
            "brown" => CanonicalColor::Brown,
            "red" => CanonicalColor::Red,
            "orange" => CanonicalColor::Orange,
            "yellow" => CanonicalColor::Yellow,
            "green" => CanonicalColor::Green,
            "blue" => CanonicalColor::Blue,
            "violet" | "purple" => CanonicalColor::Violet,
            "gray" | "grey" => CanonicalColor::Gray,
            "white" => CanonicalColor::White,
            "gold" => CanonicalColor::Gold,
            "silver" => CanonicalColor::Silver,
            "none" => CanonicalColor::None,
            _ => return Err(UnknownColor(s.to_string())),
        };
        Ok(color)
    }
}

/// Inclusive HSV box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Pixel classification table. Evaluated top to bottom, first match wins,
/// so every pixel maps to at most one colour.
///
/// Achromatic colours come first. Gold and silver are metallic, keyed on
/// low saturation at mid brightness rather than on hue. Red wraps the hue
/// origin and is tested in a low and a high window.
pub const COLOR_TABLE: &[(CanonicalColor, &[HsvRange])] = &[
    (CanonicalColor::Black, &[HsvRange::new([0, 0, 0], [180, 255, 40])]),
    (CanonicalColor::White, &[HsvRange::new([0, 0, 200], [180, 30, 255])]),
    (CanonicalColor::Silver, &[HsvRange::new([0, 0, 150], [180, 40, 199])]),
    (CanonicalColor::Gray, &[HsvRange::new([0, 0, 41], [180, 40, 149])]),
    (CanonicalColor::Gold, &[HsvRange::new([15, 41, 90], [35, 99, 200])]),
    (
        CanonicalColor::Red,
        &[
            HsvRange::new([0, 70, 50], [4, 255, 255]),
            HsvRange::new([5, 70, 131], [10, 255, 255]),
            HsvRange::new([170, 70, 50], [180, 255, 255]),
        ],
    ),
    (CanonicalColor::Brown, &[HsvRange::new([5, 41, 41], [25, 255, 130])]),
    (CanonicalColor::Orange, &[HsvRange::new([11, 100, 131], [24, 255, 255])]),
    (CanonicalColor::Yellow, &[HsvRange::new([25, 100, 100], [35, 255, 255])]),
    (CanonicalColor::Green, &[HsvRange::new([36, 50, 50], [85, 255, 255])]),
    (CanonicalColor::Blue, &[HsvRange::new([86, 80, 50], [130, 255, 255])]),
    (CanonicalColor::Violet, &[HsvRange::new([131, 50, 50], [169, 255, 255])]),
];

/// Convert an RGB pixel to HSV (H 0-180, S 0-255, V 0-255)
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let hsv: Hsv = Hsv::from_color(Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>());
    let hue = hsv.hue.into_positive_degrees();

    [
        (hue / 2.0).round().min(180.0) as u8,
        (hsv.saturation * 255.0).round().clamp(0.0, 255.0) as u8,
        (hsv.value * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Classify a pixel to a palette colour, or `None` for unrecognised hues
pub fn classify_pixel(rgb: [u8; 3]) -> Option<CanonicalColor> {
    let hsv = rgb_to_hsv(rgb);
    COLOR_TABLE
        .iter()
        .find(|(_, ranges)| ranges.iter().any(|range| range.contains(hsv)))
        .map(|(color, _)| *color)
}
