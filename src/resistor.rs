//! Resistor colour code decoding (standard 4-band)

use serde::Serialize;
use std::fmt;

use crate::vision::color::{CanonicalColor, UnknownColor};

/// Significant digit per colour
const DIGITS: &[(CanonicalColor, u32)] = &[
    (CanonicalColor::Black, 0),
    (CanonicalColor::Brown, 1),
    (CanonicalColor::Red, 2),
    (CanonicalColor::Orange, 3),
    (CanonicalColor::Yellow, 4),
    (CanonicalColor::Green, 5),
    (CanonicalColor::Blue, 6),
    (CanonicalColor::Violet, 7),
    (CanonicalColor::Gray, 8),
    (CanonicalColor::White, 9),
];

/// Power-of-ten exponent per multiplier colour
const MULTIPLIERS: &[(CanonicalColor, i32)] = &[
    (CanonicalColor::Black, 0),
    (CanonicalColor::Brown, 1),
    (CanonicalColor::Red, 2),
    (CanonicalColor::Orange, 3),
    (CanonicalColor::Yellow, 4),
    (CanonicalColor::Green, 5),
    (CanonicalColor::Blue, 6),
    (CanonicalColor::Violet, 7),
    (CanonicalColor::Gold, -1),
    (CanonicalColor::Silver, -2),
];

/// Tolerance percentage per tolerance colour
const TOLERANCES: &[(CanonicalColor, f64)] = &[
    (CanonicalColor::Brown, 1.0),
    (CanonicalColor::Red, 2.0),
    (CanonicalColor::Gold, 5.0),
    (CanonicalColor::Silver, 10.0),
];

fn lookup<T: Copy>(table: &[(CanonicalColor, T)], color: CanonicalColor) -> Option<T> {
    table.iter().find(|(c, _)| *c == color).map(|(_, v)| *v)
}

/// Why a band sequence could not be decoded
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("need at least 3 bands, found {found}")]
    TooFewBands { found: usize },

    #[error("only 4-band resistors are supported, found {found} bands")]
    TooManyBands { found: usize },

    #[error("band {position} ({color}) is not a digit colour")]
    NotADigit {
        position: usize,
        color: CanonicalColor,
    },

    #[error("leading black band is not a significant digit")]
    LeadingZero,

    #[error("band 3 ({color}) is not a multiplier colour")]
    NotAMultiplier { color: CanonicalColor },

    #[error(transparent)]
    UnknownColor(#[from] UnknownColor),
}

/// SI scale of a resistance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OhmUnit {
    Ohm,
    KiloOhm,
    MegaOhm,
}

impl OhmUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            OhmUnit::Ohm => "Ω",
            OhmUnit::KiloOhm => "kΩ",
            OhmUnit::MegaOhm => "MΩ",
        }
    }

    fn scale(&self) -> f64 {
        match self {
            OhmUnit::Ohm => 1.0,
            OhmUnit::KiloOhm => 1e3,
            OhmUnit::MegaOhm => 1e6,
        }
    }
}

/// A decoded resistance. `tolerance` is `None` when no tolerance band was
/// read; it is never filled with a guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResistanceValue {
    pub ohms: f64,
    pub tolerance: Option<f64>,
}

impl ResistanceValue {
    pub fn unit(&self) -> OhmUnit {
        if self.ohms >= 1e6 {
            OhmUnit::MegaOhm
        } else if self.ohms >= 1e3 {
            OhmUnit::KiloOhm
        } else {
            OhmUnit::Ohm
        }
    }

    /// Value expressed in `unit()`
    pub fn magnitude(&self) -> f64 {
        self.ohms / self.unit().scale()
    }

    /// Magnitude with unit, without tolerance, e.g. `4.7kΩ`
    pub fn resistance_label(&self) -> String {
        format!("{}{}", format_decimal(self.magnitude()), self.unit().symbol())
    }

    /// Tolerance label such as `±5%`
    pub fn tolerance_label(&self) -> Option<String> {
        self.tolerance.map(|t| format!("±{}%", format_decimal(t)))
    }
}

impl fmt::Display for ResistanceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resistance_label())?;
        if let Some(tolerance) = self.tolerance_label() {
            write!(f, " {}", tolerance)?;
        }
        Ok(())
    }
}

/// One decimal place, decimal suppressed when zero
fn format_decimal(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

/// Decode an ordered 3- or 4-band sequence
pub fn decode(bands: &[CanonicalColor]) -> Result<ResistanceValue, DecodeFailure> {
    if bands.len() < 3 {
        return Err(DecodeFailure::TooFewBands { found: bands.len() });
    }
    if bands.len() > 4 {
        return Err(DecodeFailure::TooManyBands { found: bands.len() });
    }

    let digit = |position: usize| {
        lookup(DIGITS, bands[position]).ok_or(DecodeFailure::NotADigit {
            position: position + 1,
            color: bands[position],
        })
    };
    let first = digit(0)?;
    let second = digit(1)?;
    if first == 0 {
        return Err(DecodeFailure::LeadingZero);
    }

    let exponent = lookup(MULTIPLIERS, bands[2])
        .ok_or(DecodeFailure::NotAMultiplier { color: bands[2] })?;

    let significand = (first * 10 + second) as f64;
    let ohms = significand * 10f64.powi(exponent);
    let tolerance = bands.get(3).and_then(|&band| lookup(TOLERANCES, band));

    Ok(ResistanceValue { ohms, tolerance })
}

/// Decode from colour names, rejecting anything outside the palette
pub fn decode_names<S: AsRef<str>>(names: &[S]) -> Result<ResistanceValue, DecodeFailure> {
    let bands = names
        .iter()
        .map(|name| name.as_ref().parse::<CanonicalColor>())
        .collect::<Result<Vec<_>, _>>()?;
    decode(&bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::color::CanonicalColor::{
        Black, Brown, Gold, Green, Red, Silver, Violet, White, Yellow,
    };

    #[test]
    fn test_short_sequences_fail() {
        assert_eq!(decode(&[]), Err(DecodeFailure::TooFewBands { found: 0 }));
        assert_eq!(decode(&[Brown]), Err(DecodeFailure::TooFewBands { found: 1 }));
        assert_eq!(
            decode(&[Brown, Black]),
            Err(DecodeFailure::TooFewBands { found: 2 })
        );
    }

    #[test]
    fn test_one_kilohm() {
        let value = decode_names(&["brown", "black", "red", "gold"]).unwrap();
        assert_eq!(value.ohms, 1000.0);
        assert_eq!(value.tolerance, Some(5.0));
        assert_eq!(value.unit(), OhmUnit::KiloOhm);
        assert_eq!(value.magnitude(), 1.0);
        assert_eq!(value.to_string(), "1kΩ ±5%");
    }

    #[test]
    fn test_330_ohm() {
        let value = decode_names(&["orange", "orange", "brown", "gold"]).unwrap();
        assert_eq!(value.ohms, 330.0);
        assert_eq!(value.unit(), OhmUnit::Ohm);
        assert_eq!(value.to_string(), "330Ω ±5%");
    }

    #[test]
    fn test_ten_ohm_stays_unscaled() {
        let value = decode_names(&["brown", "black", "black", "gold"]).unwrap();
        assert_eq!(value.ohms, 10.0);
        assert_eq!(value.to_string(), "10Ω ±5%");
    }

    #[test]
    fn test_megohm_without_tolerance_band() {
        let value = decode_names(&["brown", "black", "green"]).unwrap();
        assert_eq!(value.ohms, 1_000_000.0);
        assert_eq!(value.unit(), OhmUnit::MegaOhm);
        assert_eq!(value.tolerance, None);
        assert_eq!(value.to_string(), "1MΩ");
    }

    #[test]
    fn test_fractional_values() {
        let value = decode(&[Yellow, Violet, Red, Brown]).unwrap();
        assert_eq!(value.to_string(), "4.7kΩ ±1%");

        let value = decode(&[Brown, Black, Gold]).unwrap();
        assert!((value.ohms - 1.0).abs() < 1e-9);

        let value = decode(&[Red, Red, Silver]).unwrap();
        assert_eq!(value.resistance_label(), "0.2Ω");
    }

    #[test]
    fn test_unknown_colour_name_fails() {
        assert!(matches!(
            decode_names(&["pink", "black", "red"]),
            Err(DecodeFailure::UnknownColor(_))
        ));
    }

    #[test]
    fn test_non_digit_bands_fail() {
        assert_eq!(
            decode(&[Gold, Black, Red]),
            Err(DecodeFailure::NotADigit {
                position: 1,
                color: Gold
            })
        );
        assert_eq!(
            decode(&[Brown, CanonicalColor::None, Red]),
            Err(DecodeFailure::NotADigit {
                position: 2,
                color: CanonicalColor::None
            })
        );
    }

    #[test]
    fn test_leading_black_fails_but_black_multiplier_is_fine() {
        assert_eq!(decode(&[Black, Brown, Red]), Err(DecodeFailure::LeadingZero));
        assert!(decode(&[Brown, Black, Black]).is_ok());
    }

    #[test]
    fn test_bad_multiplier_fails() {
        assert_eq!(
            decode(&[Brown, Black, White]),
            Err(DecodeFailure::NotAMultiplier { color: White })
        );
    }

    #[test]
    fn test_unrecognised_tolerance_is_unknown() {
        let value = decode(&[Brown, Black, Red, Green]).unwrap();
        assert_eq!(value.tolerance, None);
        let value = decode(&[Brown, Black, Red, CanonicalColor::None]).unwrap();
        assert_eq!(value.tolerance, None);
    }

    #[test]
    fn test_five_bands_fail() {
        assert_eq!(
            decode(&[Brown, Black, Black, Brown, Brown]),
            Err(DecodeFailure::TooManyBands { found: 5 })
        );
    }
}
