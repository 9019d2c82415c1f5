//! Recognition candidates and results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::resistor::ResistanceValue;
use crate::vision::color::ColorBandSequence;
use crate::vision::ocr_preprocess::OcrStrategy;

/// Which recognition strategy produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePath {
    Color,
    Text,
    Vision,
}

impl SourcePath {
    pub fn name(&self) -> &'static str {
        match self {
            SourcePath::Color => "color",
            SourcePath::Text => "text",
            SourcePath::Vision => "vision",
        }
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SourcePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "color" => Ok(SourcePath::Color),
            "text" => Ok(SourcePath::Text),
            "vision" => Ok(SourcePath::Vision),
            other => Err(format!("unknown source path '{}'", other)),
        }
    }
}

/// One guess at what the photographed component is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionCandidate {
    pub component_type: String,
    pub display_name: String,
    pub specifications: BTreeMap<String, String>,
    pub description: Option<String>,
    pub part_number: Option<String>,
    pub manufacturer: Option<String>,
    pub tags: Vec<String>,
    /// 0-100
    pub confidence: u8,
    pub source: SourcePath,
}

impl RecognitionCandidate {
    pub fn new(
        component_type: impl Into<String>,
        display_name: impl Into<String>,
        confidence: u8,
        source: SourcePath,
    ) -> Self {
        Self {
            component_type: component_type.into(),
            display_name: display_name.into(),
            specifications: BTreeMap::new(),
            description: None,
            part_number: None,
            manufacturer: None,
            tags: Vec::new(),
            confidence: confidence.min(100),
            source,
        }
    }

    /// Candidate for a decoded colour-coded resistor
    pub fn from_resistance(value: &ResistanceValue, confidence: u8) -> Self {
        let mut candidate = Self::new(
            "resistor",
            format!("{} Resistor", value.resistance_label()),
            confidence,
            SourcePath::Color,
        );
        candidate
            .specifications
            .insert("resistance".to_string(), value.resistance_label());
        if let Some(tolerance) = value.tolerance_label() {
            candidate
                .specifications
                .insert("tolerance".to_string(), tolerance);
        }
        candidate.description = Some(format!("Color-coded resistor, {}", value));
        candidate.tags = vec![
            "resistor".to_string(),
            "color-coded".to_string(),
            "through-hole".to_string(),
        ];
        candidate
    }
}

/// Everything gathered while recognising one photo
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    /// Raw OCR text, untrimmed
    pub ocr_text: String,
    /// Preprocessing strategy that produced `ocr_text`
    pub ocr_strategy: Option<OcrStrategy>,
    pub bands: ColorBandSequence,
    pub resistance: Option<ResistanceValue>,
    /// Every candidate considered, including ones that missed the floor
    pub candidates: Vec<RecognitionCandidate>,
}

impl Evidence {
    /// True when no text, bands or candidates were found
    pub fn is_empty(&self) -> bool {
        self.ocr_text.trim().is_empty()
            && self.bands.is_empty()
            && self.resistance.is_none()
            && self.candidates.is_empty()
    }
}

/// Outcome of recognising one photo
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RecognitionResult {
    Accepted {
        candidate: RecognitionCandidate,
        evidence: Evidence,
    },
    Rejected {
        evidence: Evidence,
    },
}

impl RecognitionResult {
    pub fn evidence(&self) -> &Evidence {
        match self {
            RecognitionResult::Accepted { evidence, .. } | RecognitionResult::Rejected { evidence } => {
                evidence
            }
        }
    }

    pub fn candidate(&self) -> Option<&RecognitionCandidate> {
        match self {
            RecognitionResult::Accepted { candidate, .. } => Some(candidate),
            RecognitionResult::Rejected { .. } => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RecognitionResult::Accepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resistor::decode_names;

    #[test]
    fn test_resistor_candidate_shape() {
        let value = decode_names(&["yellow", "violet", "orange", "gold"]).unwrap();
        let candidate = RecognitionCandidate::from_resistance(&value, 70);

        assert_eq!(candidate.component_type, "resistor");
        assert_eq!(candidate.display_name, "47kΩ Resistor");
        assert_eq!(candidate.specifications["resistance"], "47kΩ");
        assert_eq!(candidate.specifications["tolerance"], "±5%");
        assert_eq!(candidate.confidence, 70);
        assert_eq!(candidate.source, SourcePath::Color);
        assert!(candidate.tags.contains(&"color-coded".to_string()));
    }

    #[test]
    fn test_resistor_candidate_without_tolerance() {
        let value = decode_names(&["brown", "black", "green"]).unwrap();
        let candidate = RecognitionCandidate::from_resistance(&value, 70);
        assert!(!candidate.specifications.contains_key("tolerance"));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let candidate = RecognitionCandidate::new("ic", "NE555", 250, SourcePath::Text);
        assert_eq!(candidate.confidence, 100);
    }

    #[test]
    fn test_result_serializes_with_outcome_tag() {
        let result = RecognitionResult::Rejected {
            evidence: Evidence::default(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert!(result.evidence().is_empty());
        assert!(result.candidate().is_none());
    }

    #[test]
    fn test_source_path_parse() {
        assert_eq!("vision".parse::<SourcePath>(), Ok(SourcePath::Vision));
        assert!("ocr".parse::<SourcePath>().is_err());
    }
}
