//! Routing and acceptance policy
//!
//! Each stage of the orchestrator is a small function here, so the floor,
//! fallback and tie-break rules can be tested without any collaborators.

use super::candidate::{Evidence, RecognitionCandidate, RecognitionResult};

/// Component types that carry no information
const UNKNOWN_TYPES: &[&str] = &["", "unknown", "none", "null", "n/a"];

/// Confidence thresholds and text/band minimums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionPolicy {
    pub acceptance_floor: u8,
    pub skip_fallback_threshold: u8,
    pub color_confidence: u8,
    pub min_text_chars: usize,
    pub min_color_bands: usize,
}

impl Default for RecognitionPolicy {
    fn default() -> Self {
        Self {
            acceptance_floor: Self::ACCEPTANCE_FLOOR,
            skip_fallback_threshold: Self::SKIP_FALLBACK_THRESHOLD,
            color_confidence: Self::COLOR_CONFIDENCE,
            min_text_chars: Self::MIN_TEXT_CHARS,
            min_color_bands: Self::MIN_COLOR_BANDS,
        }
    }
}

impl RecognitionPolicy {
    /// Minimum confidence for any accepted result
    pub const ACCEPTANCE_FLOOR: u8 = 20;
    /// Local results at or above this skip the paid vision call
    pub const SKIP_FALLBACK_THRESHOLD: u8 = 25;
    /// Fixed confidence of a decoded colour-band resistor
    pub const COLOR_CONFIDENCE: u8 = 70;
    /// Shorter trimmed OCR text is not handed to the extractor
    pub const MIN_TEXT_CHARS: usize = 5;
    /// Fewer bands are never decoded
    pub const MIN_COLOR_BANDS: usize = 3;

    /// Whether OCR text is long enough to trust the extractor with
    pub fn text_is_substantial(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_text_chars
    }

    /// Whether colour decoding should run for this band count and OCR text
    pub fn should_decode_colors(&self, band_count: usize, text: &str) -> bool {
        band_count >= self.min_color_bands && !self.text_is_substantial(text)
    }

    pub fn has_known_type(candidate: &RecognitionCandidate) -> bool {
        let kind = candidate.component_type.trim().to_ascii_lowercase();
        !UNKNOWN_TYPES.contains(&kind.as_str())
    }

    /// Confidence at or above the floor and a known component type
    pub fn passes_floor(&self, candidate: &RecognitionCandidate) -> bool {
        candidate.confidence >= self.acceptance_floor && Self::has_known_type(candidate)
    }

    /// Text evidence wins over colour evidence whenever both exist
    pub fn select_local(
        &self,
        text: Option<RecognitionCandidate>,
        color: Option<RecognitionCandidate>,
    ) -> Option<RecognitionCandidate> {
        text.or(color)
    }

    /// Whether the paid vision fallback should run for this local candidate
    pub fn needs_fallback(&self, local: Option<&RecognitionCandidate>) -> bool {
        match local {
            None => true,
            Some(candidate) => {
                !self.passes_floor(candidate)
                    || candidate.confidence < self.skip_fallback_threshold
            }
        }
    }

    /// Pick between the local and vision candidates. Higher confidence wins,
    /// ties go to the local one. Candidates without a known type only win
    /// when nothing else is left.
    pub fn choose(
        &self,
        local: Option<RecognitionCandidate>,
        vision: Option<RecognitionCandidate>,
    ) -> Option<RecognitionCandidate> {
        let known = |c: &RecognitionCandidate| Self::has_known_type(c);
        match (local, vision) {
            (Some(l), Some(v)) => match (known(&l), known(&v)) {
                (true, true) if v.confidence > l.confidence => Some(v),
                (true, _) => Some(l),
                (false, true) => Some(v),
                (false, false) => Some(l),
            },
            (local, vision) => local.or(vision),
        }
    }

    /// Terminal state: Accepted when the chosen candidate clears the floor
    pub fn finalize(
        &self,
        chosen: Option<RecognitionCandidate>,
        evidence: Evidence,
    ) -> RecognitionResult {
        match chosen {
            Some(candidate) if self.passes_floor(&candidate) => {
                RecognitionResult::Accepted { candidate, evidence }
            }
            _ => RecognitionResult::Rejected { evidence },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::candidate::SourcePath;

    fn candidate(kind: &str, confidence: u8, source: SourcePath) -> RecognitionCandidate {
        RecognitionCandidate::new(kind, format!("{} part", kind), confidence, source)
    }

    #[test]
    fn test_text_threshold_uses_trimmed_length() {
        let policy = RecognitionPolicy::default();
        assert!(!policy.text_is_substantial("  ab1  "));
        assert!(!policy.text_is_substantial("\n\t"));
        assert!(policy.text_is_substantial(" NE555 "));
    }

    #[test]
    fn test_color_decoding_gate() {
        let policy = RecognitionPolicy::default();
        assert!(policy.should_decode_colors(4, ""));
        assert!(policy.should_decode_colors(3, "x1"));
        assert!(!policy.should_decode_colors(2, ""));
        assert!(!policy.should_decode_colors(4, "LM7805CT"));
    }

    #[test]
    fn test_floor_requires_known_type() {
        let policy = RecognitionPolicy::default();
        assert!(policy.passes_floor(&candidate("ic", 20, SourcePath::Text)));
        assert!(!policy.passes_floor(&candidate("ic", 19, SourcePath::Text)));
        assert!(!policy.passes_floor(&candidate("unknown", 90, SourcePath::Text)));
        assert!(!policy.passes_floor(&candidate("None", 90, SourcePath::Text)));
        assert!(!policy.passes_floor(&candidate("  ", 90, SourcePath::Text)));
    }

    #[test]
    fn test_text_preferred_over_color() {
        let policy = RecognitionPolicy::default();
        let chosen = policy.select_local(
            Some(candidate("ic", 30, SourcePath::Text)),
            Some(candidate("resistor", 70, SourcePath::Color)),
        );
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Text));

        let chosen = policy.select_local(None, Some(candidate("resistor", 70, SourcePath::Color)));
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Color));
        assert!(policy.select_local(None, None).is_none());
    }

    #[test]
    fn test_fallback_decision() {
        let policy = RecognitionPolicy::default();
        assert!(policy.needs_fallback(None));
        assert!(policy.needs_fallback(Some(&candidate("ic", 10, SourcePath::Text))));
        // Clears the floor, but only weakly
        assert!(policy.needs_fallback(Some(&candidate("ic", 22, SourcePath::Text))));
        assert!(policy.needs_fallback(Some(&candidate("unknown", 80, SourcePath::Text))));
        assert!(!policy.needs_fallback(Some(&candidate("ic", 25, SourcePath::Text))));
        assert!(!policy.needs_fallback(Some(&candidate("resistor", 70, SourcePath::Color))));
    }

    #[test]
    fn test_choose_higher_confidence_ties_to_local() {
        let policy = RecognitionPolicy::default();

        let chosen = policy.choose(
            Some(candidate("ic", 22, SourcePath::Text)),
            Some(candidate("ic", 60, SourcePath::Vision)),
        );
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Vision));

        let chosen = policy.choose(
            Some(candidate("ic", 40, SourcePath::Text)),
            Some(candidate("ic", 40, SourcePath::Vision)),
        );
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Text));

        let chosen = policy.choose(
            Some(candidate("ic", 40, SourcePath::Text)),
            Some(candidate("ic", 30, SourcePath::Vision)),
        );
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Text));
    }

    #[test]
    fn test_unknown_local_loses_to_vision() {
        let policy = RecognitionPolicy::default();
        let chosen = policy.choose(
            Some(candidate("unknown", 90, SourcePath::Text)),
            Some(candidate("sensor", 35, SourcePath::Vision)),
        );
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Vision));

        let chosen = policy.choose(
            Some(candidate("ic", 15, SourcePath::Text)),
            Some(candidate("unknown", 95, SourcePath::Vision)),
        );
        assert_eq!(chosen.map(|c| c.source), Some(SourcePath::Text));
    }

    #[test]
    fn test_finalize() {
        let policy = RecognitionPolicy::default();
        let accepted = policy.finalize(
            Some(candidate("led", 45, SourcePath::Vision)),
            Evidence::default(),
        );
        assert!(accepted.is_accepted());

        let rejected = policy.finalize(
            Some(candidate("led", 19, SourcePath::Vision)),
            Evidence::default(),
        );
        assert!(!rejected.is_accepted());
        assert!(!policy.finalize(None, Evidence::default()).is_accepted());
    }
}
