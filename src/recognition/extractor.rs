//! Structured extraction: OCR text to a component candidate

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::candidate::{RecognitionCandidate, SourcePath};
use super::error::CollaboratorError;
use super::llm::{parse_component_reply, ChatClient, ChatMessage};
use crate::config::ExtractorSettings;
use crate::vision::photo::Photo;

/// Turns recognised text into a component candidate
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the text did not describe any recognisable component
    async fn extract(
        &self,
        text: &str,
        photo: Option<&Photo>,
    ) -> Result<Option<RecognitionCandidate>, CollaboratorError>;
}

/// Confidence given to pattern-matched results
pub const PATTERN_CONFIDENCE: u8 = 30;

/// Type detection patterns, most specific first
static TYPE_PATTERNS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    let table: &[(&str, &[&str])] = &[
        (
            "arduino",
            &[
                r"\barduino\b",
                r"\buno\b.*\br3\b",
                r"\bmega\s*2560\b",
                r"\bmega\b.*\badk\b",
                r"\bmega\b",
                r"\bnano\b",
                r"\bmicro\b",
                r"\bleonardo\b",
                r"\bdue\b",
                r"\batmega\d+.*\b(arduino|board)\b",
                r"\b(made|designed)\s+in\s+italy\b",
            ],
        ),
        (
            "microcontroller",
            &[
                r"\batmega\d+[a-z]*\b",
                r"\bstm32",
                r"\besp32\b",
                r"\besp8266\b",
                r"\bpic\d+",
                r"\bmcu\b",
                r"\barm\s*cortex\b",
                r"\bsamd\d+\b",
                r"\brp2040\b",
            ],
        ),
        ("resistor", &[r"\b\d+[km]?[Ωω]", r"\bresist", r"\bohm"]),
        ("capacitor", &[r"\b\d+[uμnp]?f\b", r"\bcap\b", r"\bfarad"]),
        ("ic", &[r"\b[0-9]{3,4}[a-z]?\b", r"\bintegrated\s*circuit\b", r"\bchip\b"]),
        ("led", &[r"\bled\b", r"\blight\s*emitting"]),
        (
            "connector",
            &[r"\bconnector\b", r"\bheader\b", r"\bjst\b", r"\busb\b", r"\bpin\s*header\b"],
        ),
        ("transistor", &[r"\btransistor\b", r"\bmosfet\b", r"\bbjt\b", r"\b2n\d+\b"]),
        ("diode", &[r"\bdiode\b", r"\b1n\d+\b", r"\brectifier\b"]),
        ("sensor", &[r"\bsensor\b", r"\bdht\d+\b", r"\bbmp\d+\b", r"\bmpu\d+\b"]),
    ];

    table
        .iter()
        .map(|(kind, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
                .collect();
            (*kind, compiled)
        })
        .collect()
});

/// Part number shapes, tried in order against the original casing
static PART_NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[A-Z]{2,}\d{3,}[A-Z\d-]*",
        r"\b\d{3,4}[A-Z]?\b",
        r"[A-Z]\d{2,}[A-Z\d]*",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

macro_rules! spec_regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Option<Regex>> = Lazy::new(|| Regex::new($pattern).ok());
    };
}

spec_regex!(RESISTANCE_RE, r"(\d+\.?\d*)\s*([kKmM]?)[Ωω]");
spec_regex!(TOLERANCE_RE, r"(±?\d+(?:\.\d+)?)%");
spec_regex!(POWER_RE, r"(\d+\.?\d*)\s*[Ww]\b");
spec_regex!(CAPACITANCE_RE, r"(\d+\.?\d*)\s*([uμnp]?)[Ff]\b");
spec_regex!(VOLTAGE_RE, r"(\d+(?:\.\d+)?)\s*[Vv]\b");
spec_regex!(FREQUENCY_RE, r"(\d+)\s*[Mm][Hh][Zz]");
spec_regex!(PINS_RE, r"(?i)(\d+)\s*-?\s*pins?\b");
spec_regex!(PITCH_RE, r"(?i)(\d+\.?\d*)\s*mm\b");

fn first_capture<'t>(re: &Lazy<Option<Regex>>, text: &'t str) -> Option<regex::Captures<'t>> {
    Lazy::force(re).as_ref().and_then(|re| re.captures(text))
}

/// Detect a component type from keywords, or `None`
pub fn detect_type(text: &str) -> Option<&'static str> {
    TYPE_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
        .map(|(kind, _)| *kind)
}

/// First plausible part number in the text
pub fn extract_part_number(text: &str) -> Option<String> {
    PART_NUMBER_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

/// Pull type-specific specifications out of free text
pub fn extract_specs(text: &str, component_type: &str) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();

    match component_type {
        "resistor" => {
            if let Some(caps) = first_capture(&RESISTANCE_RE, text) {
                let unit = caps.get(2).map_or("", |m| m.as_str()).to_lowercase();
                let unit = if unit == "m" { "M".to_string() } else { unit };
                specs.insert("resistance".to_string(), format!("{}{}Ω", &caps[1], unit));
            }
            if let Some(caps) = first_capture(&TOLERANCE_RE, text) {
                let value = caps[1].trim_start_matches('±');
                specs.insert("tolerance".to_string(), format!("±{}%", value));
            }
            if let Some(caps) = first_capture(&POWER_RE, text) {
                specs.insert("power_rating".to_string(), format!("{}W", &caps[1]));
            }
        }
        "capacitor" => {
            if let Some(caps) = first_capture(&CAPACITANCE_RE, text) {
                let unit = caps.get(2).map_or("", |m| m.as_str()).replace('μ', "u");
                specs.insert("capacitance".to_string(), format!("{}{}F", &caps[1], unit));
            }
            if let Some(caps) = first_capture(&VOLTAGE_RE, text) {
                specs.insert("voltage_rating".to_string(), format!("{}V", &caps[1]));
            }
        }
        "arduino" | "microcontroller" => {
            if let Some(caps) = first_capture(&VOLTAGE_RE, text) {
                specs.insert("voltage".to_string(), format!("{}V", &caps[1]));
            }
            if let Some(caps) = first_capture(&FREQUENCY_RE, text) {
                specs.insert("frequency".to_string(), format!("{}MHz", &caps[1]));
            }
        }
        "connector" => {
            if let Some(caps) = first_capture(&PINS_RE, text) {
                specs.insert("pins".to_string(), caps[1].to_string());
            }
            if let Some(caps) = first_capture(&PITCH_RE, text) {
                specs.insert("pitch".to_string(), format!("{}mm", &caps[1]));
            }
        }
        _ => {}
    }

    specs
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Offline extractor based on keyword and shape patterns
#[derive(Debug, Default, Clone)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of `extract`
    pub fn extract_text(&self, text: &str) -> Option<RecognitionCandidate> {
        let Some(kind) = detect_type(text) else {
            debug!("Pattern extraction found no component type");
            return None;
        };
        let part_number = extract_part_number(text);

        let name = format!(
            "{} - {}",
            capitalize(kind),
            part_number.as_deref().unwrap_or("Unknown")
        );
        let mut candidate = RecognitionCandidate::new(kind, name, PATTERN_CONFIDENCE, SourcePath::Text);
        candidate.part_number = part_number;
        candidate.specifications = extract_specs(text, kind);
        candidate.tags = vec![kind.to_string()];

        info!("Pattern extraction matched type '{}'", kind);
        Some(candidate)
    }
}

#[async_trait]
impl StructuredExtractor for PatternExtractor {
    fn name(&self) -> &str {
        "patterns"
    }

    async fn extract(
        &self,
        text: &str,
        _photo: Option<&Photo>,
    ) -> Result<Option<RecognitionCandidate>, CollaboratorError> {
        Ok(self.extract_text(text))
    }
}

const SYSTEM_PROMPT: &str =
    "You are an expert in electronic components and always return valid JSON.";

fn extraction_prompt(text: &str) -> String {
    format!(
        r#"You are an expert in electronic components. Analyze the following text that was extracted from a component image using OCR.

Context:
- The text may be incomplete, garbled, or minimal due to OCR limitations
- Look for any recognizable patterns: part numbers, values, manufacturer codes, component type keywords
- Common boards: Arduino (Uno, Mega, Nano), ESP32, ESP8266, Raspberry Pi

OCR text:
{text}

Return a JSON object with these fields:
- component_type: arduino, microcontroller, resistor, capacitor, connector, ic, led, sensor, transistor, diode, module, etc.
- name: a descriptive name for the component
- part_number: manufacturer part number if present
- manufacturer: manufacturer name if present
- specifications: object with technical specs, for example
  resistors {{"resistance": "10k", "tolerance": "5%", "power_rating": "0.25W"}},
  capacitors {{"capacitance": "100uF", "voltage_rating": "25V", "type": "electrolytic"}},
  ICs and MCUs {{"model": "ATmega328P", "voltage": "5V", "frequency": "16MHz"}}
- description: brief description
- tags: array of relevant tags
- recognition_confidence: your confidence in this identification (0-100)

Rules:
- If the text is minimal or garbled (fewer than 10 meaningful characters), set confidence to 15 or lower
- If a field cannot be determined, use null
- Be conservative: unclear text means confidence 10-30
- If no meaningful component information can be extracted, set component_type to "unknown" and confidence to 5

Return only valid JSON, no additional text."#
    )
}

/// Extractor backed by an OpenAI-compatible chat model, with pattern
/// matching as the offline fallback
pub struct LlmExtractor {
    client: ChatClient,
    fallback: PatternExtractor,
}

impl LlmExtractor {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            fallback: PatternExtractor::new(),
        }
    }

    /// Build from settings; `None` when no API key is configured
    pub fn from_settings(settings: &ExtractorSettings) -> Option<Self> {
        let Some(api_key) = settings.api_key() else {
            warn!(
                "{} not set, text extraction will use pattern matching only",
                settings.api_key_env
            );
            return None;
        };
        let client = ChatClient::new("text-extractor", &settings.base_url, api_key, &settings.model)
            .with_sampling(settings.temperature, settings.max_tokens)
            .with_timeout(Duration::from_secs(settings.timeout_secs));
        Some(Self::new(client))
    }

    async fn extract_with_model(&self, text: &str) -> Result<RecognitionCandidate, CollaboratorError> {
        let reply = self
            .client
            .complete(vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(extraction_prompt(text)),
            ])
            .await?;
        parse_component_reply(self.client.name(), &reply, SourcePath::Text)
    }
}

#[async_trait]
impl StructuredExtractor for LlmExtractor {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn extract(
        &self,
        text: &str,
        _photo: Option<&Photo>,
    ) -> Result<Option<RecognitionCandidate>, CollaboratorError> {
        match self.extract_with_model(text).await {
            Ok(candidate) => {
                info!(
                    "Model extracted '{}' ({}) at {}%",
                    candidate.display_name, candidate.component_type, candidate.confidence
                );
                Ok(Some(candidate))
            }
            Err(e) => {
                warn!("Model extraction failed, trying patterns: {}", e);
                match self.fallback.extract_text(text) {
                    Some(candidate) => Ok(Some(candidate)),
                    None => Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_type_order() {
        assert_eq!(detect_type("ARDUINO MEGA 2560"), Some("arduino"));
        assert_eq!(detect_type("ATMEGA328P-PU"), Some("microcontroller"));
        assert_eq!(detect_type("ESP32-WROOM"), Some("microcontroller"));
        assert_eq!(detect_type("10kΩ 1%"), Some("resistor"));
        assert_eq!(detect_type("100uF 25V"), Some("capacitor"));
        assert_eq!(detect_type("555 TIMER"), Some("ic"));
        assert_eq!(detect_type("2N2222A transistor"), Some("transistor"));
        assert_eq!(detect_type("diode 1N4007"), Some("diode"));
        assert_eq!(detect_type("DHT22 sensor"), Some("sensor"));
        assert_eq!(detect_type("hello there"), None);
    }

    #[test]
    fn test_part_number() {
        assert_eq!(extract_part_number("ATMEGA2560 board"), Some("ATMEGA2560".to_string()));
        assert_eq!(extract_part_number("LM 7805"), Some("7805".to_string()));
        assert_eq!(extract_part_number("no digits"), None);
    }

    #[test]
    fn test_resistor_specs() {
        let specs = extract_specs("4.7kΩ ±1% 0.25W", "resistor");
        assert_eq!(specs.get("resistance").map(String::as_str), Some("4.7kΩ"));
        assert_eq!(specs.get("tolerance").map(String::as_str), Some("±1%"));
        assert_eq!(specs.get("power_rating").map(String::as_str), Some("0.25W"));
    }

    #[test]
    fn test_capacitor_and_connector_specs() {
        let specs = extract_specs("470μF 16V", "capacitor");
        assert_eq!(specs.get("capacitance").map(String::as_str), Some("470uF"));
        assert_eq!(specs.get("voltage_rating").map(String::as_str), Some("16V"));

        let specs = extract_specs("JST 4 pin 2.54mm", "connector");
        assert_eq!(specs.get("pins").map(String::as_str), Some("4"));
        assert_eq!(specs.get("pitch").map(String::as_str), Some("2.54mm"));
    }

    #[test]
    fn test_pattern_extractor_candidate() {
        let candidate = PatternExtractor::new()
            .extract_text("ATMEGA328P 16MHz 5V")
            .unwrap();
        assert_eq!(candidate.component_type, "microcontroller");
        assert_eq!(candidate.display_name, "Microcontroller - ATMEGA328P");
        assert_eq!(candidate.confidence, PATTERN_CONFIDENCE);
        assert_eq!(candidate.source, SourcePath::Text);
        assert_eq!(candidate.specifications.get("frequency").map(String::as_str), Some("16MHz"));
        assert_eq!(candidate.specifications.get("voltage").map(String::as_str), Some("5V"));
    }

    #[tokio::test]
    async fn test_pattern_extractor_unknown_text() {
        let result = PatternExtractor::new().extract("xq zz!", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_llm_extractor_falls_back_to_patterns() {
        // Nothing listens on this port, so the request fails to connect
        let client = ChatClient::new("test-model", "http://127.0.0.1:9", "key", "model")
            .with_timeout(Duration::from_secs(2));
        let extractor = LlmExtractor::new(client);

        let result = extractor.extract("LED 5mm red", None).await.unwrap();
        assert_eq!(result.map(|c| c.component_type), Some("led".to_string()));

        let err = extractor.extract("xq zz!", None).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
