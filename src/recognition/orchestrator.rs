//! Recognition orchestrator
//!
//! Runs segmentation and OCR side by side, derives local candidates from
//! their output, and spends on the vision fallback only when the local
//! evidence is missing or weak.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::candidate::{Evidence, RecognitionCandidate, RecognitionResult};
use super::error::{CollaboratorError, RecognitionError};
use super::extractor::{LlmExtractor, PatternExtractor, StructuredExtractor};
use super::policy::RecognitionPolicy;
use super::vision::{OpenAiVision, VisionRecognizer};
use crate::config::AppConfig;
use crate::resistor;
use crate::vision::color::ColorBandSequence;
use crate::vision::ocr::{OcrOutput, TesseractOcr, TextRecognizer};
use crate::vision::photo::Photo;
use crate::vision::segmenter::ColorSegmenter;

/// Default upper bound on one vision call
pub const DEFAULT_VISION_TIMEOUT: Duration = Duration::from_secs(30);

/// Combines the colour, text and vision paths into one result per photo.
///
/// Holds only shared, immutable collaborators, so one instance can serve
/// concurrent `recognize` calls.
#[derive(Clone)]
pub struct Orchestrator {
    segmenter: Arc<ColorSegmenter>,
    ocr: Option<Arc<dyn TextRecognizer>>,
    extractor: Option<Arc<dyn StructuredExtractor>>,
    vision: Option<Arc<dyn VisionRecognizer>>,
    policy: RecognitionPolicy,
    vision_timeout: Duration,
}

impl Orchestrator {
    /// Orchestrator with only the colour path; add collaborators with the `with_*` methods
    pub fn new(segmenter: ColorSegmenter) -> Self {
        Self {
            segmenter: Arc::new(segmenter),
            ocr: None,
            extractor: None,
            vision: None,
            policy: RecognitionPolicy::default(),
            vision_timeout: DEFAULT_VISION_TIMEOUT,
        }
    }

    /// Wire up the configured collaborators
    pub fn from_config(config: &AppConfig) -> Self {
        let mut orchestrator = Self::new(ColorSegmenter::with_config(config.segmentation.clone()))
            .with_policy(config.recognition.policy())
            .with_vision_timeout(Duration::from_secs(config.recognition.vision_timeout_secs));

        if config.ocr.enabled {
            orchestrator = orchestrator.with_ocr(Arc::new(TesseractOcr::new(config.ocr.clone())));
        }

        let llm = if config.extractor.enabled {
            LlmExtractor::from_settings(&config.extractor)
        } else {
            None
        };
        let extractor: Arc<dyn StructuredExtractor> = match llm {
            Some(llm) => Arc::new(llm),
            None => Arc::new(PatternExtractor::new()),
        };
        orchestrator = orchestrator.with_extractor(extractor);

        if let Some(vision) = OpenAiVision::from_settings(&config.vision) {
            orchestrator = orchestrator.with_vision(Arc::new(vision));
        }

        orchestrator
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn TextRecognizer>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn StructuredExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionRecognizer>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_policy(mut self, policy: RecognitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_vision_timeout(mut self, timeout: Duration) -> Self {
        self.vision_timeout = timeout;
        self
    }

    /// Recognise the component in one photo.
    ///
    /// Weak or absent evidence is `Ok(Rejected)`. An `Err` means nothing
    /// usable was found while some collaborator could not be reached.
    pub async fn recognize(&self, photo: &Photo) -> Result<RecognitionResult, RecognitionError> {
        let start = Instant::now();
        let mut evidence = Evidence::default();
        let mut outage: Option<CollaboratorError> = None;

        let (bands, ocr) = tokio::join!(self.segment(photo), self.read_text(photo));
        evidence.bands = bands;
        match ocr {
            Ok(output) => {
                evidence.ocr_text = output.text;
                evidence.ocr_strategy = output.strategy;
            }
            Err(e) => record_failure(&mut outage, e),
        }

        let text_candidate = if self.policy.text_is_substantial(&evidence.ocr_text) {
            self.extract(&evidence.ocr_text, photo, &mut outage).await
        } else {
            None
        };

        let color_candidate = if self
            .policy
            .should_decode_colors(evidence.bands.len(), &evidence.ocr_text)
        {
            match resistor::decode(&evidence.bands) {
                Ok(value) => {
                    info!("Decoded colour bands as {}", value);
                    evidence.resistance = Some(value);
                    Some(RecognitionCandidate::from_resistance(
                        &value,
                        self.policy.color_confidence,
                    ))
                }
                Err(failure) => {
                    debug!("Bands {:?} not decodable: {}", evidence.bands, failure);
                    None
                }
            }
        } else {
            None
        };

        evidence
            .candidates
            .extend(text_candidate.iter().chain(color_candidate.iter()).cloned());

        let local = self.policy.select_local(text_candidate, color_candidate);

        let vision_candidate = if self.policy.needs_fallback(local.as_ref()) {
            self.ask_vision(photo, &mut outage).await
        } else {
            debug!("Local candidate is good enough, skipping vision fallback");
            None
        };
        evidence.candidates.extend(vision_candidate.iter().cloned());

        let chosen = self.policy.choose(local, vision_candidate);
        let result = self.policy.finalize(chosen, evidence);

        match &result {
            RecognitionResult::Accepted { candidate, .. } => info!(
                "Accepted {} '{}' from {} path at {}% in {:?}",
                candidate.component_type,
                candidate.display_name,
                candidate.source,
                candidate.confidence,
                start.elapsed()
            ),
            RecognitionResult::Rejected { .. } => {
                info!("No candidate cleared the acceptance floor ({:?})", start.elapsed())
            }
        }

        match (result, outage) {
            (RecognitionResult::Rejected { evidence }, Some(source)) => {
                Err(RecognitionError::CollaboratorUnavailable {
                    source,
                    evidence: Box::new(evidence),
                })
            }
            (result, Some(source)) => {
                warn!("Recognised despite an unavailable collaborator: {}", source);
                Ok(result)
            }
            (result, None) => Ok(result),
        }
    }

    /// Colour segmentation on a blocking worker
    async fn segment(&self, photo: &Photo) -> ColorBandSequence {
        let Some(pixels) = photo.shared_pixels() else {
            debug!("Photo has no decodable pixels, skipping segmentation");
            return Vec::new();
        };

        let segmenter = self.segmenter.clone();
        match tokio::task::spawn_blocking(move || segmenter.segment(&pixels)).await {
            Ok(bands) => bands,
            Err(e) => {
                warn!("Segmentation task failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn read_text(&self, photo: &Photo) -> Result<OcrOutput, CollaboratorError> {
        match &self.ocr {
            Some(ocr) => ocr.recognize_text(photo).await,
            None => Ok(OcrOutput::default()),
        }
    }

    async fn extract(
        &self,
        text: &str,
        photo: &Photo,
        outage: &mut Option<CollaboratorError>,
    ) -> Option<RecognitionCandidate> {
        let extractor = self.extractor.as_ref()?;
        match extractor.extract(text.trim(), Some(photo)).await {
            Ok(candidate) => candidate,
            Err(e) => {
                record_failure(outage, e);
                None
            }
        }
    }

    /// At most one vision call, bounded by the timeout and never retried
    async fn ask_vision(
        &self,
        photo: &Photo,
        outage: &mut Option<CollaboratorError>,
    ) -> Option<RecognitionCandidate> {
        let Some(vision) = self.vision.as_ref() else {
            debug!("No vision fallback configured");
            return None;
        };

        info!("Invoking vision fallback ({})", vision.name());
        match tokio::time::timeout(self.vision_timeout, vision.recognize(photo)).await {
            Ok(Ok(candidate)) => candidate,
            Ok(Err(e)) => {
                record_failure(outage, e);
                None
            }
            Err(_) => {
                warn!(
                    "Vision fallback timed out after {:?}, using local evidence",
                    self.vision_timeout
                );
                None
            }
        }
    }
}

/// Keep the first unavailability; other failures only narrow the candidates
fn record_failure(outage: &mut Option<CollaboratorError>, error: CollaboratorError) {
    warn!("{}", error);
    if error.is_unavailable() && outage.is_none() {
        *outage = Some(error);
    }
}
