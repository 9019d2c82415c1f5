//! Vision fallback: photo straight to a component candidate

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info, warn};

use super::candidate::{RecognitionCandidate, SourcePath};
use super::error::CollaboratorError;
use super::llm::{parse_component_reply, ChatClient, ChatMessage};
use crate::config::VisionSettings;
use crate::vision::photo::Photo;

/// Recognises a component from the photo alone. Each call costs money.
#[async_trait]
pub trait VisionRecognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, photo: &Photo) -> Result<Option<RecognitionCandidate>, CollaboratorError>;
}

const VISION_PROMPT: &str = r#"You are an expert in electronic components. Analyze this image and identify the component.

Return a JSON object with:
- component_type: arduino, resistor, capacitor, ic, led, sensor, transistor, diode, module, etc.
- name: descriptive name
- part_number: part number if visible
- manufacturer: manufacturer if visible
- specifications: technical specs as an object
- description: what you see in the image
- visual_features: what makes this component identifiable (color bands, shape, markings)
- recognition_confidence: your confidence (0-100)

For resistors, identify the color bands and calculate the resistance.
For Arduino and other boards, identify the model and microcontroller.
For ICs, read the part number from the chip.

Return only valid JSON."#;

/// Vision recognizer backed by an OpenAI-compatible multimodal chat model
pub struct OpenAiVision {
    client: ChatClient,
}

impl OpenAiVision {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Build from settings; `None` when disabled or no API key is configured
    pub fn from_settings(settings: &VisionSettings) -> Option<Self> {
        if !settings.enabled {
            return None;
        }
        let Some(api_key) = settings.api_key() else {
            warn!("{} not set, vision fallback disabled", settings.api_key_env);
            return None;
        };
        let client = ChatClient::new("vision", &settings.base_url, api_key, &settings.model)
            .with_sampling(settings.temperature, settings.max_tokens);
        Some(Self::new(client))
    }
}

/// Inline `data:` URL for the photo bytes
pub fn data_url(photo: &Photo) -> String {
    format!("data:{};base64,{}", photo.mime_type(), STANDARD.encode(photo.bytes()))
}

#[async_trait]
impl VisionRecognizer for OpenAiVision {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn recognize(&self, photo: &Photo) -> Result<Option<RecognitionCandidate>, CollaboratorError> {
        if photo.bytes().is_empty() {
            return Ok(None);
        }

        let reply = self
            .client
            .complete(vec![ChatMessage::user_with_image(VISION_PROMPT, data_url(photo))])
            .await?;
        let candidate = parse_component_reply(self.client.name(), &reply, SourcePath::Vision)?;

        info!(
            "Vision model recognised {} with {}% confidence",
            candidate.component_type, candidate.confidence
        );
        Ok(Some(candidate))
    }
}
