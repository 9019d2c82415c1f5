//! Recognition Layer
//!
//! Turns the raw evidence from the vision layer into a single accepted or
//! rejected component candidate.

pub mod candidate;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod orchestrator;
pub mod policy;
pub mod vision;

pub use candidate::{Evidence, RecognitionCandidate, RecognitionResult, SourcePath};
pub use error::{CollaboratorError, RecognitionError};
pub use extractor::{LlmExtractor, PatternExtractor, StructuredExtractor};
pub use orchestrator::Orchestrator;
pub use policy::RecognitionPolicy;
pub use vision::{OpenAiVision, VisionRecognizer};
