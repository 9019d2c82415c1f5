//! Recognition error types

use super::candidate::Evidence;

/// Failure of an external collaborator (OCR engine, extraction model, vision model)
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or refused to serve:
    /// missing binary, transport failure, auth error, rate limit or 5xx
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: String,
        message: String,
    },

    /// The collaborator answered but the answer could not be used
    #[error("{collaborator} returned an invalid response: {message}")]
    InvalidResponse {
        collaborator: String,
        message: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn collaborator(&self) -> &str {
        match self {
            Self::Unavailable { collaborator, .. } | Self::InvalidResponse { collaborator, .. } => {
                collaborator
            }
        }
    }
}

/// Failure of a whole recognition request
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecognitionError {
    /// Nothing usable was recognised and at least one collaborator was
    /// unreachable, so retrying later may succeed
    #[error("recognition incomplete: {source}")]
    CollaboratorUnavailable {
        source: CollaboratorError,
        /// Whatever was gathered before giving up
        evidence: Box<Evidence>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        let err = CollaboratorError::unavailable("tesseract", "binary not found");
        assert!(err.is_unavailable());
        assert_eq!(err.collaborator(), "tesseract");
        assert_eq!(err.to_string(), "tesseract unavailable: binary not found");

        let err = CollaboratorError::invalid_response("groq", "not json");
        assert!(!err.is_unavailable());
    }
}
