use serde::Serialize;
use thiserror::Error;

/// Longest excerpt of a bad payload kept for diagnostics.
pub const EXCERPT_CHARS: usize = 100;

/// Why a submission stopped.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    UploadFailed(String),

    #[error("{0}")]
    ConversionFailed(String),

    #[error("{0}")]
    InferenceFailed(String),

    #[error("Failed to parse AI response ({detail}). Received: {excerpt}...")]
    MalformedFeedback { detail: String, excerpt: String },

    #[error("{0}")]
    PersistenceFailed(String),
}

/// Serializable tag for `AnalysisError`, shown alongside the failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    UploadFailed,
    ConversionFailed,
    InferenceFailed,
    MalformedFeedback,
    PersistenceFailed,
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::InvalidInput(_) => FailureKind::InvalidInput,
            AnalysisError::UploadFailed(_) => FailureKind::UploadFailed,
            AnalysisError::ConversionFailed(_) => FailureKind::ConversionFailed,
            AnalysisError::InferenceFailed(_) => FailureKind::InferenceFailed,
            AnalysisError::MalformedFeedback { .. } => FailureKind::MalformedFeedback,
            AnalysisError::PersistenceFailed(_) => FailureKind::PersistenceFailed,
        }
    }

    pub fn malformed(detail: impl ToString, offending: &str) -> Self {
        AnalysisError::MalformedFeedback {
            detail: excerpt(&detail.to_string(), 2 * EXCERPT_CHARS),
            excerpt: excerpt(offending, EXCERPT_CHARS),
        }
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
