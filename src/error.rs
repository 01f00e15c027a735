//! Error types for the tracking engine

use thiserror::Error;

/// Result type alias for the tracking library
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur while configuring or updating a tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Detection/embedding count mismatch: {detections} detections, {embeddings} embeddings")]
    LengthMismatch {
        detections: usize,
        embeddings: usize,
    },

    #[error("Malformed box for detection {index}: {reason}")]
    MalformedBox { index: usize, reason: String },

    #[error("Confidence {confidence} of detection {index} is outside [0, 1]")]
    ConfidenceOutOfRange { index: usize, confidence: f32 },

    #[error("Embedding of detection {index} has dimension {actual}, expected {expected}")]
    EmbeddingDimension {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Embedding of detection {index} contains non-finite values")]
    NonFiniteEmbedding { index: usize },

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn malformed_box<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::MalformedBox {
            index,
            reason: reason.into(),
        }
    }

    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalInstability(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True for errors caused by caller-supplied frame data.
    ///
    /// A frame rejected with one of these leaves the tracker untouched.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::LengthMismatch { .. }
                | Self::MalformedBox { .. }
                | Self::ConfidenceOutOfRange { .. }
                | Self::EmbeddingDimension { .. }
                | Self::NonFiniteEmbedding { .. }
        )
    }
}
