//! Error types for cupscore
//!
//! One error enum covers the whole serving path. Variants are grouped by who is
//! at fault: the caller (bad batch shape), the fitted artifacts (transform or
//! predict failure), or the transport between a caller and the server.

use thiserror::Error;

/// Result type alias for cupscore operations
pub type Result<T> = std::result::Result<T, CupError>;

/// Error type for all cupscore operations
#[derive(Debug, Error)]
pub enum CupError {
    /// Request batch is malformed (not tabular, ragged rows, wrong types)
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Description of the violation
        reason: String,
    },

    /// Fitted transform raised while encoding the table
    #[error("Preprocessor transform failed: {0}")]
    Transform(String),

    /// Fitted predictor raised while scoring the matrix
    #[error("Model prediction failed: {0}")]
    Predict(String),

    /// Artifact file could not be read or parsed
    #[error("Failed to load {artifact} artifact: {reason}")]
    ArtifactLoad {
        /// Which artifact ("preprocessor" or "model")
        artifact: String,
        /// Underlying cause
        reason: String,
    },

    /// Configuration file exists but could not be used
    #[error("Invalid configuration in {path}: {reason}")]
    Config {
        /// Path of the config file
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Prediction endpoint unreachable or answered with an error status
    #[error("Connection error: {0}")]
    Connection(String),

    /// Prediction endpoint did not answer within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Payload could not be encoded or a response could not be decoded
    #[error("Format error: {reason}")]
    Format {
        /// Description of the encoding problem
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CupError {
    /// Shorthand for [`CupError::InvalidInput`]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// True when the caller sent something unusable (4xx class)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// HTTP status code this error maps to at the transport boundary
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 422,
            Self::Connection(_) => 502,
            Self::Timeout(_) => 504,
            Self::Transform(_)
            | Self::Predict(_)
            | Self::ArtifactLoad { .. }
            | Self::Config { .. }
            | Self::Format { .. }
            | Self::Io(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_client_error() {
        let err = CupError::invalid_input("rows must be a list");
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("rows must be a list"));
    }

    #[test]
    fn test_processing_errors_are_server_side() {
        let transform = CupError::Transform("column mismatch".to_string());
        let predict = CupError::Predict("shape".to_string());
        assert!(!transform.is_client_error());
        assert!(!predict.is_client_error());
        assert_eq!(transform.status_code(), 500);
        assert_eq!(predict.status_code(), 500);
        assert!(transform.to_string().contains("column mismatch"));
    }

    #[test]
    fn test_artifact_load_display() {
        let err = CupError::ArtifactLoad {
            artifact: "model".to_string(),
            reason: "missing field `intercept`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load model artifact: missing field `intercept`"
        );
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CupError = io.into();
        assert!(matches!(err, CupError::Io(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_transport_status_codes() {
        assert_eq!(CupError::Connection("refused".into()).status_code(), 502);
        assert_eq!(CupError::Timeout("10s".into()).status_code(), 504);
    }
}
