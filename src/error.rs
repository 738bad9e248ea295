//! Error types for design cutout and mockup-job operations

use thiserror::Error;

/// Result type alias for design processing operations
pub type Result<T> = std::result::Result<T, DesignForgeError>;

/// Comprehensive error types for cutout and job-polling operations
#[derive(Error, Debug)]
pub enum DesignForgeError {
    /// Input/output errors (stream read failures, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or decoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP transport errors while fetching a remote design image
    #[error("Design fetch error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote job errors (creation, explicit failure, timeout, cooldown)
    #[error("Job error: {0}")]
    Job(#[from] crate::poller::PollError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DesignForgeError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an image decoding error with source context
    pub fn decode_error(source_label: &str, error: &image::ImageError) -> Self {
        Self::Image(image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Failed to decode design image from {}: {}. Supported formats: PNG, JPEG",
                source_label, error
            ),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = DesignForgeError::invalid_config("soft tolerance must exceed hard tolerance");
        assert!(err
            .to_string()
            .contains("soft tolerance must exceed hard tolerance"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DesignForgeError = io.into();
        assert!(matches!(err, DesignForgeError::Io(_)));
    }

    #[test]
    fn test_decode_error_mentions_source() {
        let image_err = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad magic bytes",
        ));
        let err = DesignForgeError::decode_error("memory buffer", &image_err);
        let message = err.to_string();
        assert!(message.contains("memory buffer"));
        assert!(message.contains("PNG, JPEG"));
    }
}
