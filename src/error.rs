// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for posture analysis.

use std::fmt;

use crate::landmarks::Landmark;

/// Result type alias for posture analysis operations.
pub type Result<T> = std::result::Result<T, PostureError>;

/// Main error type for the posture analysis library.
#[derive(Debug)]
pub enum PostureError {
    /// The video source could not be opened or decoded at all.
    VideoOpen(String),
    /// Input bytes or file do not decode to a valid image.
    ImageDecode(String),
    /// The landmark provider did not supply a landmark the rules need.
    MissingLandmark(Landmark),
    /// Error loading the ONNX landmark model.
    ModelLoad(String),
    /// Error while running the landmark model.
    Inference(String),
    /// Invalid configuration provided.
    Config(String),
    /// Report (de)serialization failure.
    Serialization(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl fmt::Display for PostureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoOpen(msg) => write!(f, "Could not open video: {msg}"),
            Self::ImageDecode(msg) => write!(f, "Failed to decode image: {msg}"),
            Self::MissingLandmark(lm) => write!(f, "Missing landmark: {lm}"),
            Self::ModelLoad(msg) => write!(f, "Model load error: {msg}"),
            Self::Inference(msg) => write!(f, "Inference error: {msg}"),
            Self::Config(msg) => write!(f, "Config error: {msg}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for PostureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PostureError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for PostureError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(err.to_string())
    }
}

impl From<serde_json::Error> for PostureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostureError::VideoOpen("clip.mp4".to_string());
        assert_eq!(err.to_string(), "Could not open video: clip.mp4");

        let err = PostureError::MissingLandmark(Landmark::LeftEar);
        assert_eq!(err.to_string(), "Missing landmark: LEFT_EAR");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = PostureError::from(std::io::Error::other("disk"));
        assert!(err.source().is_some());
        assert!(PostureError::Config("x".to_string()).source().is_none());
    }
}
