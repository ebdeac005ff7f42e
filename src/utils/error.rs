//! Error Handling Module
//!
//! Defines custom error types for the rice disease library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for rice disease operations
#[derive(Error, Debug)]
pub enum RiceDiseaseError {
    /// Uploaded or on-disk bytes could not be decoded as an image
    #[error("Unreadable image: {0}")]
    InvalidImage(String),

    /// Error loading an image file from disk
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoadError(PathBuf, String),

    /// Error with model construction, loading or saving
    #[error("Model error: {0}")]
    Model(String),

    /// Error while running the network
    #[error("Inference error: {0}")]
    Inference(String),

    /// The requested saliency layer does not exist in the model
    #[error("Layer '{name}' not found in model (available: {})", available.join(", "))]
    LayerNotFound {
        name: String,
        available: Vec<String>,
    },

    /// Label set does not match the model output width
    #[error("Label set has {labels} entries but the model predicts {classes} classes")]
    LabelMismatch { labels: usize, classes: usize },

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure talking to the external text-generation service
    #[error("External service error: {0}")]
    ExternalService(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl RiceDiseaseError {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, RiceDiseaseError::InvalidImage(_))
    }
}

impl From<serde_json::Error> for RiceDiseaseError {
    fn from(err: serde_json::Error) -> Self {
        RiceDiseaseError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for RiceDiseaseError {
    fn from(err: image::ImageError) -> Self {
        RiceDiseaseError::InvalidImage(err.to_string())
    }
}

/// Convenience Result type for rice disease operations
pub type Result<T> = std::result::Result<T, RiceDiseaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RiceDiseaseError::Dataset("test error".to_string());
        assert_eq!(format!("{}", err), "Dataset error: test error");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/path/to/leaf.jpg");
        let err = RiceDiseaseError::ImageLoadError(path, "file not found".to_string());
        assert!(format!("{}", err).contains("leaf.jpg"));
    }

    #[test]
    fn test_layer_not_found_lists_available() {
        let err = RiceDiseaseError::LayerNotFound {
            name: "out_relu".to_string(),
            available: vec!["conv1".to_string(), "last_conv_layer".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("out_relu"));
        assert!(msg.contains("conv1, last_conv_layer"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(RiceDiseaseError::InvalidImage("bad".into()).is_client_error());
        assert!(!RiceDiseaseError::Model("bad".into()).is_client_error());
    }
}
