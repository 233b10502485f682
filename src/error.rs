// Error types for the mood-lens frame analysis pipeline

use thiserror::Error;

/// Main error type for mood-lens
#[derive(Debug, Error)]
pub enum MoodLensError {
    #[error("Camera initialization failed: {0}")]
    CameraInit(String),

    #[error("Camera access denied")]
    CameraAccessDenied,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Face detection failed: {0}")]
    FaceDetection(String),

    #[error("Image loading failed: {0}")]
    ImageLoad(String),

    #[error("History storage failed: {0}")]
    History(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Result type alias for mood-lens operations
pub type Result<T> = std::result::Result<T, MoodLensError>;
