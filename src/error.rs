use kornia_image::ImageSize;
use thiserror::Error;

/// Errors raised while building requests, reading responses or compositing results.
#[derive(Error, Debug)]
pub enum StylizerError {
    #[error("Style index {0} is out of range [0, {max})", max = crate::NUM_STYLES)]
    InvalidStyleIndex(i64),

    #[error("Invalid style weights: {0}")]
    InvalidStyleWeights(String),

    #[error("Failed to encode image as JPEG: {0}")]
    ImageEncoding(String),

    #[error("Failed to decode stylized image: {0}")]
    ImageDecoding(String),

    #[error("Prediction service returned an error: {0}")]
    PredictionService(String),

    #[error("Prediction service returned no predictions")]
    EmptyPredictionResult,

    #[error("Malformed prediction: {0}")]
    MalformedPrediction(String),

    #[error("Image dimensions differ: stylized {stylized:?}, original {original:?}")]
    DimensionMismatch {
        stylized: ImageSize,
        original: ImageSize,
    },

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] kornia_image::ImageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, StylizerError>;
