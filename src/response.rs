use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, StylizerError};

// the service may or may not pad its url-safe output
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body returned by the prediction service.
///
/// A failed call carries an `error` value whose format is defined by the
/// service; a successful one carries the `predictions` list. Parsing only
/// fails on invalid JSON: a `predictions` value that is not a list reads as
/// absent, so a reported `error` is never masked by a malformed payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "predictions_if_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub predictions: Option<Vec<Prediction>>,
}

/// One stylized output. Entries that are not objects, or whose
/// `output_image` is not a string, read as having no image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct Prediction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_image: Option<String>,
}

impl From<serde_json::Value> for Prediction {
    fn from(value: serde_json::Value) -> Self {
        Self {
            output_image: value
                .get("output_image")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        }
    }
}

fn predictions_if_list<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<Prediction>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Array(items)) => {
            Some(items.into_iter().map(Prediction::from).collect())
        }
        _ => None,
    })
}

impl PredictResponse {
    /// Parses a raw response body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Extracts the JPEG bytes of the first stylized image.
///
/// Only one instance is ever sent per request, so predictions past the
/// first one are ignored.
pub fn decode_response(response: &PredictResponse) -> Result<Vec<u8>> {
    if let Some(error) = &response.error {
        let message = match error {
            serde_json::Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        log::warn!("Prediction service reported an error: {}", message);
        return Err(StylizerError::PredictionService(message));
    }

    let predictions = response.predictions.as_ref().ok_or_else(|| {
        StylizerError::MalformedPrediction(
            "response has neither `error` nor a `predictions` list".into(),
        )
    })?;

    let first = predictions
        .first()
        .ok_or(StylizerError::EmptyPredictionResult)?;

    if predictions.len() > 1 {
        log::debug!(
            "Ignoring {} extra predictions in response",
            predictions.len() - 1
        );
    }

    let encoded = first.output_image.as_deref().ok_or_else(|| {
        StylizerError::MalformedPrediction("first prediction has no `output_image` string".into())
    })?;

    let compact: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    Ok(URL_SAFE_LENIENT.decode(compact)?)
}

/// Parses a raw response body and extracts the first stylized image.
pub fn decode_response_str(body: &str) -> Result<Vec<u8>> {
    decode_response(&PredictResponse::from_json(body)?)
}

/// Decodes image bytes returned by [`decode_response`] into RGB pixels.
pub fn decode_image(bytes: &[u8]) -> Result<Image<u8, 3, CpuAllocator>> {
    let rgb = image::load_from_memory(bytes)
        .map_err(|e| StylizerError::ImageDecoding(e.to_string()))?
        .to_rgb8();

    let size = ImageSize {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
    };

    Ok(Image::new(size, rgb.into_raw(), CpuAllocator)?)
}
