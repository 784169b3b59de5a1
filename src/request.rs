use base64::{Engine as _, engine::general_purpose};
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use kornia_image::{Image, allocator::CpuAllocator};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    error::{Result, StylizerError},
    weights::StyleWeights,
};

/// JPEG quality used for the image sent to the prediction service.
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Body of a `projects.predict` call for the stylizer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<Instance>,
}

/// One image to stylize together with its style mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub style_weights: StyleWeights,
    pub image_bytes: ImageBytes,
}

/// Binary payload wrapper; the service expects base64 under the `b64` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBytes {
    pub b64: String,
}

impl PredictRequest {
    /// Serializes the request as compact JSON, the form sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the request as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the serialized request to `path` so it can be replayed or inspected.
    pub fn write_debug_dump(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?)?;
        log::debug!("Wrote predict request to {}", path.display());
        Ok(())
    }
}

/// Compresses an RGB image to JPEG.
pub fn encode_jpeg(image: &Image<u8, 3, CpuAllocator>, quality: u8) -> Result<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        return Err(StylizerError::ImageEncoding(format!(
            "JPEG quality {quality} is outside [1, 100]"
        )));
    }

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(StylizerError::ImageEncoding(format!(
            "cannot compress a {width}x{height} image"
        )));
    }

    let width = u32::try_from(width)
        .map_err(|_| StylizerError::ImageEncoding(format!("width {width} is too large")))?;
    let height = u32::try_from(height)
        .map_err(|_| StylizerError::ImageEncoding(format!("height {height} is too large")))?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(image.as_slice(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| StylizerError::ImageEncoding(e.to_string()))?;

    Ok(jpeg)
}

/// Builds a request that applies a single style to `image`.
pub fn encode_request(
    image: &Image<u8, 3, CpuAllocator>,
    style_index: i64,
) -> Result<PredictRequest> {
    let weights = StyleWeights::one_hot(style_index)?;
    encode_request_with_weights(image, weights, DEFAULT_JPEG_QUALITY)
}

/// Builds a request with an arbitrary style mix and JPEG quality.
pub fn encode_request_with_weights(
    image: &Image<u8, 3, CpuAllocator>,
    style_weights: StyleWeights,
    quality: u8,
) -> Result<PredictRequest> {
    let jpeg = encode_jpeg(image, quality)?;
    log::debug!(
        "Compressed {}x{} image to {} JPEG bytes, dominant style {}",
        image.width(),
        image.height(),
        jpeg.len(),
        style_weights.dominant_style()
    );

    Ok(PredictRequest {
        instances: vec![Instance {
            style_weights,
            image_bytes: ImageBytes {
                b64: general_purpose::STANDARD.encode(&jpeg),
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NUM_STYLES;
    use base64::Engine as _;
    use kornia_image::ImageSize;

    fn gradient_image(width: usize, height: usize) -> Image<u8, 3, CpuAllocator> {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128]);
            }
        }
        Image::new(ImageSize { width, height }, data, CpuAllocator).unwrap()
    }

    #[test]
    fn test_encode_request_shape() {
        let image = gradient_image(8, 8);
        let request = encode_request(&image, 5).unwrap();
        let value: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();

        let instances = value["instances"].as_array().unwrap();
        assert_eq!(instances.len(), 1);

        let weights = instances[0]["style_weights"].as_array().unwrap();
        assert_eq!(weights.len(), NUM_STYLES);
        assert_eq!(weights[5].as_f64(), Some(1.0));
        let sum: f64 = weights.iter().filter_map(|w| w.as_f64()).sum();
        assert_eq!(sum, 1.0);

        let b64 = instances[0]["image_bytes"]["b64"].as_str().unwrap();
        let jpeg = general_purpose::STANDARD.decode(b64).unwrap();
        // JPEG SOI marker
        assert_eq!(jpeg[..2], [0xFF_u8, 0xD8]);
    }

    #[test]
    fn test_encode_request_invalid_style_index() {
        let image = gradient_image(4, 4);
        for index in [32, -1] {
            match encode_request(&image, index) {
                Err(StylizerError::InvalidStyleIndex(i)) => assert_eq!(i, index),
                _ => panic!("Expected InvalidStyleIndex"),
            }
        }
    }

    #[test]
    fn test_base64_preserves_jpeg_bytes() {
        let image = gradient_image(16, 8);
        let jpeg = encode_jpeg(&image, DEFAULT_JPEG_QUALITY).unwrap();
        let request = encode_request(&image, 0).unwrap();

        let decoded = general_purpose::STANDARD
            .decode(&request.instances[0].image_bytes.b64)
            .unwrap();
        assert_eq!(decoded, jpeg);
    }

    #[test]
    fn test_encode_jpeg_zero_dimension() {
        let image = Image::<u8, 3, CpuAllocator>::new(
            ImageSize {
                width: 0,
                height: 4,
            },
            vec![],
            CpuAllocator,
        )
        .unwrap();

        assert!(matches!(
            encode_jpeg(&image, DEFAULT_JPEG_QUALITY),
            Err(StylizerError::ImageEncoding(_))
        ));
    }

    #[test]
    fn test_encode_jpeg_invalid_quality() {
        let image = gradient_image(4, 4);
        assert!(matches!(
            encode_jpeg(&image, 0),
            Err(StylizerError::ImageEncoding(_))
        ));
        assert!(matches!(
            encode_jpeg(&image, 101),
            Err(StylizerError::ImageEncoding(_))
        ));
    }

    #[test]
    fn test_requests_are_independent() {
        let image = gradient_image(4, 4);
        let first = encode_request(&image, 1).unwrap();
        let second = encode_request(&image, 2).unwrap();
        assert_eq!(first.instances.len(), 1);
        assert_eq!(second.instances.len(), 1);
        assert_eq!(first.instances[0].style_weights.dominant_style(), 1);
        assert_eq!(second.instances[0].style_weights.dominant_style(), 2);
    }

    #[test]
    fn test_write_debug_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");

        let request = encode_request(&gradient_image(4, 4), 3).unwrap();
        request.write_debug_dump(&path).unwrap();

        let dumped = std::fs::read_to_string(&path).unwrap();
        let parsed: PredictRequest = serde_json::from_str(&dumped).unwrap();
        assert_eq!(parsed, request);
    }
}
