use kornia_image::{Image, allocator::CpuAllocator};

use crate::error::{Result, StylizerError};

/// Opacity of the original photo when drawn over the stylized result.
pub const BLEND_ALPHA: u8 = 128;

/// Draws `original` over `stylized` with opacity `alpha / 255`.
///
/// Each channel becomes `(original * alpha + stylized * (255 - alpha) + 127) / 255`.
pub fn blend(
    stylized: &Image<u8, 3, CpuAllocator>,
    original: &Image<u8, 3, CpuAllocator>,
    alpha: u8,
) -> Result<Image<u8, 3, CpuAllocator>> {
    if stylized.size() != original.size() {
        return Err(StylizerError::DimensionMismatch {
            stylized: stylized.size(),
            original: original.size(),
        });
    }

    let alpha = alpha as u32;
    let data = stylized
        .as_slice()
        .iter()
        .zip(original.as_slice())
        .map(|(&s, &o)| ((o as u32 * alpha + s as u32 * (255 - alpha) + 127) / 255) as u8)
        .collect();

    Ok(Image::new(stylized.size(), data, CpuAllocator)?)
}

/// Blends at [`BLEND_ALPHA`], the overlay used for display.
pub fn overlay(
    stylized: &Image<u8, 3, CpuAllocator>,
    original: &Image<u8, 3, CpuAllocator>,
) -> Result<Image<u8, 3, CpuAllocator>> {
    blend(stylized, original, BLEND_ALPHA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kornia_image::ImageSize;

    fn solid(width: usize, height: usize, rgb: [u8; 3]) -> Image<u8, 3, CpuAllocator> {
        let data = rgb.repeat(width * height);
        Image::new(ImageSize { width, height }, data, CpuAllocator).unwrap()
    }

    #[test]
    fn test_overlay_solid_colors() {
        let stylized = solid(3, 2, [200, 0, 255]);
        let original = solid(3, 2, [100, 255, 0]);
        let blended = overlay(&stylized, &original).unwrap();

        let expected = |s: u32, o: u32| ((o * 128 + s * 127 + 127) / 255) as u8;
        let pixel = [expected(200, 100), expected(0, 255), expected(255, 0)];
        // 150, 128, 127
        assert_eq!(pixel, [150, 128, 127]);
        for chunk in blended.as_slice().chunks_exact(3) {
            assert_eq!(chunk, pixel);
        }
        assert_eq!(blended.size(), stylized.size());
    }

    #[test]
    fn test_blend_extremes() {
        let stylized = solid(2, 2, [10, 20, 30]);
        let original = solid(2, 2, [90, 80, 70]);

        let only_stylized = blend(&stylized, &original, 0).unwrap();
        assert_eq!(only_stylized.as_slice(), stylized.as_slice());

        let only_original = blend(&stylized, &original, 255).unwrap();
        assert_eq!(only_original.as_slice(), original.as_slice());
    }

    #[test]
    fn test_blend_width_mismatch() {
        let stylized = solid(4, 2, [0, 0, 0]);
        let original = solid(3, 2, [0, 0, 0]);
        assert!(matches!(
            overlay(&stylized, &original),
            Err(StylizerError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_blend_height_mismatch() {
        let stylized = solid(2, 2, [0, 0, 0]);
        let original = solid(2, 3, [0, 0, 0]);
        assert!(overlay(&stylized, &original).is_err());
    }
}
