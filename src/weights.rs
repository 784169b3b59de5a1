use serde::{Deserialize, Serialize};

use crate::error::{Result, StylizerError};

/// Number of raw styles the stylizer model was trained on.
pub const NUM_STYLES: usize = 32;

// tolerance on the sum of a blended weight vector
const SUM_TOLERANCE: f32 = 1e-4;

/// Per-style intensities sent with every prediction instance.
///
/// The model accepts any mix of its source styles as long as each intensity
/// lies in `[0, 1]` and they add up to one. Serializes as a bare array of
/// [`NUM_STYLES`] numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct StyleWeights([f32; NUM_STYLES]);

impl StyleWeights {
    /// Selects a single style at full intensity.
    pub fn one_hot(style_index: i64) -> Result<Self> {
        let index = usize::try_from(style_index)
            .ok()
            .filter(|index| *index < NUM_STYLES)
            .ok_or(StylizerError::InvalidStyleIndex(style_index))?;

        let mut weights = [0.0; NUM_STYLES];
        weights[index] = 1.0;
        Ok(Self(weights))
    }

    /// Mixes several styles. Every weight must be in `[0, 1]` and the total must be one.
    pub fn blend(weights: [f32; NUM_STYLES]) -> Result<Self> {
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0 || **w > 1.0)
        {
            return Err(StylizerError::InvalidStyleWeights(format!(
                "weight {w} at index {i} is outside [0, 1]"
            )));
        }

        let sum: f32 = weights.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(StylizerError::InvalidStyleWeights(format!(
                "weights sum to {sum}, expected 1"
            )));
        }

        Ok(Self(weights))
    }

    /// Returns the weights in style order.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Index of the strongest style; the lowest index wins ties.
    pub(crate) fn dominant_style(&self) -> usize {
        self.0
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, w)| if *w > best.1 { (i, *w) } else { best })
            .0
    }
}

impl TryFrom<Vec<f32>> for StyleWeights {
    type Error = StylizerError;

    fn try_from(weights: Vec<f32>) -> Result<Self> {
        let len = weights.len();
        let weights: [f32; NUM_STYLES] = weights.try_into().map_err(|_| {
            StylizerError::InvalidStyleWeights(format!(
                "expected {NUM_STYLES} weights, got {len}"
            ))
        })?;
        Self::blend(weights)
    }
}

impl From<StyleWeights> for Vec<f32> {
    fn from(weights: StyleWeights) -> Self {
        weights.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_every_index() {
        for index in 0..NUM_STYLES {
            let weights = StyleWeights::one_hot(index as i64).unwrap();
            let values = weights.as_slice();
            assert_eq!(values.len(), NUM_STYLES);
            for (i, w) in values.iter().enumerate() {
                if i == index {
                    assert_eq!(*w, 1.0);
                } else {
                    assert_eq!(*w, 0.0);
                }
            }
            assert_eq!(values.iter().sum::<f32>(), 1.0);
            assert_eq!(weights.dominant_style(), index);
        }
    }

    #[test]
    fn test_one_hot_out_of_range() {
        for index in [32, -1, 1000, i64::MIN] {
            match StyleWeights::one_hot(index) {
                Err(StylizerError::InvalidStyleIndex(i)) => assert_eq!(i, index),
                _ => panic!("Expected InvalidStyleIndex for {index}"),
            }
        }
    }

    #[test]
    fn test_blend_accepts_mix() {
        let mut mix = [0.0; NUM_STYLES];
        mix[3] = 0.25;
        mix[7] = 0.75;
        let weights = StyleWeights::blend(mix).unwrap();
        assert_eq!(weights.dominant_style(), 7);
    }

    #[test]
    fn test_blend_rejects_bad_sum() {
        let mut mix = [0.0; NUM_STYLES];
        mix[0] = 0.5;
        mix[1] = 0.4;
        assert!(matches!(
            StyleWeights::blend(mix),
            Err(StylizerError::InvalidStyleWeights(_))
        ));
    }

    #[test]
    fn test_blend_rejects_out_of_range_weight() {
        let mut mix = [0.0; NUM_STYLES];
        mix[0] = 1.5;
        mix[1] = -0.5;
        assert!(matches!(
            StyleWeights::blend(mix),
            Err(StylizerError::InvalidStyleWeights(_))
        ));

        let mut mix = [0.0; NUM_STYLES];
        mix[0] = f32::NAN;
        assert!(StyleWeights::blend(mix).is_err());
    }

    #[test]
    fn test_serializes_as_array() {
        let weights = StyleWeights::one_hot(2).unwrap();
        let value = serde_json::to_value(&weights).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), NUM_STYLES);
        assert_eq!(array[2], serde_json::json!(1.0));
        assert_eq!(array[0], serde_json::json!(0.0));
    }

    #[test]
    fn test_deserialize_rejects_wrong_length() {
        let result = serde_json::from_str::<StyleWeights>("[1.0, 0.0]");
        assert!(result.is_err());
    }
}
