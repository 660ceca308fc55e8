use crate::error::ScanError;
use ndarray::Array2;

/// Integer width of a normalized depth map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Largest value representable at this width (`2^(8*bits) - 1`)
    pub fn max_value(self) -> f64 {
        match self {
            BitDepth::Eight => u8::MAX as f64,
            BitDepth::Sixteen => u16::MAX as f64,
        }
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = ScanError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(BitDepth::Eight),
            2 => Ok(BitDepth::Sixteen),
            other => Err(ScanError::InvalidBitDepth(other)),
        }
    }
}

/// Depth estimate rescaled into a fixed-width unsigned integer image
#[derive(Debug, Clone, PartialEq)]
pub enum DepthMap {
    Eight(Array2<u8>),
    Sixteen(Array2<u16>),
}

impl DepthMap {
    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        match self {
            DepthMap::Eight(map) => map.dim(),
            DepthMap::Sixteen(map) => map.dim(),
        }
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            DepthMap::Eight(_) => BitDepth::Eight,
            DepthMap::Sixteen(_) => BitDepth::Sixteen,
        }
    }

    /// 8-bit view of every sample, row-major; 16-bit samples keep their high byte
    pub fn to_gray8(&self) -> Vec<u8> {
        match self {
            DepthMap::Eight(map) => map.iter().copied().collect(),
            DepthMap::Sixteen(map) => map.iter().map(|&v| (v >> 8) as u8).collect(),
        }
    }
}

/// Linearly rescale a raw depth estimate into `[0, 2^(8*bits) - 1]`
///
/// The estimate's minimum maps to 0 and its maximum to the top of the range.
/// Flat estimates (range not above `f64::EPSILON`) produce an all-zero map.
pub fn normalize(estimate: &Array2<f32>, bits: BitDepth) -> DepthMap {
    let (min, max) = estimate
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            let v = v as f64;
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let max_val = bits.max_value();

    // Empty input leaves min/max at their infinite seeds; the negative range
    // falls through to the zero branch.
    let scaled = if range > f64::EPSILON {
        // Dividing first keeps both endpoints exact: max / range is exactly 1.
        Some(estimate.mapv(|v| (v as f64 - min) / range * max_val))
    } else {
        None
    };

    match bits {
        BitDepth::Eight => DepthMap::Eight(match scaled {
            Some(values) => values.mapv(|v| v as u8),
            None => Array2::zeros(estimate.dim()),
        }),
        BitDepth::Sixteen => DepthMap::Sixteen(match scaled {
            Some(values) => values.mapv(|v| v as u16),
            None => Array2::zeros(estimate.dim()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rescales_linear_ramp_to_8bit() {
        let estimate = array![[0.0f32, 10.0], [20.0, 30.0]];
        let map = normalize(&estimate, BitDepth::Eight);
        assert_eq!(map, DepthMap::Eight(array![[0u8, 85], [170, 255]]));
    }

    #[test]
    fn flat_estimate_is_all_zero_16bit() {
        let estimate = array![[5.0f32, 5.0], [5.0, 5.0]];
        let map = normalize(&estimate, BitDepth::Sixteen);
        assert_eq!(map, DepthMap::Sixteen(Array2::zeros((2, 2))));
    }

    #[test]
    fn flat_estimate_is_all_zero_8bit() {
        let estimate = Array2::from_elem((3, 4), -12.5f32);
        let map = normalize(&estimate, BitDepth::Eight);
        assert_eq!(map, DepthMap::Eight(Array2::zeros((3, 4))));
    }

    #[test]
    fn output_spans_full_range_for_both_widths() {
        let estimate = Array2::from_shape_fn((7, 5), |(r, c)| (r as f32 * 1.7) - (c as f32 * 0.3) + 4.0);

        match normalize(&estimate, BitDepth::Eight) {
            DepthMap::Eight(map) => {
                assert_eq!(map.iter().copied().min(), Some(0));
                assert_eq!(map.iter().copied().max(), Some(u8::MAX));
            }
            other => panic!("expected 8-bit map, got {:?}", other.bit_depth()),
        }

        match normalize(&estimate, BitDepth::Sixteen) {
            DepthMap::Sixteen(map) => {
                assert_eq!(map.iter().copied().min(), Some(0));
                assert_eq!(map.iter().copied().max(), Some(u16::MAX));
            }
            other => panic!("expected 16-bit map, got {:?}", other.bit_depth()),
        }
    }

    #[test]
    fn preserves_shape_and_requested_width() {
        let estimate = Array2::from_shape_fn((3, 9), |(r, c)| (r * 9 + c) as f32);
        for bits in [BitDepth::Eight, BitDepth::Sixteen] {
            let map = normalize(&estimate, bits);
            assert_eq!(map.dim(), (3, 9));
            assert_eq!(map.bit_depth(), bits);
        }
    }

    #[test]
    fn negative_values_are_shifted_to_zero() {
        let estimate = array![[-4.0f32, 0.0, 4.0]];
        assert_eq!(
            normalize(&estimate, BitDepth::Eight),
            DepthMap::Eight(array![[0u8, 127, 255]])
        );
    }

    #[test]
    fn empty_estimate_gives_empty_map() {
        let estimate = Array2::<f32>::zeros((0, 4));
        assert_eq!(normalize(&estimate, BitDepth::Sixteen).dim(), (0, 4));
    }

    #[test]
    fn parses_bit_depth() {
        assert_eq!(BitDepth::try_from(1).unwrap(), BitDepth::Eight);
        assert_eq!(BitDepth::try_from(2).unwrap(), BitDepth::Sixteen);
        assert!(matches!(
            BitDepth::try_from(3),
            Err(ScanError::InvalidBitDepth(3))
        ));
    }

    #[test]
    fn sixteen_bit_gray_view_keeps_high_byte() {
        let map = DepthMap::Sixteen(array![[0u16, 0x01ff, 0xff00]]);
        assert_eq!(map.to_gray8(), vec![0, 1, 255]);
    }
}
