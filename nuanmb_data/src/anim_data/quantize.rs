use thiserror::Error;

/// The largest reconstruction error allowed by default when compressing a channel.
pub const DEFAULT_EPSILON: f64 = 0.000002;

/// The largest bit width considered when searching for a channel's bit count.
pub const MAX_BIT_COUNT: u32 = 30;

// Ranges within this tolerance of 0, 1, or each other are snapped.
const SNAP_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Error, PartialEq)]
pub enum QuantizeError {
    /// No bit count up to [MAX_BIT_COUNT] reconstructs every sample within the allowed error.
    #[error(
        "No bit count up to {} preserves values in the range {}..={} within the allowed error.",
        MAX_BIT_COUNT,
        min,
        max
    )]
    BitCountNotFound { min: f32, max: f32 },

    /// The allowed error must be a positive number.
    #[error("Expected a positive error tolerance but found {}.", epsilon)]
    InvalidEpsilon { epsilon: f64 },
}

/// The value range and bit width used to pack a single scalar channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelQuantizer {
    pub min: f32,
    pub max: f32,
    /// The number of bits for each value or 0 if the channel is constant.
    pub bit_count: u32,
    /// The number of NaN samples replaced with 0.0 before fitting.
    pub nan_count: usize,
}

impl ChannelQuantizer {
    /// Finds the value range and smallest bit count that reconstructs all of `samples`
    /// with an error less than `epsilon`.
    ///
    /// If no bit count is found, `epsilon` is doubled and the search repeats until `epsilon` reaches 1.0.
    /// An `epsilon` that is zero, negative, or NaN is an error.
    /**
    ```rust
    # use nuanmb_data::anim_data::ChannelQuantizer;
    let quantizer = ChannelQuantizer::fit(&[0.5, 0.5, 0.5], 0.001).unwrap();
    assert!(quantizer.is_constant());

    let quantizer = ChannelQuantizer::fit(&[0.0, 1.0 / 3.0, 1.0], 0.001).unwrap();
    assert_eq!(2, quantizer.bit_count);
    ```
    */
    pub fn fit(samples: &[f32], epsilon: f64) -> Result<Self, QuantizeError> {
        // Doubling only terminates for positive values.
        if !(epsilon > 0.0) {
            return Err(QuantizeError::InvalidEpsilon { epsilon });
        }

        let nan_count = samples.iter().filter(|v| v.is_nan()).count();
        let values: Vec<f64> = samples
            .iter()
            .map(|v| if v.is_nan() { 0.0 } else { *v as f64 })
            .collect();

        let (min, max) = snapped_range(&values);
        let mut quantizer = Self {
            min,
            max,
            bit_count: 0,
            nan_count,
        };
        if quantizer.is_constant() {
            return Ok(quantizer);
        }

        let mut epsilon = epsilon;
        loop {
            if let Some(bit_count) = (1..=MAX_BIT_COUNT)
                .find(|bit_count| quantizer.max_error(&values, *bit_count) < epsilon)
            {
                quantizer.bit_count = bit_count;
                return Ok(quantizer);
            }

            epsilon *= 2.0;
            if !(0.0..1.0).contains(&epsilon) {
                return Err(QuantizeError::BitCountNotFound { min, max });
            }
        }
    }

    /// `true` if every sample has the same value and no bits need to be stored.
    pub fn is_constant(&self) -> bool {
        self.min == self.max
    }

    /// Converts `value` to an integer code using `bit_count` many bits.
    pub fn quantize(&self, value: f64, bit_count: u32) -> u32 {
        if bit_count == 0 {
            return 0;
        }

        let min = self.min as f64;
        let max = self.max as f64;
        let mask = bit_mask(bit_count);
        if value <= min {
            0
        } else if value >= max {
            mask as u32
        } else {
            ((value - min) / (max - min) * mask as f64) as u32
        }
    }

    /// Converts `code` back to a value using `bit_count` many bits.
    pub fn dequantize(&self, code: u32, bit_count: u32) -> f64 {
        dequantize(code, bit_count, self.min, self.max)
    }

    fn max_error(&self, values: &[f64], bit_count: u32) -> f64 {
        values
            .iter()
            .map(|v| (v - self.dequantize(self.quantize(*v, bit_count), bit_count)).abs())
            .fold(0.0, f64::max)
    }
}

/// The largest code that fits in `bit_count` many bits.
pub fn bit_mask(bit_count: u32) -> u64 {
    (1u64 << bit_count.min(u64::BITS - 1)) - 1
}

/// Interpolates between `min` and `max` by `code` out of the largest code for `bit_count`.
pub fn dequantize(code: u32, bit_count: u32, min: f32, max: f32) -> f64 {
    let min = min as f64;
    let max = max as f64;
    if bit_count == 0 {
        return min;
    }

    let factor = code as f64 / bit_mask(bit_count) as f64;
    if factor <= 0.0 {
        min
    } else if factor >= 1.0 {
        max
    } else {
        min * (1.0 - factor) + max * factor
    }
}

fn snapped_range(values: &[f64]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if is_close(min, 1.0) {
        min = 1.0;
    }
    if is_close(max, 1.0) {
        max = 1.0;
    }
    if min.abs() <= SNAP_TOLERANCE {
        min = 0.0;
    }
    if max.abs() <= SNAP_TOLERANCE {
        max = 0.0;
    }
    if is_close(min, max) {
        min = max;
    }

    // Only f32 ranges are stored.
    (min as f32, max as f32)
}

// Relative tolerance comparison scaled by the larger magnitude.
fn is_close(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= SNAP_TOLERANCE * a.abs().max(b.abs())
}
