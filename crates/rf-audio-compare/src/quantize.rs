//! Fixed-point quantization at 8/16/24-bit depths
//!
//! Normalized samples live in `[-1.0, 1.0)`. A fixed-point value `v` at depth
//! `n` maps to `v / 2^(n-1)`, so one quantum is `1 / 2^(n-1)`.

use crate::{CompareError, Result};
use serde::{Deserialize, Serialize};

/// Supported PCM bit depths, ordered from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    Bits8,
    Bits16,
    Bits24,
}

impl BitDepth {
    /// Map a container's declared sample size to a bit depth
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::Bits8),
            16 => Ok(Self::Bits16),
            24 => Ok(Self::Bits24),
            other => Err(CompareError::UnsupportedBitDepth(other)),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits24 => 24,
        }
    }

    /// Bytes per sample in a packed PCM container
    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Magnitude of full scale (`2^(bits-1)`)
    pub fn full_scale(self) -> f64 {
        (1u32 << (self.bits() - 1)) as f64
    }

    /// One least-significant-bit step in normalized units
    pub fn quantum(self) -> f64 {
        1.0 / self.full_scale()
    }

    pub fn min_value(self) -> i32 {
        -(1i32 << (self.bits() - 1))
    }

    pub fn max_value(self) -> i32 {
        (1i32 << (self.bits() - 1)) - 1
    }

    /// Quantize a normalized sample, rounding half away from zero and clamping
    pub fn quantize(self, sample: f64) -> i32 {
        let scaled = (sample * self.full_scale()).round();
        scaled.clamp(self.min_value() as f64, self.max_value() as f64) as i32
    }

    /// Convert a fixed-point value back to normalized units
    pub fn dequantize(self, value: i32) -> f64 {
        value as f64 * self.quantum()
    }

    /// The coarser of two depths, used when comparing mismatched streams
    pub fn lower(self, other: Self) -> Self {
        self.min(other)
    }
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_bits() {
        assert_eq!(BitDepth::from_bits(16).unwrap(), BitDepth::Bits16);
        assert!(matches!(
            BitDepth::from_bits(32),
            Err(CompareError::UnsupportedBitDepth(32))
        ));
    }

    #[test]
    fn test_quantum() {
        assert_relative_eq!(BitDepth::Bits8.quantum(), 1.0 / 128.0);
        assert_relative_eq!(BitDepth::Bits16.quantum(), 1.0 / 32768.0);
        assert_relative_eq!(BitDepth::Bits24.quantum(), 1.0 / 8388608.0);
    }

    #[test]
    fn test_quantize_roundtrip() {
        for depth in [BitDepth::Bits8, BitDepth::Bits16, BitDepth::Bits24] {
            for v in [depth.min_value(), -1, 0, 1, depth.max_value()] {
                assert_eq!(depth.quantize(depth.dequantize(v)), v);
            }
        }
    }

    #[test]
    fn test_quantize_clamps() {
        assert_eq!(BitDepth::Bits16.quantize(1.0), 32767);
        assert_eq!(BitDepth::Bits16.quantize(-2.0), -32768);
        assert_eq!(BitDepth::Bits8.quantize(0.5 / 128.0), 1);
        assert_eq!(BitDepth::Bits8.quantize(-0.5 / 128.0), -1);
    }

    #[test]
    fn test_lower() {
        assert_eq!(BitDepth::Bits24.lower(BitDepth::Bits16), BitDepth::Bits16);
        assert_eq!(BitDepth::Bits8.lower(BitDepth::Bits24), BitDepth::Bits8);
    }
}
