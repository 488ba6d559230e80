//! Order-preserving map between IEEE 754 values and unsigned integers
//!
//! Prediction works by integer subtraction, so samples are first carried into a
//! domain where integer closeness tracks value closeness. The map used here is
//! the classic monotone transform: reinterpret the IEEE bits, complement them,
//! and flip the low bits whenever the (complemented) sign bit is set. Under it
//! the whole IEEE total order becomes plain unsigned order,
//!
//! ```text
//! -NaN < -inf < ... < -0.0 < +0.0 < ... < +inf < +NaN
//! ```
//!
//! and every bit pattern, including every NaN payload and both signed zeros, has
//! a distinct image. [`Sample::inverse`] undoes [`Sample::forward`] exactly, so
//! the codec is lossless down to the last payload bit.

use core::fmt::Debug;

use num_traits::{AsPrimitive, PrimInt, Unsigned, WrappingAdd, WrappingSub};

/// Width tag stored in the container header's type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SampleKind {
    /// 32-bit IEEE 754 (`f32`).
    Float = 0,
    /// 64-bit IEEE 754 (`f64`).
    Double = 1,
}

impl SampleKind {
    /// Byte value written to the header.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SampleKind::Float),
            1 => Some(SampleKind::Double),
            _ => None,
        }
    }
}

/// Unsigned integer types that serve as the ordered image of a sample.
///
/// Everything downstream of the map (predictor, residual coder) operates on
/// these integers. The trait mostly re-exports what the `num-traits` bounds
/// already provide; the additions are the bit width as a constant and a
/// truncating conversion from `u64`, which the residual decoder uses to
/// reassemble magnitudes from raw coded chunks.
///
/// # Safety
///
/// Implementations must behave exactly like the builtin unsigned integer of
/// `BITS` bits; the coders rely on two's complement wrap-around in `wrapping_*`
/// and on `leading_zeros` agreeing with the bit width.
pub unsafe trait OrderedBits:
    PrimInt + Unsigned + WrappingAdd + WrappingSub + AsPrimitive<u64> + Debug + 'static
{
    /// Fixed width in bits (32 or 64 for the provided impls).
    const BITS: u32;

    /// Truncating conversion from a raw `u64`.
    fn from_raw(raw: u64) -> Self;
}

unsafe impl OrderedBits for u32 {
    const BITS: u32 = 32;

    #[inline(always)]
    fn from_raw(raw: u64) -> Self {
        raw as u32
    }
}

unsafe impl OrderedBits for u64 {
    const BITS: u32 = 64;

    #[inline(always)]
    fn from_raw(raw: u64) -> Self {
        raw
    }
}

/// A floating-point sample type the codec can process.
///
/// Implemented for `f32` and `f64`. The two implementations share all
/// algorithms downstream; keeping the association at the type level lets the
/// per-sample hot path monomorphize instead of branching on the width.
pub trait Sample: Copy + Default + Debug + 'static {
    /// Unsigned image type of the same width.
    type Bits: OrderedBits;

    /// Header tag for this width.
    const KIND: SampleKind;

    /// Total order-preserving bijection onto `Self::Bits`.
    fn forward(self) -> Self::Bits;

    /// Exact inverse of [`forward`](Self::forward).
    fn inverse(bits: Self::Bits) -> Self;

    /// Image of `+0.0`, used to seed unfilled predictor neighbors.
    #[inline]
    fn zero_bits() -> Self::Bits {
        Self::default().forward()
    }
}

impl Sample for f32 {
    type Bits = u32;

    const KIND: SampleKind = SampleKind::Float;

    #[inline(always)]
    fn forward(self) -> u32 {
        let bits = !self.to_bits();
        // If the sign bit survived the complement, flip the 31 bits below it.
        bits ^ (0u32.wrapping_sub(bits >> 31) >> 1)
    }

    #[inline(always)]
    fn inverse(bits: u32) -> f32 {
        let bits = bits ^ (0u32.wrapping_sub(bits >> 31) >> 1);
        f32::from_bits(!bits)
    }
}

impl Sample for f64 {
    type Bits = u64;

    const KIND: SampleKind = SampleKind::Double;

    #[inline(always)]
    fn forward(self) -> u64 {
        let bits = !self.to_bits();
        bits ^ (0u64.wrapping_sub(bits >> 63) >> 1)
    }

    #[inline(always)]
    fn inverse(bits: u64) -> f64 {
        let bits = bits ^ (0u64.wrapping_sub(bits >> 63) >> 1);
        f64::from_bits(!bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand_xoshiro::{
        rand_core::{RngCore, SeedableRng},
        Xoshiro256StarStar,
    };

    #[test]
    fn forward_is_bijective_f32() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for _ in 0..1_000_000 {
            // Round trips in both directions, NaN payloads included.
            let raw = rng.next_u32();
            assert_eq!(f32::inverse(f32::from_bits(raw).forward()).to_bits(), raw);
            let image = rng.next_u32();
            assert_eq!(f32::inverse(image).forward(), image);
        }
    }

    #[test]
    fn forward_is_bijective_f64() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(8);
        for _ in 0..1_000_000 {
            let raw = rng.next_u64();
            assert_eq!(f64::inverse(f64::from_bits(raw).forward()).to_bits(), raw);
            let image = rng.next_u64();
            assert_eq!(f64::inverse(image).forward(), image);
        }
    }

    #[test]
    fn forward_preserves_total_order_f32() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(9);
        let mut previous: Option<(f32, u32)> = None;
        let mut values: Vec<f32> = (0..10_000)
            .map(|_| f32::from_bits(rng.next_u32()))
            .filter(|v| !v.is_nan())
            .collect();
        values.extend_from_slice(&[
            f32::NEG_INFINITY,
            f32::MIN,
            -f32::MIN_POSITIVE,
            -0.0,
            0.0,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::INFINITY,
        ]);
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());

        for &value in &values {
            let image = value.forward();
            if let Some((prev, prev_image)) = previous {
                if prev < value {
                    assert!(prev_image < image, "{prev} -> {prev_image:#x} vs {value} -> {image:#x}");
                }
            }
            previous = Some((value, image));
        }
    }

    #[test]
    fn signed_zeros_are_adjacent_and_distinct() {
        let negative = (-0.0f32).forward();
        let positive = 0.0f32.forward();
        assert!(negative < positive);
        assert_eq!(positive, negative + 1);
        assert_eq!(f32::inverse(negative).to_bits(), 0x8000_0000u32);
        assert_eq!(f32::inverse(positive).to_bits(), 0);
        assert_eq!(f32::zero_bits(), positive);

        assert!((-0.0f64).forward() < 0.0f64.forward());
        assert_eq!(f64::inverse((-0.0f64).forward()).to_bits(), 0x8000_0000_0000_0000u64);
    }

    #[test]
    fn infinities_bound_the_finite_range() {
        let bottom = f64::NEG_INFINITY.forward();
        let top = f64::INFINITY.forward();
        for value in [-1e300f64, -1.0, -5e-324, 0.0, 5e-324, 1.0, 1e300] {
            let image = value.forward();
            assert!(bottom < image && image < top);
        }
    }
}
