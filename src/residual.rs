//! Residual coding: signed prediction error as class symbol plus raw mantissa
//!
//! The difference between an actual mapped sample and its prediction is coded
//! in two parts. A single symbol drawn from the adaptive model carries the sign
//! and the order of magnitude: symbol `BIAS` means the prediction was exact,
//! `BIAS + 1 + k` means the sample overshot the prediction by some
//! `d` with `2^k <= d < 2^(k+1)`, and `BIAS - 1 - k` the same undershooting.
//! The remaining `k` bits of `d` (its leading one is implied by `k`) go out raw.
//!
//! Good predictions concentrate the statistical mass on the few symbols around
//! `BIAS`, which is exactly what the quasi-static model exploits; an `e`-bit
//! error costs about `e` raw bits plus a cheap class symbol, close to the
//! entropy of the exponentially distributed residuals that smooth data
//! produces. Pure noise degrades gracefully to roughly the sample width.

use core::marker::PhantomData;

use num_traits::AsPrimitive;

use crate::backends::{ReadBytes, WriteBytes};
use crate::map::OrderedBits;
use crate::model::QsModel;
use crate::range::{RangeDecoder, RangeEncoder};

/// Number of class symbols for a `W`-bit sample: exact, `W` overshoot classes,
/// `W` undershoot classes.
const fn alphabet_size(width: u32) -> usize {
    2 * width as usize + 1
}

/// Encoding half of the residual coder; owns the adaptive class model.
///
/// One instance persists across all fields of a stream so the model keeps the
/// statistics it has gathered.
#[derive(Debug)]
pub struct ResidualEncoder<U: OrderedBits> {
    model: QsModel,
    _bits: PhantomData<U>,
}

impl<U: OrderedBits> ResidualEncoder<U> {
    /// Class symbol meaning "prediction was exact".
    const BIAS: u32 = U::BITS;

    /// Creates an encoder with a cold model.
    pub fn new() -> Self {
        Self {
            model: QsModel::for_encoding(alphabet_size(U::BITS)),
            _bits: PhantomData,
        }
    }

    /// Codes `actual` against `predicted`.
    pub fn encode<B: WriteBytes>(
        &mut self,
        coder: &mut RangeEncoder<B>,
        predicted: U,
        actual: U,
    ) -> Result<(), B::WriteError> {
        if predicted < actual {
            let magnitude = actual - predicted;
            let k = U::BITS - 1 - magnitude.leading_zeros();
            coder.encode_symbol(Self::BIAS + 1 + k, &mut self.model)?;
            coder.encode_raw(magnitude.as_() - (1u64 << k), k)
        } else if predicted > actual {
            let magnitude = predicted - actual;
            let k = U::BITS - 1 - magnitude.leading_zeros();
            coder.encode_symbol(Self::BIAS - 1 - k, &mut self.model)?;
            coder.encode_raw(magnitude.as_() - (1u64 << k), k)
        } else {
            coder.encode_symbol(Self::BIAS, &mut self.model)
        }
    }
}

impl<U: OrderedBits> Default for ResidualEncoder<U> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoding half; drives a model identical to the encoder's through the same
/// symbol sequence.
#[derive(Debug)]
pub struct ResidualDecoder<U: OrderedBits> {
    model: QsModel,
    _bits: PhantomData<U>,
}

impl<U: OrderedBits> ResidualDecoder<U> {
    const BIAS: u32 = U::BITS;

    /// Creates a decoder with a cold model.
    pub fn new() -> Self {
        Self {
            model: QsModel::for_decoding(alphabet_size(U::BITS)),
            _bits: PhantomData,
        }
    }

    /// Recovers the sample coded against `predicted`.
    ///
    /// On corrupt input the reconstruction wraps rather than failing; the
    /// stream-level length check catches the damage.
    pub fn decode<B: ReadBytes>(
        &mut self,
        coder: &mut RangeDecoder<B>,
        predicted: U,
    ) -> Result<U, B::ReadError> {
        let symbol = coder.decode_symbol(&mut self.model)?;
        if symbol == Self::BIAS {
            return Ok(predicted);
        }
        let (k, undershoot) = if symbol > Self::BIAS {
            (symbol - Self::BIAS - 1, false)
        } else {
            (Self::BIAS - 1 - symbol, true)
        };
        let mantissa = coder.decode_raw(k)?;
        let magnitude = U::from_raw((1u64 << k).wrapping_add(mantissa));
        Ok(if undershoot {
            predicted.wrapping_sub(&magnitude)
        } else {
            predicted.wrapping_add(&magnitude)
        })
    }
}

impl<U: OrderedBits> Default for ResidualDecoder<U> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Cursor;
    use crate::UnwrapInfallible;

    use rand_xoshiro::{
        rand_core::{RngCore, SeedableRng},
        Xoshiro256StarStar,
    };

    fn round_trip_u32(pairs: &[(u32, u32)]) {
        let mut encoder = RangeEncoder::new(Vec::new());
        let mut residuals = ResidualEncoder::<u32>::new();
        for &(predicted, actual) in pairs {
            residuals.encode(&mut encoder, predicted, actual).unwrap_infallible();
        }
        let compressed = encoder.finish().unwrap_infallible();

        let mut decoder = RangeDecoder::new(Cursor::new(&compressed)).unwrap_infallible();
        let mut residuals = ResidualDecoder::<u32>::new();
        for &(predicted, actual) in pairs {
            assert_eq!(
                residuals.decode(&mut decoder, predicted).unwrap_infallible(),
                actual,
                "predicted {predicted:#x}, actual {actual:#x}"
            );
        }
        assert!(!decoder.starved());
    }

    #[test]
    fn extremes_round_trip() {
        round_trip_u32(&[
            (0, 0),
            (0, 1),
            (1, 0),
            (0, u32::MAX),
            (u32::MAX, 0),
            (u32::MAX, u32::MAX),
            (1 << 31, (1 << 31) - 1),
            (0x8000_0000, 0x8000_0001),
            (123, 123),
        ]);
    }

    #[test]
    fn random_pairs_round_trip() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(31);
        let pairs: Vec<(u32, u32)> = (0..20_000)
            .map(|_| {
                // Mostly near-misses, sometimes wild.
                let predicted = rng.next_u32();
                let actual = if rng.next_u32() % 4 == 0 {
                    rng.next_u32()
                } else {
                    predicted.wrapping_add(rng.next_u32() % 64).wrapping_sub(32)
                };
                (predicted, actual)
            })
            .collect();
        round_trip_u32(&pairs);
    }

    #[test]
    fn wide_magnitudes_round_trip_u64() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(32);
        let pairs: Vec<(u64, u64)> = (0..20_000)
            .map(|_| (rng.next_u64(), rng.next_u64()))
            .chain([(0, u64::MAX), (u64::MAX, 0), (0, 0), (1 << 63, (1 << 63) - 1)])
            .collect();

        let mut encoder = RangeEncoder::new(Vec::new());
        let mut residuals = ResidualEncoder::<u64>::new();
        for &(predicted, actual) in &pairs {
            residuals.encode(&mut encoder, predicted, actual).unwrap_infallible();
        }
        let compressed = encoder.finish().unwrap_infallible();

        let mut decoder = RangeDecoder::new(Cursor::new(&compressed)).unwrap_infallible();
        let mut residuals = ResidualDecoder::<u64>::new();
        for &(predicted, actual) in &pairs {
            assert_eq!(
                residuals.decode(&mut decoder, predicted).unwrap_infallible(),
                actual
            );
        }
        assert!(!decoder.starved());
    }

    #[test]
    fn exact_predictions_cost_almost_nothing() {
        let pairs = vec![(0xDEAD_BEEFu32, 0xDEAD_BEEFu32); 10_000];
        let mut encoder = RangeEncoder::new(Vec::new());
        let mut residuals = ResidualEncoder::<u32>::new();
        for &(predicted, actual) in &pairs {
            residuals.encode(&mut encoder, predicted, actual).unwrap_infallible();
        }
        let compressed = encoder.finish().unwrap_infallible();
        // Ten thousand exact hits shrink to well under a bit each.
        assert!(compressed.len() < 10_000 / 8);
    }
}
