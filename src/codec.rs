//! Per-sample coding pipeline: traversal, prediction, residual coding
//!
//! Fields are traversed in row-major order (x innermost, z outermost). The
//! front is advanced by one virtual layer before the z loop and by one virtual
//! row or sample at the head of the y and x loops; this schedule is what makes
//! the seven relative corner offsets of [`Front`] line up with the causal
//! neighbors of the position about to be coded, with neighbors beyond a grid
//! boundary reading as the zero image.
//!
//! The prediction is the order-3 Lorenzo corner sum, computed with wrapping
//! unsigned arithmetic in the mapped domain. It reconstructs any signal that is
//! linear per axis exactly, which on smooth data leaves residuals a few bits
//! wide; on noise the residuals span the full sample width and the stream
//! degrades to roughly its raw size, never worse than the model's overhead.
//!
//! Across multiple fields the range coder and the residual model persist, so
//! later fields benefit from the statistics of earlier ones; the front is
//! rebuilt per field, fields do not predict into one another.

use crate::backends::{ReadBytes, WriteBytes};
use crate::container::Header;
use crate::front::Front;
use crate::map::{OrderedBits, Sample};
use crate::range::{RangeDecoder, RangeEncoder};
use crate::residual::{ResidualDecoder, ResidualEncoder};
use crate::{CoderError, Error};

/// Order-3 Lorenzo prediction from the seven coded corners of the current cell.
#[inline(always)]
fn lorenzo<U: OrderedBits>(front: &Front<U>) -> U {
    let mut p = front.at(1, 1, 1);
    p = p.wrapping_add(&front.at(1, 0, 0));
    p = p.wrapping_sub(&front.at(0, 1, 1));
    p = p.wrapping_add(&front.at(0, 1, 0));
    p = p.wrapping_sub(&front.at(1, 0, 1));
    p = p.wrapping_add(&front.at(0, 0, 1));
    p = p.wrapping_sub(&front.at(1, 1, 0));
    p
}

/// Encodes every field of `samples` and flushes the coder.
///
/// `samples.len()` must equal the header's sample count; the public entry
/// points validate this before any coding begins.
pub(crate) fn encode_stream<T: Sample, B: WriteBytes>(
    samples: &[T],
    header: &Header,
    sink: B,
) -> Result<B, B::WriteError> {
    let mut coder = RangeEncoder::new(sink);
    let mut residuals = ResidualEncoder::<T::Bits>::new();
    let field_len = header.nx as usize * header.ny as usize * header.nz as usize;
    debug_assert_eq!(samples.len(), field_len * header.nf as usize);
    for field in samples.chunks_exact(field_len) {
        encode_field(&mut coder, &mut residuals, field, header)?;
    }
    coder.finish()
}

fn encode_field<T: Sample, B: WriteBytes>(
    coder: &mut RangeEncoder<B>,
    residuals: &mut ResidualEncoder<T::Bits>,
    field: &[T],
    header: &Header,
) -> Result<(), B::WriteError> {
    let mut front = Front::new(header.nx as usize, header.ny as usize, T::zero_bits());
    let mut i = 0;
    front.advance(0, 0, 1);
    for _z in 0..header.nz {
        front.advance(0, 1, 0);
        for _y in 0..header.ny {
            front.advance(1, 0, 0);
            for _x in 0..header.nx {
                let predicted = lorenzo(&front);
                let actual = field[i].forward();
                i += 1;
                residuals.encode(coder, predicted, actual)?;
                front.push(actual);
            }
        }
    }
    Ok(())
}

/// Decodes every field described by `header` from `source`.
///
/// Produces exactly the expected sample count even on damaged input; only
/// afterwards does a starved coder surface as [`Error::UnexpectedEof`].
pub(crate) fn decode_stream<T: Sample, B: ReadBytes>(
    source: B,
    header: &Header,
) -> Result<Vec<T>, CoderError<B::ReadError>> {
    let count = header.checked_sample_count()? as usize;
    // Refuse shapes whose output buffer could not exist on this platform
    // before attempting the allocation.
    let byte_size = count.checked_mul(core::mem::size_of::<T>());
    if byte_size.map_or(true, |bytes| bytes > isize::MAX as usize) {
        return Err(Error::ShapeOverflow.into());
    }
    let mut coder = RangeDecoder::new(source).map_err(CoderError::Backend)?;
    let mut residuals = ResidualDecoder::<T::Bits>::new();
    let mut samples = Vec::with_capacity(count);
    for _field in 0..header.nf {
        decode_field(&mut coder, &mut residuals, &mut samples, header)
            .map_err(CoderError::Backend)?;
    }
    if coder.starved() {
        return Err(Error::UnexpectedEof.into());
    }
    Ok(samples)
}

fn decode_field<T: Sample, B: ReadBytes>(
    coder: &mut RangeDecoder<B>,
    residuals: &mut ResidualDecoder<T::Bits>,
    samples: &mut Vec<T>,
    header: &Header,
) -> Result<(), B::ReadError> {
    let mut front = Front::new(header.nx as usize, header.ny as usize, T::zero_bits());
    front.advance(0, 0, 1);
    for _z in 0..header.nz {
        front.advance(0, 1, 0);
        for _y in 0..header.ny {
            front.advance(1, 0, 0);
            for _x in 0..header.nx {
                let predicted = lorenzo(&front);
                let actual = residuals.decode(coder, predicted)?;
                samples.push(T::inverse(actual));
                front.push(actual);
            }
        }
    }
    Ok(())
}
