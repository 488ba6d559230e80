//! Lossless compression of floating-point arrays in Rust.
//!
//! This crate compresses multi-dimensional arrays of IEEE 754 `f32` or `f64`
//! values so that decompression reproduces every input bit exactly: signed
//! zeros, subnormals, infinities and NaN payloads all survive the round trip.
//! On smooth scientific field data (simulation grids, volumetric scans) it
//! reaches compression ratios competitive with general-purpose coders while
//! running in a single streaming pass with bounded working memory.
//!
//! # Usage
//!
//! The whole-array entry points take a linear buffer together with its
//! extents; `nx` varies fastest, `nf` counts independent fields coded back to
//! back into one stream.
//!
//! ```
//! let samples: Vec<f32> = (0..64 * 64).map(|i| (i as f32 * 0.01).sin()).collect();
//!
//! let compressed = fpz::compress(&samples, 64, 64, 1, 1)?;
//! let restored = fpz::decompress_f32(&compressed)?;
//!
//! assert_eq!(samples, restored);
//! # Ok::<(), fpz::Error>(())
//! ```
//!
//! Lower arrays into the shape they physically have: a 2D grid as
//! `(nx, ny, 1, 1)`, a plain vector as `(n, 1, 1, 1)`. The prediction model
//! exploits every axis with extent above one.
//!
//! # How it works
//!
//! Each sample's bits are first carried through an order-preserving bijection
//! into an unsigned integer ([`map`]). A predictor estimates each integer from
//! the seven causal corner neighbors of its grid cell, kept in a small ring
//! buffer ([`front`]). The difference between estimate and truth is coded as
//! an adaptive class symbol plus raw mantissa bits ([`residual`]), and the
//! class symbols are squeezed by a carry-less range coder ([`range`]) under a
//! quasi-static frequency model ([`model`]). All of these layers are public:
//! they are useful building blocks for specialized codecs beyond the
//! container format provided here.
//!
//! # Errors
//!
//! Malformed input never panics and never yields partial output silently.
//! Argument problems ([`Error::ShapeMismatch`], [`Error::ZeroDimension`],
//! [`Error::ShapeOverflow`]) are detected before any coding begins; damaged
//! streams surface as [`Error::BadMagic`], [`Error::UnsupportedVersion`],
//! [`Error::UnknownTypeCode`], [`Error::TypeMismatch`] or
//! [`Error::UnexpectedEof`]. When coding through a fallible byte backend
//! (files, sockets), backend failures are kept apart from format failures by
//! [`CoderError`].

#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod backends;
pub mod container;
pub mod front;
pub mod map;
pub mod model;
pub mod range;
pub mod residual;

mod codec;

use core::convert::Infallible;
use core::fmt::{self, Display};

use backends::{Cursor, ReadBytes, WriteBytes};

pub use container::Header;
pub use map::{OrderedBits, Sample, SampleKind};

/// What went wrong, independent of any byte backend.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The product of the extents does not match the provided buffer length.
    ShapeMismatch {
        /// `nx * ny * nz * nf` as requested.
        expected: u64,
        /// Length of the sample buffer actually provided.
        provided: u64,
    },
    /// An extent was zero.
    ZeroDimension,
    /// The extents multiply out beyond what this platform can address.
    ShapeOverflow,
    /// The stream does not start with the format magic.
    BadMagic,
    /// The stream declares a format version this build cannot interpret.
    UnsupportedVersion(u16),
    /// The stream's sample type byte is not a known width.
    UnknownTypeCode(u8),
    /// The stream holds samples of a different width than requested.
    TypeMismatch {
        /// Width the caller asked to decode.
        expected: SampleKind,
        /// Width the header declares.
        found: SampleKind,
    },
    /// The stream ended before the declared sample count was coded.
    UnexpectedEof,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShapeMismatch { expected, provided } => write!(
                f,
                "extents call for {expected} samples but {provided} were provided"
            ),
            Error::ZeroDimension => write!(f, "every extent must be at least 1"),
            Error::ShapeOverflow => write!(f, "extents overflow the addressable sample count"),
            Error::BadMagic => write!(f, "not an fpz stream (bad magic)"),
            Error::UnsupportedVersion(version) => {
                write!(f, "unsupported format version {version}")
            }
            Error::UnknownTypeCode(code) => write!(f, "unknown sample type code {code}"),
            Error::TypeMismatch { expected, found } => write!(
                f,
                "stream holds {found:?} samples, caller asked for {expected:?}"
            ),
            Error::UnexpectedEof => write!(f, "stream ended before all samples were decoded"),
        }
    }
}

impl std::error::Error for Error {}

/// Error of a coding call through a fallible byte backend.
///
/// In-memory backends cannot fail, so their `BackendError` is
/// [`Infallible`](core::convert::Infallible) and the whole-buffer entry points
/// collapse this into a plain [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderError<BackendError> {
    /// The stream or the arguments are at fault; see [`Error`].
    Frontend(Error),
    /// The byte source or sink failed.
    Backend(BackendError),
}

impl<BackendError> From<Error> for CoderError<BackendError> {
    fn from(error: Error) -> Self {
        CoderError::Frontend(error)
    }
}

impl From<CoderError<Infallible>> for Error {
    fn from(error: CoderError<Infallible>) -> Self {
        match error {
            CoderError::Frontend(error) => error,
            CoderError::Backend(never) => match never {},
        }
    }
}

impl<BackendError: Display> Display for CoderError<BackendError> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoderError::Frontend(error) => Display::fmt(error, f),
            CoderError::Backend(error) => write!(f, "byte backend failed: {error}"),
        }
    }
}

impl<BackendError: std::error::Error + 'static> std::error::Error for CoderError<BackendError> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoderError::Frontend(error) => Some(error),
            CoderError::Backend(error) => Some(error),
        }
    }
}

/// Statically discharges the error path of operations that cannot fail.
pub trait UnwrapInfallible<T> {
    /// Like `unwrap`, but compiles away: the error type has no values.
    fn unwrap_infallible(self) -> T;
}

impl<T> UnwrapInfallible<T> for Result<T, Infallible> {
    #[inline(always)]
    fn unwrap_infallible(self) -> T {
        match self {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

/// Compresses `samples` with extents `(nx, ny, nz, nf)` into a fresh buffer.
///
/// `samples.len()` must equal `nx * ny * nz * nf`, with sample `(x, y, z, f)`
/// at index `x + nx*(y + ny*(z + nz*f))`. Returns the container stream:
/// 24-byte header followed by coded data.
pub fn compress<T: Sample>(
    samples: &[T],
    nx: u32,
    ny: u32,
    nz: u32,
    nf: u32,
) -> Result<Vec<u8>, Error> {
    let mut sink = Vec::new();
    compress_into(samples, nx, ny, nz, nf, &mut sink).map_err(Error::from)?;
    Ok(sink)
}

/// Like [`compress`], writing into any byte sink.
pub fn compress_into<T: Sample, B: WriteBytes>(
    samples: &[T],
    nx: u32,
    ny: u32,
    nz: u32,
    nf: u32,
    sink: &mut B,
) -> Result<(), CoderError<B::WriteError>> {
    let header = Header {
        kind: T::KIND,
        nx,
        ny,
        nz,
        nf,
    };
    let expected = header.checked_sample_count()?;
    if expected != samples.len() as u64 {
        return Err(Error::ShapeMismatch {
            expected,
            provided: samples.len() as u64,
        }
        .into());
    }
    header.write_to(sink).map_err(CoderError::Backend)?;
    codec::encode_stream(samples, &header, &mut *sink).map_err(CoderError::Backend)?;
    Ok(())
}

/// Decompresses a stream of `f32` samples.
///
/// Fails with [`Error::TypeMismatch`] if the stream holds `f64` data.
pub fn decompress_f32(bytes: &[u8]) -> Result<Vec<f32>, Error> {
    decompress(bytes)
}

/// Decompresses a stream of `f64` samples.
///
/// Fails with [`Error::TypeMismatch`] if the stream holds `f32` data.
pub fn decompress_f64(bytes: &[u8]) -> Result<Vec<f64>, Error> {
    decompress(bytes)
}

/// Decompresses a whole in-memory stream of `T` samples.
pub fn decompress<T: Sample>(bytes: &[u8]) -> Result<Vec<T>, Error> {
    decompress_from(&mut Cursor::new(bytes)).map_err(Error::from)
}

/// Like [`decompress`], reading from any byte source.
pub fn decompress_from<T: Sample, B: ReadBytes>(
    source: &mut B,
) -> Result<Vec<T>, CoderError<B::ReadError>> {
    let header = Header::read_from(source)?;
    if header.kind != T::KIND {
        return Err(Error::TypeMismatch {
            expected: T::KIND,
            found: header.kind,
        }
        .into());
    }
    codec::decode_stream(&mut *source, &header)
}

/// Parses and validates the container header without touching the payload.
pub fn read_header(bytes: &[u8]) -> Result<Header, Error> {
    Header::read_from(&mut Cursor::new(bytes)).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_is_caught_before_coding() {
        let samples = [1.0f32; 10];
        assert_eq!(
            compress(&samples, 3, 3, 1, 1),
            Err(Error::ShapeMismatch {
                expected: 9,
                provided: 10
            })
        );
        assert_eq!(compress(&samples, 10, 0, 1, 1), Err(Error::ZeroDimension));
        assert_eq!(
            compress(&samples, u32::MAX, u32::MAX, u32::MAX, 1),
            Err(Error::ShapeOverflow)
        );
    }

    #[test]
    fn decode_as_wrong_width_is_a_type_mismatch() {
        let compressed = compress(&[1.0f32, 2.0], 2, 1, 1, 1).unwrap();
        assert_eq!(
            decompress_f64(&compressed),
            Err(Error::TypeMismatch {
                expected: SampleKind::Double,
                found: SampleKind::Float,
            })
        );
        assert!(decompress_f32(&compressed).is_ok());
    }

    #[test]
    fn header_reports_the_written_shape() {
        let compressed = compress(&[0.5f64; 24], 4, 3, 2, 1).unwrap();
        let header = read_header(&compressed).unwrap();
        assert_eq!(
            header,
            Header {
                kind: SampleKind::Double,
                nx: 4,
                ny: 3,
                nz: 2,
                nf: 1
            }
        );
    }
}
