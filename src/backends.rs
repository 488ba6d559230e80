//! Sources and sinks of coded bytes
//!
//! The range coder reads and writes compressed data one byte at a time through a
//! generic backend type rather than through a hard-coded buffer. This keeps the
//! coder itself free of any I/O policy: encoding into a `Vec<u8>` is infallible,
//! while encoding straight into a file or socket surfaces the underlying
//! `std::io::Error` through the backend's associated error type.
//!
//! The two traits in this module are [`WriteBytes`] and [`ReadBytes`]. In-memory
//! backends (`Vec<u8>` for writing, [`Cursor`] for reading) use
//! [`Infallible`](core::convert::Infallible) as their error type, so callers that
//! stick to them can discard the error path statically (see
//! [`UnwrapInfallible`](crate::UnwrapInfallible)). The [`IoWrite`] and [`IoRead`]
//! adapters wrap any `std::io` stream; since the coder emits and consumes
//! individual bytes from its normalization loop, wrap files in a
//! `std::io::BufWriter`/`BufReader` (4 KiB or more) before handing them in.

use core::convert::Infallible;
use std::io;

/// A sink of coded bytes.
///
/// Implementations must accept every byte in the order given; the range coder
/// relies on the sink preserving the exact byte sequence.
pub trait WriteBytes {
    /// Error reported by the underlying sink. `Infallible` for in-memory sinks.
    type WriteError: core::fmt::Debug;

    /// Appends a single byte.
    fn write(&mut self, byte: u8) -> Result<(), Self::WriteError>;
}

impl WriteBytes for Vec<u8> {
    type WriteError = Infallible;

    #[inline(always)]
    fn write(&mut self, byte: u8) -> Result<(), Infallible> {
        self.push(byte);
        Ok(())
    }
}

impl<W: WriteBytes + ?Sized> WriteBytes for &mut W {
    type WriteError = W::WriteError;

    #[inline(always)]
    fn write(&mut self, byte: u8) -> Result<(), Self::WriteError> {
        (**self).write(byte)
    }
}

/// A source of coded bytes.
///
/// Exhaustion is not an error at this level: `read` returns `Ok(None)` once the
/// source runs dry, and the range decoder turns that into its sticky starvation
/// flag (see [`RangeDecoder::starved`](crate::range::RangeDecoder::starved)).
pub trait ReadBytes {
    /// Error reported by the underlying source. `Infallible` for in-memory
    /// sources.
    type ReadError: core::fmt::Debug;

    /// Returns the next byte, or `Ok(None)` at the end of the source.
    fn read(&mut self) -> Result<Option<u8>, Self::ReadError>;
}

impl<R: ReadBytes + ?Sized> ReadBytes for &mut R {
    type ReadError = R::ReadError;

    #[inline(always)]
    fn read(&mut self) -> Result<Option<u8>, Self::ReadError> {
        (**self).read()
    }
}

/// A [`ReadBytes`] over an in-memory buffer, advancing front to back.
///
/// Holds either owned or borrowed data; anything that derefs to `[u8]` works.
#[derive(Debug, Clone)]
pub struct Cursor<Buf> {
    buf: Buf,
    pos: usize,
}

impl<Buf: AsRef<[u8]>> Cursor<Buf> {
    /// Wraps `buf`, positioned at its first byte.
    pub fn new(buf: Buf) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Recovers the wrapped buffer.
    pub fn into_inner(self) -> Buf {
        self.buf
    }
}

impl<Buf: AsRef<[u8]>> ReadBytes for Cursor<Buf> {
    type ReadError = Infallible;

    #[inline(always)]
    fn read(&mut self) -> Result<Option<u8>, Infallible> {
        match self.buf.as_ref().get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }
}

/// Adapter that turns any `std::io::Write` into a [`WriteBytes`].
///
/// The coder writes single bytes; wrap slow sinks in a `std::io::BufWriter`.
#[derive(Debug)]
pub struct IoWrite<W: io::Write>(W);

impl<W: io::Write> IoWrite<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self(writer)
    }

    /// Recovers the wrapped writer. Flushing is the caller's responsibility.
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: io::Write> WriteBytes for IoWrite<W> {
    type WriteError = io::Error;

    #[inline]
    fn write(&mut self, byte: u8) -> Result<(), io::Error> {
        self.0.write_all(&[byte])
    }
}

/// Adapter that turns any `std::io::Read` into a [`ReadBytes`].
///
/// End of stream maps to `Ok(None)`; wrap slow sources in a
/// `std::io::BufReader`.
#[derive(Debug)]
pub struct IoRead<R: io::Read>(R);

impl<R: io::Read> IoRead<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self(reader)
    }

    /// Recovers the wrapped reader.
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: io::Read> ReadBytes for IoRead<R> {
    type ReadError = io::Error;

    #[inline]
    fn read(&mut self) -> Result<Option<u8>, io::Error> {
        let mut byte = [0u8; 1];
        loop {
            match self.0.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnwrapInfallible;

    #[test]
    fn cursor_reads_to_end() {
        let mut cursor = Cursor::new([1u8, 2, 3]);
        assert_eq!(cursor.read().unwrap_infallible(), Some(1));
        assert_eq!(cursor.read().unwrap_infallible(), Some(2));
        assert_eq!(cursor.read().unwrap_infallible(), Some(3));
        assert_eq!(cursor.read().unwrap_infallible(), None);
        // Stays exhausted.
        assert_eq!(cursor.read().unwrap_infallible(), None);
        assert_eq!(cursor.pos(), 3);
    }

    #[test]
    fn io_round_trip() {
        let mut sink = IoWrite::new(Vec::new());
        for byte in 0u8..100 {
            sink.write(byte).unwrap();
        }
        let written = sink.into_inner();

        let mut source = IoRead::new(io::Cursor::new(written));
        for byte in 0u8..100 {
            assert_eq!(source.read().unwrap(), Some(byte));
        }
        assert_eq!(source.read().unwrap(), None);
    }
}
