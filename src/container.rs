//! Container framing: fixed header ahead of the coded byte stream
//!
//! A stream is a 24-byte little-endian header followed immediately by the
//! range coder's output (which ends with its 4-byte flush). The header layout:
//!
//! | offset | size | field    | value                         |
//! |--------|------|----------|-------------------------------|
//! | 0      | 4    | magic    | `0x007A7066` (`"fpz\0"`)      |
//! | 4      | 2    | version  | `1`                           |
//! | 6      | 1    | type     | 0 = `f32`, 1 = `f64`          |
//! | 7      | 1    | reserved | 0                             |
//! | 8      | 4    | nx       | at least 1                    |
//! | 12     | 4    | ny       | at least 1                    |
//! | 16     | 4    | nz       | at least 1                    |
//! | 20     | 4    | nf       | at least 1                    |
//!
//! Validation on read is strict: an unknown version is rejected even if it is
//! numerically higher than the current one, since the coded stream behind it
//! cannot be interpreted. Bytes after the coder's flush are ignored.

use byteorder::{ByteOrder, LittleEndian};

use crate::backends::{ReadBytes, WriteBytes};
use crate::map::SampleKind;
use crate::{CoderError, Error};

/// `"fpz\0"` read as a little-endian `u32`.
pub const MAGIC: u32 = 0x007A_7066;

/// Current (and only accepted) format version.
pub const VERSION: u16 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 24;

/// Parsed container header.
///
/// `nx` varies fastest in the sample layout and `nf` counts whole fields:
/// sample `(x, y, z, f)` lives at index `x + nx*(y + ny*(z + nz*f))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Sample width of the payload.
    pub kind: SampleKind,
    /// Extent along x.
    pub nx: u32,
    /// Extent along y.
    pub ny: u32,
    /// Extent along z.
    pub nz: u32,
    /// Number of fields coded back to back.
    pub nf: u32,
}

impl Header {
    /// Total number of samples, guarding against zero extents and overflow.
    pub fn checked_sample_count(&self) -> Result<u64, Error> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 || self.nf == 0 {
            return Err(Error::ZeroDimension);
        }
        let count = (self.nx as u64 * self.ny as u64)
            .checked_mul(self.nz as u64)
            .and_then(|c| c.checked_mul(self.nf as u64))
            .ok_or(Error::ShapeOverflow)?;
        if usize::try_from(count).is_err() {
            return Err(Error::ShapeOverflow);
        }
        Ok(count)
    }

    /// Serializes the fixed header into `sink`.
    pub fn write_to<B: WriteBytes>(&self, sink: &mut B) -> Result<(), B::WriteError> {
        let mut raw = [0u8; HEADER_LEN];
        LittleEndian::write_u32(&mut raw[0..4], MAGIC);
        LittleEndian::write_u16(&mut raw[4..6], VERSION);
        raw[6] = self.kind.code();
        raw[7] = 0;
        LittleEndian::write_u32(&mut raw[8..12], self.nx);
        LittleEndian::write_u32(&mut raw[12..16], self.ny);
        LittleEndian::write_u32(&mut raw[16..20], self.nz);
        LittleEndian::write_u32(&mut raw[20..24], self.nf);
        for &byte in &raw {
            sink.write(byte)?;
        }
        Ok(())
    }

    /// Reads and validates the fixed header from `source`.
    pub fn read_from<B: ReadBytes>(source: &mut B) -> Result<Self, CoderError<B::ReadError>> {
        let mut raw = [0u8; HEADER_LEN];
        for slot in &mut raw {
            *slot = source
                .read()
                .map_err(CoderError::Backend)?
                .ok_or(CoderError::Frontend(Error::UnexpectedEof))?;
        }

        if LittleEndian::read_u32(&raw[0..4]) != MAGIC {
            return Err(Error::BadMagic.into());
        }
        let version = LittleEndian::read_u16(&raw[4..6]);
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version).into());
        }
        let kind = SampleKind::from_code(raw[6]).ok_or(Error::UnknownTypeCode(raw[6]))?;

        let header = Header {
            kind,
            nx: LittleEndian::read_u32(&raw[8..12]),
            ny: LittleEndian::read_u32(&raw[12..16]),
            nz: LittleEndian::read_u32(&raw[16..20]),
            nf: LittleEndian::read_u32(&raw[20..24]),
        };
        header.checked_sample_count()?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Cursor;
    use crate::UnwrapInfallible;

    fn header() -> Header {
        Header {
            kind: SampleKind::Double,
            nx: 33,
            ny: 17,
            nz: 9,
            nf: 2,
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut raw = Vec::new();
        header().write_to(&mut raw).unwrap_infallible();
        assert_eq!(raw.len(), HEADER_LEN);
        assert_eq!(&raw[0..4], &[0x66, 0x70, 0x7A, 0x00]);

        let parsed = Header::read_from(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(parsed, header());
        assert_eq!(parsed.checked_sample_count().unwrap(), 33 * 17 * 9 * 2);
    }

    #[test]
    fn rejects_damaged_magic() {
        for position in 0..4 {
            let mut raw = Vec::new();
            header().write_to(&mut raw).unwrap_infallible();
            raw[position] ^= 0x40;
            let result = Header::read_from(&mut Cursor::new(&raw));
            assert_eq!(result, Err(CoderError::Frontend(Error::BadMagic)));
        }
    }

    #[test]
    fn rejects_future_and_past_versions() {
        for version in [0u16, 2, 0x7FFF] {
            let mut raw = Vec::new();
            header().write_to(&mut raw).unwrap_infallible();
            raw[4] = version as u8;
            raw[5] = (version >> 8) as u8;
            assert_eq!(
                Header::read_from(&mut Cursor::new(&raw)),
                Err(CoderError::Frontend(Error::UnsupportedVersion(version)))
            );
        }
    }

    #[test]
    fn rejects_unknown_type_and_zero_extent() {
        let mut raw = Vec::new();
        header().write_to(&mut raw).unwrap_infallible();
        raw[6] = 9;
        assert_eq!(
            Header::read_from(&mut Cursor::new(&raw)),
            Err(CoderError::Frontend(Error::UnknownTypeCode(9)))
        );

        let mut raw = Vec::new();
        header().write_to(&mut raw).unwrap_infallible();
        raw[12..16].fill(0); // ny = 0
        assert_eq!(
            Header::read_from(&mut Cursor::new(&raw)),
            Err(CoderError::Frontend(Error::ZeroDimension))
        );
    }

    #[test]
    fn short_input_is_eof() {
        let mut raw = Vec::new();
        header().write_to(&mut raw).unwrap_infallible();
        raw.truncate(10);
        assert_eq!(
            Header::read_from(&mut Cursor::new(&raw)),
            Err(CoderError::Frontend(Error::UnexpectedEof))
        );
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let huge = Header {
            kind: SampleKind::Float,
            nx: u32::MAX,
            ny: u32::MAX,
            nz: u32::MAX,
            nf: u32::MAX,
        };
        assert_eq!(huge.checked_sample_count(), Err(Error::ShapeOverflow));
    }
}
