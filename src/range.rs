//! Carry-less binary range coder over a byte stream
//!
//! An arithmetic coder keeps a shrinking interval `[low, low + range)` inside
//! the 32-bit space and narrows it by each coded event in proportion to the
//! event's probability; the compressed stream is any number inside the final
//! interval, emitted incrementally as its leading bytes settle. The variant
//! implemented here avoids carry propagation entirely: whenever the interval
//! gets too small without its leading byte settling, the interval is clipped to
//! `range = -low`, the largest span that keeps the already-emitted bytes final.
//! The clip costs a fraction of a bit on rare occasions and buys a normalization
//! loop with no carry bookkeeping at all.
//!
//! Three kinds of events can be coded: single bits, raw `n`-bit integers
//! (`n <= 64`, split into 16-bit pieces least-significant first), and symbols
//! under an adaptive probability model (see [`crate::model`]). Encoder and
//! decoder perform the same interval arithmetic on `(low, range)` in lockstep,
//! so the decoder consumes exactly the bytes the encoder emitted, in the same
//! normalization steps.
//!
//! The decoder never fails on malformed input: reads past the end of the source
//! yield zero bytes and latch a sticky [starvation flag](RangeDecoder::starved),
//! after which decoding continues deterministically (producing garbage symbols)
//! until the caller has the count it expected and checks the flag.

use crate::backends::{ReadBytes, WriteBytes};
use crate::model::{DecoderModel, EncoderModel};

/// Renormalization keeps `range` at or above this between operations.
const GRANULARITY: u32 = 1 << 16;

/// Raw-bit operations code at most this many bits per interval narrowing.
const CHUNK_BITS: u32 = 16;

/// Encoding half of the range coder, writing to a generic byte sink.
///
/// Dropping the encoder without calling [`finish`](Self::finish) loses the
/// tail of the stream; the final interval is only pinned down by the four
/// flush bytes.
#[derive(Debug)]
pub struct RangeEncoder<B: WriteBytes> {
    low: u32,
    /// Invariant: `range >= GRANULARITY` on entry to every operation.
    range: u32,
    sink: B,
}

impl<B: WriteBytes> RangeEncoder<B> {
    /// Creates an encoder over the full interval, writing to `sink`.
    pub fn new(sink: B) -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            sink,
        }
    }

    /// Codes a single bit in half the current interval.
    pub fn encode_bit(&mut self, bit: bool) -> Result<(), B::WriteError> {
        self.range >>= 1;
        if bit {
            self.low = self.low.wrapping_add(self.range);
        }
        self.normalize()
    }

    /// Codes `value` as a raw `bits`-bit integer, `bits <= 64`.
    ///
    /// Wider than [`CHUNK_BITS`] values go out in 16-bit pieces, least
    /// significant first, so the decoder can reassemble without knowing the
    /// total width up front.
    pub fn encode_raw(&mut self, value: u64, bits: u32) -> Result<(), B::WriteError> {
        debug_assert!(bits <= 64);
        debug_assert!(bits == 64 || value >> bits == 0, "value wider than bits");
        let mut value = value;
        let mut bits = bits;
        while bits > CHUNK_BITS {
            self.shift(value as u32 & 0xFFFF, CHUNK_BITS)?;
            value >>= CHUNK_BITS;
            bits -= CHUNK_BITS;
        }
        self.shift(value as u32, bits)
    }

    /// Codes `symbol` with the frequencies the model currently assigns to it.
    ///
    /// The decoding side must drive an identical model through the identical
    /// symbol sequence; adaptation happens inside the model on both ends.
    pub fn encode_symbol<M: EncoderModel>(
        &mut self,
        symbol: u32,
        model: &mut M,
    ) -> Result<(), B::WriteError> {
        let (low_cum, freq) = model.left_cumulative_and_frequency(symbol);
        self.range >>= model.freq_bits();
        self.low = self.low.wrapping_add(self.range.wrapping_mul(low_cum));
        self.range = self.range.wrapping_mul(freq);
        self.normalize()
    }

    /// Flushes four bytes that pin the final code value and returns the sink.
    pub fn finish(mut self) -> Result<B, B::WriteError> {
        self.put(4)?;
        Ok(self.sink)
    }

    /// Narrows by a power of two: `value` in `bits <= 16` bits.
    fn shift(&mut self, value: u32, bits: u32) -> Result<(), B::WriteError> {
        debug_assert!(bits <= CHUNK_BITS);
        self.range >>= bits;
        self.low = self.low.wrapping_add(self.range.wrapping_mul(value));
        self.normalize()
    }

    /// Emits the top `count` bytes of `low`.
    fn put(&mut self, count: u32) -> Result<(), B::WriteError> {
        for _ in 0..count {
            self.sink.write((self.low >> 24) as u8)?;
            self.low <<= 8;
        }
        Ok(())
    }

    fn normalize(&mut self) -> Result<(), B::WriteError> {
        // While the top byte of the interval is settled, ship it out.
        while (self.low ^ self.low.wrapping_add(self.range)) >> 24 == 0 {
            self.put(1)?;
            self.range <<= 8;
        }
        // Interval too small but its top byte still straddles a boundary:
        // force two bytes out and clip the interval to the largest span that
        // keeps them final. `low` has its bottom 16 bits clear here and is
        // nonzero, so the new range is at least GRANULARITY.
        if self.range < GRANULARITY {
            self.put(2)?;
            self.range = self.low.wrapping_neg();
        }
        Ok(())
    }
}

/// Decoding half of the range coder, reading from a generic byte source.
#[derive(Debug)]
pub struct RangeDecoder<B: ReadBytes> {
    low: u32,
    range: u32,
    /// The true code value's 32-bit window; always in `[low, low + range)`
    /// for well-formed input.
    code: u32,
    source: B,
    starved: bool,
}

impl<B: ReadBytes> RangeDecoder<B> {
    /// Creates a decoder, priming the code window from the first four bytes.
    pub fn new(source: B) -> Result<Self, B::ReadError> {
        let mut decoder = Self {
            low: 0,
            range: u32::MAX,
            code: 0,
            source,
            starved: false,
        };
        for _ in 0..4 {
            decoder.code = decoder.code << 8 | decoder.next_byte()? as u32;
        }
        Ok(decoder)
    }

    /// Mirror of [`RangeEncoder::encode_bit`].
    pub fn decode_bit(&mut self) -> Result<bool, B::ReadError> {
        self.range >>= 1;
        let bit = self.code.wrapping_sub(self.low) >= self.range;
        if bit {
            self.low = self.low.wrapping_add(self.range);
        }
        self.normalize()?;
        Ok(bit)
    }

    /// Mirror of [`RangeEncoder::encode_raw`].
    pub fn decode_raw(&mut self, bits: u32) -> Result<u64, B::ReadError> {
        debug_assert!(bits <= 64);
        let mut value = 0u64;
        let mut consumed = 0;
        let mut bits = bits;
        while bits > CHUNK_BITS {
            value |= (self.shift(CHUNK_BITS)? as u64) << consumed;
            consumed += CHUNK_BITS;
            bits -= CHUNK_BITS;
        }
        value |= (self.shift(bits)? as u64) << consumed;
        Ok(value)
    }

    /// Mirror of [`RangeEncoder::encode_symbol`].
    pub fn decode_symbol<M: DecoderModel>(&mut self, model: &mut M) -> Result<u32, B::ReadError> {
        self.range >>= model.freq_bits();
        let quantile = self.code.wrapping_sub(self.low) / self.range;
        // A well-formed stream always lands below the total (the encoder
        // confines the code inside each symbol's cumulative interval); corrupt
        // input may not, and must not reach out of the model's tables.
        let quantile = quantile.min((1 << model.freq_bits()) - 1);
        let (symbol, low_cum, freq) = model.quantile_function(quantile);
        self.low = self.low.wrapping_add(self.range.wrapping_mul(low_cum));
        self.range = self.range.wrapping_mul(freq);
        self.normalize()?;
        Ok(symbol)
    }

    /// True once any read went past the end of the source.
    ///
    /// The flag is sticky. Callers decode the number of symbols they expect
    /// and then consult it; a set flag means the stream was truncated and the
    /// decoded tail is garbage.
    pub fn starved(&self) -> bool {
        self.starved
    }

    /// Returns the byte source.
    pub fn into_source(self) -> B {
        self.source
    }

    fn shift(&mut self, bits: u32) -> Result<u32, B::ReadError> {
        debug_assert!(bits <= CHUNK_BITS);
        self.range >>= bits;
        let value = self.code.wrapping_sub(self.low) / self.range;
        self.low = self.low.wrapping_add(self.range.wrapping_mul(value));
        self.normalize()?;
        Ok(value)
    }

    fn next_byte(&mut self) -> Result<u8, B::ReadError> {
        match self.source.read()? {
            Some(byte) => Ok(byte),
            None => {
                self.starved = true;
                Ok(0)
            }
        }
    }

    /// Pulls `count` bytes into the code window; the mirror of the encoder's
    /// `put`.
    fn consume(&mut self, count: u32) -> Result<(), B::ReadError> {
        for _ in 0..count {
            self.code = self.code << 8 | self.next_byte()? as u32;
            self.low <<= 8;
        }
        Ok(())
    }

    fn normalize(&mut self) -> Result<(), B::ReadError> {
        while (self.low ^ self.low.wrapping_add(self.range)) >> 24 == 0 {
            self.consume(1)?;
            self.range <<= 8;
        }
        if self.range < GRANULARITY {
            self.consume(2)?;
            self.range = self.low.wrapping_neg();
        }
        Ok(())
    }
}
