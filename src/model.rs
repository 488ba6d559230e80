//! Quasi-static adaptive probability model
//!
//! An adaptive arithmetic coder needs a frequency estimate per symbol, but
//! rebuilding a cumulative table on every coded symbol is far too expensive.
//! The quasi-static compromise batches adaptation into *rescale epochs*: while
//! an epoch runs, the coder reads a frozen cumulative table `cumf` and only
//! accumulates pending per-symbol increments in `symf`; when the epoch's
//! countdown expires, the table is rebuilt in one sweep. The hot path is one
//! table read, one table write and a decrement.
//!
//! At every epoch boundary the frequencies satisfy
//! `sum(symf) == cumf[symbols] == 1 << bits` exactly. The rebuild halves every
//! pending frequency with the odd bit forced (`f/2 | 1`), which keeps every
//! symbol representable (`symf[i] >= 1`) through arbitrarily many rescales, and
//! redistributes the resulting deficit as a per-occurrence increment over the
//! next epoch. Epochs start tiny and double up to `period`, so the model adapts
//! fast on a cold stream and settles once statistics accumulate.
//!
//! Decoder-side models additionally keep a coarse `search` table that maps the
//! top seven bits of a cumulative-frequency query to a lower bound on the
//! symbol index, so a lookup is a short binary search instead of a scan over
//! the whole alphabet.

/// Resolution of the decoder-side first-stage lookup table.
const SEARCH_BITS: u32 = 7;

/// Frequencies adapting in rescale epochs under a frozen cumulative table.
///
/// The same type serves the encoder and the decoder; both sides must see the
/// identical sequence of symbols so that their tables evolve in lockstep. Only
/// models built with [`for_decoding`](QsModel::for_decoding) carry the search
/// table and may be used through [`DecoderModel`].
#[derive(Debug, Clone)]
pub struct QsModel {
    symbols: usize,
    /// log2 of the total frequency; the coder right-shifts `range` by this.
    bits: u32,
    target_rescale: u32,
    rescale: u32,
    /// Pending increment added to `symf` per coded symbol.
    incr: u32,
    /// Symbols left before the next call to `rebuild`.
    left: u32,
    /// Remainder of the deficit, spent as `incr + 1` at the end of the epoch.
    more: u32,
    /// Pending next-epoch frequencies; sums back to `1 << bits` at each rebuild.
    symf: Vec<u32>,
    /// Frozen cumulative table; `cumf[0] == 0`, `cumf[symbols] == 1 << bits`.
    cumf: Vec<u32>,
    /// Decoder only: `search[q >> (bits - SEARCH_BITS)]` lower-bounds the symbol.
    search: Vec<u32>,
}

impl QsModel {
    /// Default log2 total frequency.
    pub const DEFAULT_BITS: u32 = 16;
    /// Largest supported `bits`; the coder multiplies a frequency into a
    /// `range` already shifted right by `bits`, which must not overflow `u32`.
    pub const MAX_BITS: u32 = 16;
    /// Default target epoch length in coded symbols.
    pub const DEFAULT_PERIOD: u32 = 1 << 10;

    /// Encoder-side model over `symbols` symbols with default parameters.
    pub fn for_encoding(symbols: usize) -> Self {
        Self::with_params(symbols, Self::DEFAULT_BITS, Self::DEFAULT_PERIOD, false)
    }

    /// Decoder-side model; identical adaptation plus the search table.
    pub fn for_decoding(symbols: usize) -> Self {
        Self::with_params(symbols, Self::DEFAULT_BITS, Self::DEFAULT_PERIOD, true)
    }

    /// Model with explicit parameters.
    ///
    /// The parameters are part of any interchange format built on top: both
    /// ends must agree on them.
    ///
    /// # Panics
    ///
    /// Panics if the alphabet is empty or larger than `1 << bits`, if `bits`
    /// lies outside `7..=16`, or if `period` is zero.
    pub fn with_params(symbols: usize, bits: u32, period: u32, decode: bool) -> Self {
        assert!(symbols >= 1, "empty alphabet");
        assert!(
            (SEARCH_BITS..=Self::MAX_BITS).contains(&bits),
            "total frequency outside the supported range"
        );
        assert!(symbols <= 1 << bits, "alphabet larger than total frequency");
        assert!(period >= 1, "epoch length must be positive");

        let mut model = Self {
            symbols,
            bits,
            target_rescale: period,
            rescale: 0,
            incr: 0,
            left: 0,
            more: 0,
            symf: vec![0; symbols],
            cumf: vec![0; symbols + 1],
            search: if decode {
                vec![0; (1 << SEARCH_BITS) + 1]
            } else {
                Vec::new()
            },
        };
        if decode {
            // Sentinel: queries in the top bucket bound the search from above.
            model.search[1 << SEARCH_BITS] = symbols as u32 - 1;
        }
        model.reset();
        model
    }

    /// Restores the uniform startup distribution and a fresh epoch schedule.
    ///
    /// The codec never resets models between fields; this exists so a model
    /// instance can be reused across independent streams.
    pub fn reset(&mut self) {
        let total = self.total();
        let base = total / self.symbols as u32;
        let extra = (total % self.symbols as u32) as usize;
        for (i, freq) in self.symf.iter_mut().enumerate() {
            *freq = if i < extra { base + 1 } else { base };
        }
        self.cumf[self.symbols] = total;
        self.rescale = (self.symbols as u32 >> 4) | 2;
        self.incr = 0;
        self.left = 0;
        self.more = 0;
        self.rebuild();
    }

    /// Total frequency, `1 << bits`.
    #[inline]
    pub fn total(&self) -> u32 {
        1 << self.bits
    }

    /// Number of symbols in the alphabet.
    pub fn symbols(&self) -> usize {
        self.symbols
    }

    /// Registers one occurrence of `symbol`, rebuilding tables when the
    /// epoch's countdown expires.
    #[inline]
    fn touch(&mut self, symbol: usize) {
        if self.left == 0 {
            self.rebuild();
        }
        self.left -= 1;
        self.symf[symbol] += self.incr;
    }

    fn rebuild(&mut self) {
        if self.more > 0 {
            // The deficit did not divide evenly; spend the remainder at one
            // extra increment per symbol, then fall through next time.
            self.incr += 1;
            self.left = self.more;
            self.more = 0;
            return;
        }

        if self.rescale < self.target_rescale {
            self.rescale = (self.rescale << 1).min(self.target_rescale);
        }

        // One descending sweep: freeze the cumulative table from the pending
        // frequencies (which sum to `total` exactly here), then halve them with
        // the odd bit forced so no symbol ever drops to zero.
        let total = self.total();
        let mut cumulative = total;
        let mut deficit = total;
        for i in (0..self.symbols).rev() {
            let freq = self.symf[i];
            cumulative -= freq;
            self.cumf[i] = cumulative;
            let halved = (freq >> 1) | 1;
            deficit -= halved;
            self.symf[i] = halved;
        }
        debug_assert_eq!(cumulative, 0);

        // Hand the deficit back as increments over the coming epoch, so the
        // pending frequencies again sum to `total` at the next rebuild.
        self.incr = deficit / self.rescale;
        self.more = deficit % self.rescale;
        self.left = self.rescale - self.more;

        if !self.search.is_empty() {
            self.rebuild_search();
        }
    }

    /// Refills the first-stage lookup. Descending, so each bucket ends up with
    /// the smallest symbol index whose cumulative interval reaches it.
    fn rebuild_search(&mut self) {
        let shift = self.bits - SEARCH_BITS;
        let mut i = self.symbols;
        while i > 0 {
            let end = ((self.cumf[i] - 1) >> shift) as usize;
            i -= 1;
            let start = (self.cumf[i] >> shift) as usize;
            for slot in &mut self.search[start..=end] {
                *slot = i as u32;
            }
        }
    }

    /// Symbol whose cumulative interval contains `quantile`.
    ///
    /// Requires `quantile < total` and a decoder-side model.
    fn locate(&self, quantile: u32) -> usize {
        debug_assert!(
            !self.search.is_empty(),
            "symbol lookup on a model built for encoding"
        );
        let bucket = (quantile >> (self.bits - SEARCH_BITS)) as usize;
        let mut lo = self.search[bucket] as usize;
        let mut hi = self.search[bucket + 1] as usize + 1;
        while lo + 1 < hi {
            let mid = (lo + hi) >> 1;
            if quantile < self.cumf[mid] {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        lo
    }
}

/// Probability source for [`RangeEncoder::encode_symbol`].
///
/// [`RangeEncoder::encode_symbol`]: crate::range::RangeEncoder::encode_symbol
pub trait EncoderModel {
    /// log2 of the total frequency; the coder right-shifts `range` by this
    /// before scaling with the returned frequencies.
    fn freq_bits(&self) -> u32;

    /// Left cumulative and individual frequency of `symbol`, registering the
    /// occurrence for adaptation.
    fn left_cumulative_and_frequency(&mut self, symbol: u32) -> (u32, u32);
}

/// Probability source for [`RangeDecoder::decode_symbol`].
///
/// [`RangeDecoder::decode_symbol`]: crate::range::RangeDecoder::decode_symbol
pub trait DecoderModel {
    /// Must agree with the encoding side's [`EncoderModel::freq_bits`].
    fn freq_bits(&self) -> u32;

    /// `(symbol, left_cumulative, frequency)` of the symbol whose cumulative
    /// interval contains `quantile`, registering the occurrence. The caller
    /// guarantees `quantile < 1 << freq_bits()`.
    fn quantile_function(&mut self, quantile: u32) -> (u32, u32, u32);
}

impl EncoderModel for QsModel {
    #[inline]
    fn freq_bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn left_cumulative_and_frequency(&mut self, symbol: u32) -> (u32, u32) {
        let s = symbol as usize;
        let low = self.cumf[s];
        let freq = self.cumf[s + 1] - low;
        self.touch(s);
        (low, freq)
    }
}

impl DecoderModel for QsModel {
    #[inline]
    fn freq_bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn quantile_function(&mut self, quantile: u32) -> (u32, u32, u32) {
        let s = self.locate(quantile);
        let low = self.cumf[s];
        let freq = self.cumf[s + 1] - low;
        self.touch(s);
        (s as u32, low, freq)
    }
}
