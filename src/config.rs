//! Session configuration and the static per-level tuning table.

use crate::error::DeflateError;

/// Largest supported window size exponent (32 KiB window).
pub const MAX_WINDOW_BITS: u8 = 15;

/// Smallest accepted window size exponent. 8 is promoted to 9.
pub const MIN_WINDOW_BITS: u8 = 8;

/// Largest memory level (hash table of `1 << 16` buckets).
pub const MAX_MEM_LEVEL: u8 = 9;

/// Memory level used when none is configured.
pub const DEFAULT_MEM_LEVEL: u8 = 8;

/// A compression level between 0 (store only) and 9 (best ratio).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Compression(u32);

impl Compression {
    /// Creates a level. Out of range values are rejected when the session is built.
    #[must_use]
    pub const fn new(level: u32) -> Self {
        Self(level)
    }

    /// Level 0: stored blocks only.
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// Level 1.
    #[must_use]
    pub const fn fast() -> Self {
        Self(1)
    }

    /// Level 9.
    #[must_use]
    pub const fn best() -> Self {
        Self(9)
    }

    #[must_use]
    pub const fn level(self) -> u32 {
        self.0
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self(6)
    }
}

/// Match-finding strategy.
///
/// The numeric order matters: everything from [`Strategy::HuffmanOnly`] on is
/// reported as "fastest" in the wrapper headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Strategy {
    /// Level table decides between greedy and lazy matching.
    #[default]
    Default = 0,
    /// Lazy matching that drops short matches, for data that is mostly small
    /// values with a somewhat random distribution.
    Filtered = 1,
    /// Literals only.
    HuffmanOnly = 2,
    /// Distance-one matches only.
    Rle = 3,
    /// Greedy matching written directly against the fixed Huffman code.
    Fixed = 4,
}

impl TryFrom<u8> for Strategy {
    type Error = DeflateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Default),
            1 => Ok(Self::Filtered),
            2 => Ok(Self::HuffmanOnly),
            3 => Ok(Self::Rle),
            4 => Ok(Self::Fixed),
            other => Err(DeflateError::InvalidStrategy(other)),
        }
    }
}

/// Container written around the raw block stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrapper {
    /// Bare RFC 1951 blocks.
    Raw,
    /// RFC 1950: 2-byte header, Adler-32 trailer.
    #[default]
    Zlib,
    /// RFC 1952: 10-byte header (plus optional fields), CRC-32 and length trailer.
    Gzip,
}

/// Flush request passed to each [`Deflater::deflate`](crate::Deflater::deflate) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Flush {
    /// Accumulate; emit blocks only when they fill.
    #[default]
    None = 0,
    /// Flush all input and pad with an empty fixed block.
    Partial = 1,
    /// Flush all input and align to a byte boundary with an empty stored block.
    Sync = 2,
    /// Like `Sync`, then forget all history.
    Full = 3,
    /// Drain everything, emit the final block and the trailer.
    Finish = 4,
    /// Finish the current block without any alignment.
    Block = 5,
}

impl Flush {
    /// Ordering used to reject flushes that cannot make progress.
    /// `Block` sits between `None` and `Partial`.
    pub(crate) const fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Block => 1,
            Self::Partial => 2,
            Self::Sync => 4,
            Self::Full => 6,
            Self::Finish => 8,
        }
    }
}

impl TryFrom<u8> for Flush {
    type Error = DeflateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Partial),
            2 => Ok(Self::Sync),
            3 => Ok(Self::Full),
            4 => Ok(Self::Finish),
            5 => Ok(Self::Block),
            other => Err(DeflateError::InvalidFlush(other)),
        }
    }
}

/// Block producer selected by the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockFn {
    Stored,
    Fast,
    Slow,
}

/// One row of the tuning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LevelParams {
    /// Halve the chain search once a match this long is known.
    pub good_length: u16,
    /// Lazy matcher: stop re-evaluating above this length.
    /// Greedy matcher: longest match whose interior is still hash-inserted.
    pub max_lazy: u16,
    /// Stop searching once a match this long is found.
    pub nice_length: u16,
    /// Hash-chain traversal cap.
    pub max_chain: u16,
    pub func: BlockFn,
}

const fn row(good: u16, lazy: u16, nice: u16, chain: u16, func: BlockFn) -> LevelParams {
    LevelParams {
        good_length: good,
        max_lazy: lazy,
        nice_length: nice,
        max_chain: chain,
        func,
    }
}

/// Tuning parameters for levels 0..=9. Shared read-only by every session.
pub(crate) static LEVEL_TABLE: [LevelParams; 10] = [
    row(0, 0, 0, 0, BlockFn::Stored),
    row(4, 4, 8, 4, BlockFn::Fast),
    row(4, 5, 16, 8, BlockFn::Fast),
    row(4, 6, 32, 32, BlockFn::Fast),
    row(4, 4, 16, 16, BlockFn::Slow),
    row(8, 16, 32, 32, BlockFn::Slow),
    row(8, 16, 128, 128, BlockFn::Slow),
    row(8, 32, 128, 256, BlockFn::Slow),
    row(32, 128, 258, 1024, BlockFn::Slow),
    row(32, 258, 258, 4096, BlockFn::Slow),
];

/// Builder for a [`Deflater`](crate::Deflater). Validated by `Deflater::new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateConfig {
    pub(crate) level: Compression,
    pub(crate) strategy: Strategy,
    pub(crate) window_bits: u8,
    pub(crate) mem_level: u8,
    pub(crate) wrapper: Wrapper,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DeflateConfig {
    /// Level 6, default strategy, 32 KiB window, memory level 8, zlib wrapper.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            level: Compression(6),
            strategy: Strategy::Default,
            window_bits: MAX_WINDOW_BITS,
            mem_level: DEFAULT_MEM_LEVEL,
            wrapper: Wrapper::Zlib,
        }
    }

    #[must_use]
    pub const fn level(mut self, level: Compression) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub const fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Window size exponent, 8..=15.
    #[must_use]
    pub const fn window_bits(mut self, bits: u8) -> Self {
        self.window_bits = bits;
        self
    }

    /// Hash table and symbol buffer sizing, 1..=9.
    #[must_use]
    pub const fn mem_level(mut self, level: u8) -> Self {
        self.mem_level = level;
        self
    }

    #[must_use]
    pub const fn wrapper(mut self, wrapper: Wrapper) -> Self {
        self.wrapper = wrapper;
        self
    }

    /// Checks ranges and applies the 8 → 9 window promotion.
    pub(crate) fn validated(self) -> Result<Self, DeflateError> {
        if self.level.0 > 9 {
            return Err(DeflateError::InvalidLevel(self.level.0));
        }
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&self.window_bits) {
            return Err(DeflateError::InvalidWindowBits(self.window_bits));
        }
        if !(1..=MAX_MEM_LEVEL).contains(&self.mem_level) {
            return Err(DeflateError::InvalidMemLevel(self.mem_level));
        }
        let mut cfg = self;
        if cfg.window_bits == MIN_WINDOW_BITS {
            cfg.window_bits = 9;
        }
        Ok(cfg)
    }

    /// True when the default window and hash sizes allow the tight bound.
    pub(crate) const fn has_default_sizes(&self) -> bool {
        self.window_bits == MAX_WINDOW_BITS && self.mem_level == DEFAULT_MEM_LEVEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_rank_places_block_below_partial() {
        assert!(Flush::None.rank() < Flush::Block.rank());
        assert!(Flush::Block.rank() < Flush::Partial.rank());
        assert!(Flush::Full.rank() < Flush::Finish.rank());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(Flush::try_from(6), Err(DeflateError::InvalidFlush(6)));
        assert_eq!(Strategy::try_from(5), Err(DeflateError::InvalidStrategy(5)));
        let cfg = DeflateConfig::new().level(Compression::new(10));
        assert_eq!(cfg.validated(), Err(DeflateError::InvalidLevel(10)));
        let cfg = DeflateConfig::new().window_bits(16);
        assert_eq!(cfg.validated(), Err(DeflateError::InvalidWindowBits(16)));
        let cfg = DeflateConfig::new().mem_level(0);
        assert_eq!(cfg.validated(), Err(DeflateError::InvalidMemLevel(0)));
    }

    #[test]
    fn window_bits_eight_is_promoted() {
        let cfg = DeflateConfig::new().window_bits(8).validated().unwrap();
        assert_eq!(cfg.window_bits, 9);
    }

    #[test]
    fn table_keeps_lazy_and_chain_minimums() {
        for params in &LEVEL_TABLE[1..] {
            assert!(params.max_lazy >= 4);
            assert!(params.max_chain >= 4);
        }
    }
}
