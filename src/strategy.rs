//! Block producers.
//!
//! Each producer consumes lookahead, feeds literals and matches to the
//! [`BlockWriter`] and reports where it stopped. Blocks are emitted as the
//! symbol buffer fills and once more at a flush.

use crate::config::{BlockFn, Flush, LEVEL_TABLE, Strategy};
use crate::cursor::{Io, OutputCursor};
use crate::engine::Engine;
use crate::hash_chain::NIL;
use crate::matcher::common_prefix_len;
use crate::trees::BlockWriter;
use crate::window::{HASH_PREFIX, MAX_MATCH, MIN_LOOKAHEAD};

/// Filtered strategy: matches this short or shorter are dropped.
const FILTERED_MAX: usize = 5;

/// Pending headroom the fixed-code path keeps before writing a symbol.
const QUICK_MARGIN: usize = 16;

/// Where a producer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockState {
    /// Out of input (or output) before the requested flush point.
    NeedMore,
    /// Flush point reached; the stream adds any alignment.
    BlockDone,
    /// The final block is written but not yet fully delivered.
    FinishStarted,
    /// The final block is written and delivered.
    FinishDone,
}

/// The block producer for a level and strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Producer {
    Stored,
    Fast,
    Slow { filtered: bool },
    Rle,
    Huffman,
    Quick,
}

impl Producer {
    pub(crate) fn select(level: u32, strategy: Strategy) -> Self {
        if level == 0 {
            return Self::Stored;
        }
        match strategy {
            Strategy::HuffmanOnly => Self::Huffman,
            Strategy::Rle => Self::Rle,
            Strategy::Fixed => Self::Quick,
            Strategy::Default | Strategy::Filtered => match LEVEL_TABLE[level as usize].func {
                BlockFn::Stored => Self::Stored,
                BlockFn::Fast => Self::Fast,
                BlockFn::Slow => Self::Slow {
                    filtered: strategy == Strategy::Filtered,
                },
            },
        }
    }
}

/// Runs `producer` until it needs more input or output, or reaches the flush point.
pub(crate) fn run(
    producer: Producer,
    e: &mut Engine,
    coder: &mut BlockWriter,
    io: &mut Io<'_, '_>,
    flush: Flush,
) -> BlockState {
    match producer {
        Producer::Stored => deflate_stored(e, coder, io, flush),
        Producer::Fast => deflate_fast(e, coder, io, flush),
        Producer::Slow { filtered } => deflate_slow(e, coder, io, flush, filtered),
        Producer::Rle => deflate_rle(e, coder, io, flush),
        Producer::Huffman => deflate_huff(e, coder, io, flush),
        Producer::Quick => deflate_quick(e, coder, io, flush),
    }
}

/// Closes the current block and moves as much as possible to the output.
/// Returns false once the output is full.
fn emit_block(e: &mut Engine, coder: &mut BlockWriter, output: &mut OutputCursor<'_>, last: bool) -> bool {
    coder.flush_block(e.block_bytes(), e.block_len(), last);
    e.block_start = e.strstart as isize;
    coder.flush_pending(output);
    !output.is_full()
}

/// Common end of a producer once the lookahead is drained at a flush.
fn finish_tail(
    e: &mut Engine,
    coder: &mut BlockWriter,
    output: &mut OutputCursor<'_>,
    flush: Flush,
    has_data: bool,
) -> BlockState {
    if flush == Flush::Finish {
        return if emit_block(e, coder, output, true) {
            BlockState::FinishDone
        } else {
            BlockState::FinishStarted
        };
    }
    if has_data && !emit_block(e, coder, output, false) {
        return BlockState::NeedMore;
    }
    BlockState::BlockDone
}

/// Level 0: raw bytes in stored blocks, no hashing.
///
/// Every block but the one closed by a flush holds exactly `max_block` bytes,
/// so block boundaries do not depend on how the input was split. Capping the
/// block at `max_dist` keeps its start inside the window across a slide.
fn deflate_stored(e: &mut Engine, coder: &mut BlockWriter, io: &mut Io<'_, '_>, flush: Flush) -> BlockState {
    let max_block = stored_block_size(e, coder);

    loop {
        if e.lookahead == 0 {
            e.fill_window(&mut io.input);
            if e.lookahead == 0 {
                if flush == Flush::None {
                    return BlockState::NeedMore;
                }
                break;
            }
        }

        let room = max_block - e.block_len();
        let take = e.lookahead.min(room);
        e.strstart += take;
        e.lookahead -= take;

        if e.block_len() == max_block && !emit_block(e, coder, &mut io.output, false) {
            return BlockState::NeedMore;
        }
    }

    e.insert = 0;
    let has_data = e.strstart as isize > e.block_start;
    finish_tail(e, coder, &mut io.output, flush, has_data)
}

/// Size of every stored block that is not cut short by a flush.
fn stored_block_size(e: &Engine, coder: &BlockWriter) -> usize {
    0xffff.min(coder.pending_cap() - 5).min(e.max_dist())
}

/// Greedy matching. Matches longer than `max_lazy` skip hashing their interior.
fn deflate_fast(e: &mut Engine, coder: &mut BlockWriter, io: &mut Io<'_, '_>, flush: Flush) -> BlockState {
    loop {
        if e.lookahead < MIN_LOOKAHEAD {
            e.fill_window(&mut io.input);
            if e.lookahead < MIN_LOOKAHEAD && flush == Flush::None {
                return BlockState::NeedMore;
            }
            if e.lookahead == 0 {
                break;
            }
        }

        let head = if e.lookahead >= HASH_PREFIX {
            e.insert_string(e.strstart)
        } else {
            usize::from(NIL)
        };

        let mut match_len = 0;
        if e.in_range(head) {
            let found = e.longest_match(head, HASH_PREFIX - 1);
            if let Some(start) = found.start {
                e.match_start = start;
                match_len = found.len;
            }
        }

        let full = if match_len >= HASH_PREFIX {
            let full = coder.tally_dist(e.strstart - e.match_start, match_len);
            e.lookahead -= match_len;
            if match_len <= e.tuning.max_lazy && e.lookahead >= HASH_PREFIX {
                e.bulk_insert(e.strstart + 1, match_len - 1);
            }
            e.strstart += match_len;
            full
        } else {
            let full = coder.tally_lit(e.window.bytes()[e.strstart]);
            e.lookahead -= 1;
            e.strstart += 1;
            full
        };

        if full && !emit_block(e, coder, &mut io.output, false) {
            return BlockState::NeedMore;
        }
    }

    e.insert = e.strstart.min(HASH_PREFIX - 1);
    let has_data = coder.has_symbols();
    finish_tail(e, coder, &mut io.output, flush, has_data)
}

/// Lazy matching: a match is only committed once the next position fails
/// to beat it.
fn deflate_slow(
    e: &mut Engine,
    coder: &mut BlockWriter,
    io: &mut Io<'_, '_>,
    flush: Flush,
    filtered: bool,
) -> BlockState {
    loop {
        if e.lookahead < MIN_LOOKAHEAD {
            e.fill_window(&mut io.input);
            if e.lookahead < MIN_LOOKAHEAD && flush == Flush::None {
                return BlockState::NeedMore;
            }
            if e.lookahead == 0 {
                break;
            }
        }

        let head = if e.lookahead >= HASH_PREFIX {
            e.insert_string(e.strstart)
        } else {
            usize::from(NIL)
        };

        e.prev_length = e.match_length;
        e.prev_match = e.match_start;
        e.match_length = HASH_PREFIX - 1;

        if e.in_range(head) && e.prev_length < e.tuning.max_lazy {
            let found = e.longest_match(head, e.prev_length);
            if let Some(start) = found.start {
                e.match_start = start;
                e.match_length = found.len;
            }
            if filtered && e.match_length <= FILTERED_MAX {
                e.match_length = HASH_PREFIX - 1;
            }
        }

        if e.prev_length >= HASH_PREFIX && e.match_length <= e.prev_length {
            // The previous match wins. Its first byte sits at strstart - 1.
            let max_insert = (e.strstart + e.lookahead).saturating_sub(HASH_PREFIX);
            let full = coder.tally_dist((e.strstart - 1).wrapping_sub(e.prev_match), e.prev_length);

            e.lookahead -= e.prev_length - 1;
            let mov_fwd = e.prev_length - 2;
            let insert_cnt = mov_fwd.min(max_insert.saturating_sub(e.strstart));
            e.bulk_insert(e.strstart + 1, insert_cnt);

            e.prev_length = 0;
            e.match_available = false;
            e.match_length = HASH_PREFIX - 1;
            e.strstart += mov_fwd + 1;

            if full && !emit_block(e, coder, &mut io.output, false) {
                return BlockState::NeedMore;
            }
        } else if e.match_available {
            // No better match here: the previous byte goes out as a literal.
            if coder.tally_lit(e.window.bytes()[e.strstart - 1]) {
                emit_block(e, coder, &mut io.output, false);
            }
            e.strstart += 1;
            e.lookahead -= 1;
            if io.output.is_full() {
                return BlockState::NeedMore;
            }
        } else {
            e.match_available = true;
            e.strstart += 1;
            e.lookahead -= 1;
        }
    }

    if e.match_available {
        coder.tally_lit(e.window.bytes()[e.strstart - 1]);
        e.match_available = false;
    }
    e.insert = e.strstart.min(HASH_PREFIX - 1);
    let has_data = coder.has_symbols();
    finish_tail(e, coder, &mut io.output, flush, has_data)
}

/// Distance-one runs only; the hash chains are never touched.
fn deflate_rle(e: &mut Engine, coder: &mut BlockWriter, io: &mut Io<'_, '_>, flush: Flush) -> BlockState {
    loop {
        if e.lookahead <= MAX_MATCH {
            e.fill_window(&mut io.input);
            if e.lookahead <= MAX_MATCH && flush == Flush::None {
                return BlockState::NeedMore;
            }
            if e.lookahead == 0 {
                break;
            }
        }

        let mut run = 0;
        if e.lookahead >= HASH_PREFIX && e.strstart > 0 {
            let window = e.window.bytes();
            let prev = window[e.strstart - 1];
            let limit = e.lookahead.min(MAX_MATCH);
            run = window[e.strstart..e.strstart + limit]
                .iter()
                .take_while(|&&byte| byte == prev)
                .count();
        }

        let full = if run >= HASH_PREFIX {
            let full = coder.tally_dist(1, run);
            e.lookahead -= run;
            e.strstart += run;
            full
        } else {
            let full = coder.tally_lit(e.window.bytes()[e.strstart]);
            e.lookahead -= 1;
            e.strstart += 1;
            full
        };
        e.match_length = 0;

        if full && !emit_block(e, coder, &mut io.output, false) {
            return BlockState::NeedMore;
        }
    }

    e.insert = 0;
    let has_data = coder.has_symbols();
    finish_tail(e, coder, &mut io.output, flush, has_data)
}

/// Literals only.
fn deflate_huff(e: &mut Engine, coder: &mut BlockWriter, io: &mut Io<'_, '_>, flush: Flush) -> BlockState {
    loop {
        if e.lookahead == 0 {
            e.fill_window(&mut io.input);
            if e.lookahead == 0 {
                if flush == Flush::None {
                    return BlockState::NeedMore;
                }
                break;
            }
        }

        let full = coder.tally_lit(e.window.bytes()[e.strstart]);
        e.lookahead -= 1;
        e.strstart += 1;
        if full && !emit_block(e, coder, &mut io.output, false) {
            return BlockState::NeedMore;
        }
    }

    e.insert = 0;
    let has_data = coder.has_symbols();
    finish_tail(e, coder, &mut io.output, flush, has_data)
}

/// Greedy matching written straight to an open fixed-code block.
///
/// Only the most recent position per hash is kept and only the first
/// candidate is compared. The block stays open across calls without a flush.
fn deflate_quick(e: &mut Engine, coder: &mut BlockWriter, io: &mut Io<'_, '_>, flush: Flush) -> BlockState {
    loop {
        if coder.pending_len() + QUICK_MARGIN >= coder.pending_cap() {
            coder.flush_pending(&mut io.output);
            if io.output.is_full() {
                return BlockState::NeedMore;
            }
        }

        if e.lookahead < MIN_LOOKAHEAD {
            e.fill_window(&mut io.input);
            if e.lookahead < MIN_LOOKAHEAD && flush == Flush::None {
                return BlockState::NeedMore;
            }
            if e.lookahead == 0 {
                break;
            }
        }

        if !coder.quick_block_open() {
            coder.open_quick_block();
        }

        if e.lookahead >= HASH_PREFIX {
            let head = usize::from(e.chains.replace_head(e.window.bytes(), e.strstart));
            if e.in_range(head) {
                let window = e.window.bytes();
                let limit = e.lookahead.min(MAX_MATCH);
                let len = common_prefix_len(
                    &window[e.strstart..e.strstart + limit],
                    &window[head..head + limit],
                );
                if len >= HASH_PREFIX {
                    coder.quick_match(e.strstart - head, len);
                    e.lookahead -= len;
                    e.strstart += len;
                    continue;
                }
            }
        }

        coder.quick_literal(e.window.bytes()[e.strstart]);
        e.lookahead -= 1;
        e.strstart += 1;
    }

    e.insert = e.strstart.min(HASH_PREFIX - 1);
    e.block_start = e.strstart as isize;

    if flush == Flush::Finish {
        coder.finish_quick();
        coder.flush_pending(&mut io.output);
        return if io.output.is_full() {
            BlockState::FinishStarted
        } else {
            BlockState::FinishDone
        };
    }

    coder.close_quick_block();
    coder.flush_pending(&mut io.output);
    BlockState::BlockDone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::InputCursor;
    use alloc::vec::Vec;

    struct Session {
        engine: Engine,
        coder: BlockWriter,
        producer: Producer,
    }

    impl Session {
        fn new(level: u32, strategy: Strategy, mem_level: u8) -> Self {
            Self {
                engine: Engine::new(15, mem_level, &LEVEL_TABLE[level as usize]).unwrap(),
                coder: BlockWriter::new(mem_level, level, strategy).unwrap(),
                producer: Producer::select(level, strategy),
            }
        }

        /// Returns the state, the bytes consumed and the bytes written.
        fn step(&mut self, data: &[u8], flush: Flush) -> (BlockState, usize, Vec<u8>) {
            let mut buf = alloc::vec![0u8; 1 << 16];
            let mut io = Io {
                input: InputCursor::new(data),
                output: OutputCursor::new(&mut buf),
            };
            let state = run(self.producer, &mut self.engine, &mut self.coder, &mut io, flush);
            let consumed = io.input.consumed();
            let written = io.output.written();
            buf.truncate(written);
            (state, consumed, buf)
        }
    }

    #[test]
    fn selection_follows_level_and_strategy() {
        assert_eq!(Producer::select(0, Strategy::HuffmanOnly), Producer::Stored);
        assert_eq!(Producer::select(1, Strategy::Default), Producer::Fast);
        assert_eq!(Producer::select(3, Strategy::Default), Producer::Fast);
        assert_eq!(Producer::select(4, Strategy::Default), Producer::Slow { filtered: false });
        assert_eq!(Producer::select(9, Strategy::Filtered), Producer::Slow { filtered: true });
        assert_eq!(Producer::select(6, Strategy::Rle), Producer::Rle);
        assert_eq!(Producer::select(6, Strategy::HuffmanOnly), Producer::Huffman);
        assert_eq!(Producer::select(2, Strategy::Fixed), Producer::Quick);
    }

    #[test]
    fn stored_wraps_input_in_one_block() {
        let mut s = Session::new(0, Strategy::Default, 8);
        let (state, consumed, out) = s.step(b"hello", Flush::Finish);
        assert_eq!(state, BlockState::FinishDone);
        assert_eq!(consumed, 5);
        assert_eq!(out, [0x01, 0x05, 0x00, 0xFA, 0xFF, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn no_flush_buffers_without_output() {
        let mut s = Session::new(6, Strategy::HuffmanOnly, 8);
        let (state, consumed, out) = s.step(b"some literal text", Flush::None);
        assert_eq!(state, BlockState::NeedMore);
        assert_eq!(consumed, 17);
        assert!(out.is_empty());
        assert!(s.coder.has_symbols());
    }

    #[test]
    fn full_symbol_buffer_emits_a_block() {
        let mut s = Session::new(6, Strategy::HuffmanOnly, 1);
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
        let (state, _, out) = s.step(&data, Flush::None);
        assert_eq!(state, BlockState::NeedMore);
        assert!(!out.is_empty());
    }

    #[test]
    fn sync_point_ends_in_block_done() {
        let mut s = Session::new(6, Strategy::Default, 8);
        let (state, _, out) = s.step(b"abcdabcdabcdabcd", Flush::Sync);
        assert_eq!(state, BlockState::BlockDone);
        assert!(!out.is_empty());
        assert_eq!(s.engine.lookahead, 0);
        assert_eq!(s.engine.block_start, s.engine.strstart as isize);
    }

    #[test]
    fn lazy_matcher_settles_owed_literal() {
        let mut s = Session::new(9, Strategy::Default, 8);
        let (state, _, _) = s.step(b"xyzzy", Flush::Finish);
        assert_eq!(state, BlockState::FinishDone);
        assert!(!s.engine.match_available);
        assert_eq!(s.engine.insert, HASH_PREFIX - 1);
    }

    #[test]
    fn runs_become_distance_one_matches() {
        let mut s = Session::new(6, Strategy::Rle, 8);
        let (state, _, out) = s.step(&[b'a'; 1000], Flush::Finish);
        assert_eq!(state, BlockState::FinishDone);
        assert!(out.len() < 20, "rle output too large: {}", out.len());
        assert_eq!(s.engine.insert, 0);
    }

    #[test]
    fn fixed_block_stays_open_without_flush() {
        let mut s = Session::new(1, Strategy::Fixed, 8);
        let data: Vec<u8> = b"quick fixed path ".iter().copied().cycle().take(2000).collect();
        let (state, consumed, _) = s.step(&data, Flush::None);
        assert_eq!(state, BlockState::NeedMore);
        assert_eq!(consumed, data.len());
        assert!(s.coder.quick_block_open());

        let (state, _, _) = s.step(&[], Flush::Finish);
        assert_eq!(state, BlockState::FinishDone);
        assert!(!s.coder.quick_block_open());
        assert!(!s.coder.has_pending());
    }
}
