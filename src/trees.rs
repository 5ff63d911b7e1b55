//! Block writer: symbol tally, Huffman code construction and bit packing.
//!
//! Symbols recorded by the block producers are buffered until a block
//! boundary. [`BlockWriter::flush_block`] then measures the block as dynamic
//! Huffman, fixed Huffman and stored, and writes the cheapest form into the
//! pending output buffer.

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Reverse;

use tracing::trace;

use crate::config::Strategy;
use crate::cursor::OutputCursor;
use crate::error::{DeflateError, try_alloc};
use crate::window::{MAX_MATCH, MIN_MATCH};

const LENGTH_CODES: usize = 29;
const LITERALS: usize = 256;
const END_BLOCK: usize = 256;
/// Literal/length alphabet actually used (codes 286 and 287 never occur).
const L_CODES: usize = LITERALS + 1 + LENGTH_CODES;
const D_CODES: usize = 30;
const BL_CODES: usize = 19;

const MAX_BITS: u8 = 15;
const MAX_BL_BITS: u8 = 7;

const STORED_BLOCK: u32 = 0;
const STATIC_TREES: u32 = 1;
const DYN_TREES: u32 = 2;

/// Repeat previous length 3-6 times (2 extra bits).
const REP_3_6: u8 = 16;
/// Repeat a zero length 3-10 times (3 extra bits).
const REPZ_3_10: u8 = 17;
/// Repeat a zero length 11-138 times (7 extra bits).
const REPZ_11_138: u8 = 18;

const EXTRA_LBITS: [u8; LENGTH_CODES] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

const EXTRA_DBITS: [u8; D_CODES] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

const EXTRA_BLBITS: [u8; BL_CODES] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 3, 7];

/// Order in which code-length code lengths are transmitted.
const BL_ORDER: [usize; BL_CODES] = [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// A Huffman code, already bit-reversed for LSB-first output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Code {
    bits: u16,
    len: u8,
}

const fn reverse_bits(mut value: u16, len: u8) -> u16 {
    let mut out = 0u16;
    let mut i = 0;
    while i < len {
        out = (out << 1) | (value & 1);
        value >>= 1;
        i += 1;
    }
    out
}

/// First match length (minus `MIN_MATCH`) of each length code.
const BASE_LENGTH: [u8; LENGTH_CODES] = {
    let mut base = [0u8; LENGTH_CODES];
    let mut length = 0usize;
    let mut code = 0;
    while code < LENGTH_CODES - 1 {
        base[code] = length as u8;
        length += 1 << EXTRA_LBITS[code];
        code += 1;
    }
    // 258 has its own code with no extra bits.
    base[LENGTH_CODES - 1] = (MAX_MATCH - MIN_MATCH) as u8;
    base
};

/// Length code for each match length minus `MIN_MATCH`.
const LENGTH_CODE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < LENGTH_CODES - 1 {
        let mut n = 0;
        while n < (1usize << EXTRA_LBITS[code]) {
            table[BASE_LENGTH[code] as usize + n] = code as u8;
            n += 1;
        }
        code += 1;
    }
    table[MAX_MATCH - MIN_MATCH] = (LENGTH_CODES - 1) as u8;
    table
};

/// First distance (minus one) of each distance code.
const BASE_DIST: [u16; D_CODES] = {
    let mut base = [0u16; D_CODES];
    let mut dist = 0usize;
    let mut code = 0;
    while code < D_CODES {
        base[code] = dist as u16;
        dist += 1 << EXTRA_DBITS[code];
        code += 1;
    }
    base
};

/// Distance codes: the first 256 entries index distances below 256 directly,
/// the rest index `dist >> 7`.
const DIST_CODE: [u8; 512] = {
    let mut table = [0u8; 512];
    let mut code = 0;
    while code < 16 {
        let mut n = 0;
        while n < (1usize << EXTRA_DBITS[code]) {
            table[BASE_DIST[code] as usize + n] = code as u8;
            n += 1;
        }
        code += 1;
    }
    while code < D_CODES {
        let mut n = 0;
        while n < (1usize << (EXTRA_DBITS[code] - 7)) {
            table[256 + (BASE_DIST[code] as usize >> 7) + n] = code as u8;
            n += 1;
        }
        code += 1;
    }
    table
};

/// The fixed literal/length code of RFC 1951 section 3.2.6.
const STATIC_LTREE: [Code; L_CODES + 2] = {
    let mut tree = [Code { bits: 0, len: 0 }; L_CODES + 2];
    let mut n = 0;
    while n < L_CODES + 2 {
        let (code, len) = match n {
            0..=143 => (0x30 + n, 8),
            144..=255 => (0x190 + n - 144, 9),
            256..=279 => (n - 256, 7),
            _ => (0xC0 + n - 280, 8),
        };
        tree[n] = Code {
            bits: reverse_bits(code as u16, len),
            len,
        };
        n += 1;
    }
    tree
};

/// The fixed distance code: 5-bit codes 0..=29.
const STATIC_DTREE: [Code; D_CODES] = {
    let mut tree = [Code { bits: 0, len: 0 }; D_CODES];
    let mut n = 0;
    while n < D_CODES {
        tree[n] = Code {
            bits: reverse_bits(n as u16, 5),
            len: 5,
        };
        n += 1;
    }
    tree
};

#[inline]
fn d_code(dist: usize) -> usize {
    if dist < 256 {
        usize::from(DIST_CODE[dist])
    } else {
        usize::from(DIST_CODE[256 + (dist >> 7)])
    }
}

/// Computes Huffman code lengths for `freq`, limited to `max_bits`.
///
/// At least two symbols always receive a code, so a block with a single used
/// distance (or none) still gets a complete tree.
fn build_lengths(freq: &[u32], max_bits: u8, lengths: &mut [u8]) {
    lengths.fill(0);

    let mut leaves: Vec<(u32, usize)> = freq
        .iter()
        .enumerate()
        .filter(|&(_, &weight)| weight != 0)
        .map(|(symbol, &weight)| (weight, symbol))
        .collect();
    let mut filler = 0;
    while leaves.len() < 2 {
        if !leaves.iter().any(|&(_, symbol)| symbol == filler) {
            leaves.push((1, filler));
        }
        filler += 1;
    }
    leaves.sort_unstable();

    // Ties prefer the shallower subtree to keep the tree flat.
    let count = leaves.len();
    let mut parent = alloc::vec![0usize; 2 * count - 1];
    let mut heap: BinaryHeap<(Reverse<u32>, Reverse<u16>, usize)> = leaves
        .iter()
        .enumerate()
        .map(|(node, &(weight, _))| (Reverse(weight), Reverse(0), node))
        .collect();
    let mut next = count;
    while heap.len() > 1 {
        let (Some((Reverse(wa), Reverse(ha), a)), Some((Reverse(wb), Reverse(hb), b))) =
            (heap.pop(), heap.pop())
        else {
            break;
        };
        parent[a] = next;
        parent[b] = next;
        heap.push((Reverse(wa.saturating_add(wb)), Reverse(ha.max(hb) + 1), next));
        next += 1;
    }

    // Parents always have higher indices than their children.
    let root = next - 1;
    let mut depth = alloc::vec![0usize; 2 * count - 1];
    for node in (0..root).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    let max = usize::from(max_bits);
    let mut bl_count = [0u32; MAX_BITS as usize + 1];
    for &d in &depth[..count] {
        bl_count[d.min(max)] += 1;
    }

    // Clamping over-subscribed the code; move leaves down until it is
    // complete again.
    let mut kraft: u32 = (1..=max).map(|len| bl_count[len] << (max - len)).sum();
    while kraft > 1 << max {
        bl_count[max] -= 1;
        if let Some(len) = (1..max).rev().find(|&len| bl_count[len] != 0) {
            bl_count[len] -= 1;
            bl_count[len + 1] += 2;
        }
        kraft -= 1;
    }

    // Rarest symbols take the longest codes.
    let mut symbols = leaves.iter().map(|&(_, symbol)| symbol);
    for len in (1..=max).rev() {
        for _ in 0..bl_count[len] {
            if let Some(symbol) = symbols.next() {
                lengths[symbol] = len as u8;
            }
        }
    }
}

/// Assigns canonical codes (RFC 1951 section 3.2.2) for the given lengths.
fn assign_codes(lengths: &[u8], codes: &mut [Code]) {
    let mut bl_count = [0u16; MAX_BITS as usize + 1];
    for &len in lengths {
        bl_count[usize::from(len)] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_BITS as usize + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_BITS as usize {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    for (symbol, &len) in lengths.iter().enumerate() {
        codes[symbol] = if len == 0 {
            Code::default()
        } else {
            let canonical = next_code[usize::from(len)];
            next_code[usize::from(len)] += 1;
            Code {
                bits: reverse_bits(canonical, len),
                len,
            }
        };
    }
}

/// Run-length codes the concatenated code lengths. Each entry is
/// `(symbol, extra value)`.
fn encode_code_lengths(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let current = lengths[i];
        let run = lengths[i..].iter().take_while(|&&len| len == current).count();

        if current == 0 {
            let mut remaining = run;
            while remaining > 0 {
                if remaining >= 11 {
                    let count = remaining.min(138);
                    out.push((REPZ_11_138, (count - 11) as u8));
                    remaining -= count;
                } else if remaining >= 3 {
                    let count = remaining.min(10);
                    out.push((REPZ_3_10, (count - 3) as u8));
                    remaining -= count;
                } else {
                    out.push((0, 0));
                    remaining -= 1;
                }
            }
        } else {
            out.push((current, 0));
            let mut remaining = run - 1;
            while remaining > 0 {
                if remaining >= 3 {
                    let count = remaining.min(6);
                    out.push((REP_3_6, (count - 3) as u8));
                    remaining -= count;
                } else {
                    out.push((current, 0));
                    remaining -= 1;
                }
            }
        }

        i += run;
    }
    out
}

fn last_used(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&len| len != 0).map_or(0, |pos| pos + 1)
}

/// Bits needed to code the tallied symbols (extra bits included) with the
/// given trees. The end-of-block code is part of `lit_freq`.
fn body_bits(ltree: &[Code], dtree: &[Code], lit_freq: &[u32], dist_freq: &[u32]) -> u64 {
    let lit: u64 = lit_freq
        .iter()
        .enumerate()
        .map(|(symbol, &freq)| {
            let extra = if symbol > END_BLOCK {
                EXTRA_LBITS[symbol - END_BLOCK - 1]
            } else {
                0
            };
            u64::from(freq) * u64::from(ltree[symbol].len + extra)
        })
        .sum();
    let dist: u64 = dist_freq
        .iter()
        .zip(EXTRA_DBITS)
        .enumerate()
        .map(|(code, (&freq, extra))| u64::from(freq) * u64::from(dtree[code].len + extra))
        .sum();
    lit + dist
}

/// Codes and header description of one dynamic block.
#[derive(Debug)]
struct DynamicTrees {
    lit: [Code; L_CODES],
    dist: [Code; D_CODES],
    bl: [Code; BL_CODES],
    bl_lengths: [u8; BL_CODES],
    hlit: usize,
    hdist: usize,
    hclen: usize,
    code_lengths: Vec<(u8, u8)>,
}

impl DynamicTrees {
    fn build(lit_freq: &[u32; L_CODES], dist_freq: &[u32; D_CODES]) -> Self {
        let mut lit_lengths = [0u8; L_CODES];
        build_lengths(lit_freq, MAX_BITS, &mut lit_lengths);
        let mut dist_lengths = [0u8; D_CODES];
        build_lengths(dist_freq, MAX_BITS, &mut dist_lengths);

        let hlit = last_used(&lit_lengths).max(LITERALS + 1);
        let hdist = last_used(&dist_lengths).max(1);

        let mut all = Vec::with_capacity(hlit + hdist);
        all.extend_from_slice(&lit_lengths[..hlit]);
        all.extend_from_slice(&dist_lengths[..hdist]);
        let code_lengths = encode_code_lengths(&all);

        let mut bl_freq = [0u32; BL_CODES];
        for &(symbol, _) in &code_lengths {
            bl_freq[usize::from(symbol)] += 1;
        }
        let mut bl_lengths = [0u8; BL_CODES];
        build_lengths(&bl_freq, MAX_BL_BITS, &mut bl_lengths);
        let hclen = BL_ORDER
            .iter()
            .rposition(|&symbol| bl_lengths[symbol] != 0)
            .map_or(0, |pos| pos + 1)
            .max(4);

        let mut trees = Self {
            lit: [Code::default(); L_CODES],
            dist: [Code::default(); D_CODES],
            bl: [Code::default(); BL_CODES],
            bl_lengths,
            hlit,
            hdist,
            hclen,
            code_lengths,
        };
        assign_codes(&lit_lengths, &mut trees.lit);
        assign_codes(&dist_lengths, &mut trees.dist);
        assign_codes(&trees.bl_lengths, &mut trees.bl);
        trees
    }

    /// Size of the tree description that precedes the block body.
    fn header_bits(&self) -> u64 {
        let lengths: u64 = self
            .code_lengths
            .iter()
            .map(|&(symbol, _)| {
                let symbol = usize::from(symbol);
                u64::from(self.bl[symbol].len + EXTRA_BLBITS[symbol])
            })
            .sum();
        5 + 5 + 4 + 3 * self.hclen as u64 + lengths
    }
}

/// Entropy coder and pending output for one session.
#[derive(Debug, Clone)]
pub(crate) struct BlockWriter {
    /// Finished bytes not yet handed to the caller; `pending_out` is the
    /// first undelivered one.
    pending: Vec<u8>,
    pending_out: usize,
    /// Nominal pending size. Producers flush or split blocks around it; the
    /// vector itself may grow past it.
    pending_cap: usize,
    bit_buf: u64,
    bit_count: u32,
    /// Match distance per symbol, 0 for literals.
    sym_dist: Vec<u16>,
    /// Literal byte, or match length minus `MIN_MATCH`.
    sym_lc: Vec<u8>,
    sym_next: usize,
    sym_end: usize,
    lit_freq: [u32; L_CODES],
    dist_freq: [u32; D_CODES],
    store_only: bool,
    fixed_only: bool,
    quick_open: bool,
}

impl BlockWriter {
    pub(crate) fn new(mem_level: u8, level: u32, strategy: Strategy) -> Result<Self, DeflateError> {
        let lit_bufsize = 1usize << (mem_level + 6);
        let pending_cap = 4 * lit_bufsize;
        let mut pending = try_alloc(pending_cap, 0u8)?;
        pending.clear();

        let mut writer = Self {
            pending,
            pending_out: 0,
            pending_cap,
            bit_buf: 0,
            bit_count: 0,
            sym_dist: try_alloc(lit_bufsize, 0u16)?,
            sym_lc: try_alloc(lit_bufsize, 0u8)?,
            sym_next: 0,
            sym_end: lit_bufsize - 1,
            lit_freq: [0; L_CODES],
            dist_freq: [0; D_CODES],
            store_only: false,
            fixed_only: false,
            quick_open: false,
        };
        writer.set_mode(level, strategy);
        writer.init_block();
        Ok(writer)
    }

    /// Applies the level and strategy to block type selection.
    pub(crate) fn set_mode(&mut self, level: u32, strategy: Strategy) {
        self.store_only = level == 0;
        self.fixed_only = strategy == Strategy::Fixed;
    }

    pub(crate) fn reset(&mut self) {
        self.pending.clear();
        self.pending_out = 0;
        self.bit_buf = 0;
        self.bit_count = 0;
        self.quick_open = false;
        self.init_block();
    }

    fn init_block(&mut self) {
        self.lit_freq.fill(0);
        self.dist_freq.fill(0);
        self.lit_freq[END_BLOCK] = 1;
        self.sym_next = 0;
    }

    /// True when symbols are waiting for a block.
    pub(crate) const fn has_symbols(&self) -> bool {
        self.sym_next != 0
    }

    /// Records a literal. Returns true when the symbol buffer is full.
    #[inline]
    pub(crate) fn tally_lit(&mut self, byte: u8) -> bool {
        self.sym_dist[self.sym_next] = 0;
        self.sym_lc[self.sym_next] = byte;
        self.sym_next += 1;
        self.lit_freq[usize::from(byte)] += 1;
        self.sym_next == self.sym_end
    }

    /// Records a match of `len` bytes at distance `dist`. Returns true when
    /// the symbol buffer is full.
    #[inline]
    pub(crate) fn tally_dist(&mut self, dist: usize, len: usize) -> bool {
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len), "bad match length");
        debug_assert!((1..=1 << 15).contains(&dist), "bad match distance");
        let lc = len - MIN_MATCH;
        self.sym_dist[self.sym_next] = dist as u16;
        self.sym_lc[self.sym_next] = lc as u8;
        self.sym_next += 1;
        self.lit_freq[usize::from(LENGTH_CODE[lc]) + LITERALS + 1] += 1;
        self.dist_freq[d_code(dist - 1)] += 1;
        self.sym_next == self.sym_end
    }

    pub(crate) const fn pending_cap(&self) -> usize {
        self.pending_cap
    }

    /// Finished bytes not yet delivered.
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len() - self.pending_out
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending_len() != 0
    }

    /// Bits waiting for a full byte.
    pub(crate) const fn pending_bits(&self) -> u32 {
        self.bit_count
    }

    /// Copies as much pending output as fits and returns the byte count.
    pub(crate) fn flush_pending(&mut self, output: &mut OutputCursor<'_>) -> usize {
        let written = output.write(&self.pending[self.pending_out..]);
        self.pending_out += written;
        if self.pending_out == self.pending.len() {
            self.pending.clear();
            self.pending_out = 0;
        }
        written
    }

    /// Appends whole bytes after the completed ones. Bits still in the bit
    /// buffer are not flushed first.
    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    #[inline]
    fn send_bits(&mut self, value: u32, len: u32) {
        debug_assert!(len <= 16, "too many bits");
        self.bit_buf |= u64::from(value) << self.bit_count;
        self.bit_count += len;
        while self.bit_count >= 8 {
            self.pending.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    #[inline]
    fn send_code(&mut self, code: Code) {
        self.send_bits(u32::from(code.bits), u32::from(code.len));
    }

    /// Pads the bit buffer to a byte boundary.
    fn windup(&mut self) {
        if self.bit_count > 0 {
            self.pending.push(self.bit_buf as u8);
        }
        self.bit_buf = 0;
        self.bit_count = 0;
    }

    /// Inserts up to 16 raw bits into the stream.
    pub(crate) fn prime(&mut self, bits: u8, value: u16) -> Result<(), DeflateError> {
        if bits > 16 {
            return Err(DeflateError::InvalidPrimeBits(bits));
        }
        let mask = ((1u32 << bits) - 1) as u16;
        self.send_bits(u32::from(value & mask), u32::from(bits));
        Ok(())
    }

    /// Writes `data` as a stored block.
    pub(crate) fn stored_block(&mut self, data: &[u8], last: bool) {
        debug_assert!(data.len() <= 0xffff, "stored block too long");
        let len = data.len() as u16;
        self.send_bits((STORED_BLOCK << 1) + u32::from(last), 3);
        self.windup();
        self.put_bytes(&len.to_le_bytes());
        self.put_bytes(&(!len).to_le_bytes());
        self.put_bytes(data);
    }

    /// Emits an empty fixed-code block, giving the decoder enough bits to
    /// finish the previous block.
    pub(crate) fn align(&mut self) {
        self.send_bits(STATIC_TREES << 1, 3);
        self.send_code(STATIC_LTREE[END_BLOCK]);
    }

    /// Closes the current block.
    ///
    /// `stored` holds the raw bytes the block covers when they are still in
    /// the window; without them the block cannot fall back to stored form.
    pub(crate) fn flush_block(&mut self, stored: Option<&[u8]>, stored_len: usize, last: bool) {
        let (opt_lenb, static_lenb, dynamic) = if self.store_only {
            (stored_len + 5, stored_len + 5, None)
        } else {
            let trees = DynamicTrees::build(&self.lit_freq, &self.dist_freq);
            let opt_bits =
                trees.header_bits() + body_bits(&trees.lit, &trees.dist, &self.lit_freq, &self.dist_freq);
            let static_bits = body_bits(&STATIC_LTREE, &STATIC_DTREE, &self.lit_freq, &self.dist_freq);
            let opt_lenb = ((opt_bits + 3 + 7) >> 3) as usize;
            let static_lenb = ((static_bits + 3 + 7) >> 3) as usize;
            (opt_lenb.min(static_lenb), static_lenb, Some(trees))
        };
        let last_bit = u32::from(last);
        let use_dynamic = !self.fixed_only && static_lenb != opt_lenb;

        match (stored, dynamic) {
            (Some(data), _) if stored_len + 4 <= opt_lenb => {
                debug_assert_eq!(data.len(), stored_len);
                trace!(stored_len, last, "Stored block");
                self.stored_block(data, last);
            }
            (_, Some(trees)) if use_dynamic => {
                trace!(stored_len, bytes = opt_lenb, last, "Dynamic block");
                self.send_bits((DYN_TREES << 1) + last_bit, 3);
                self.send_trees(&trees);
                self.compress_block(&trees.lit, &trees.dist);
            }
            _ => {
                trace!(stored_len, bytes = static_lenb, last, "Fixed block");
                self.send_bits((STATIC_TREES << 1) + last_bit, 3);
                self.compress_block(&STATIC_LTREE, &STATIC_DTREE);
            }
        }

        self.init_block();
        if last {
            self.windup();
        }
    }

    fn send_trees(&mut self, trees: &DynamicTrees) {
        self.send_bits((trees.hlit - 257) as u32, 5);
        self.send_bits((trees.hdist - 1) as u32, 5);
        self.send_bits((trees.hclen - 4) as u32, 4);
        for &symbol in &BL_ORDER[..trees.hclen] {
            self.send_bits(u32::from(trees.bl_lengths[symbol]), 3);
        }
        for &(symbol, extra) in &trees.code_lengths {
            self.send_code(trees.bl[usize::from(symbol)]);
            match symbol {
                REP_3_6 => self.send_bits(u32::from(extra), 2),
                REPZ_3_10 => self.send_bits(u32::from(extra), 3),
                REPZ_11_138 => self.send_bits(u32::from(extra), 7),
                _ => {}
            }
        }
    }

    fn compress_block(&mut self, ltree: &[Code], dtree: &[Code]) {
        for i in 0..self.sym_next {
            let dist = usize::from(self.sym_dist[i]);
            let lc = self.sym_lc[i];
            if dist == 0 {
                self.send_code(ltree[usize::from(lc)]);
            } else {
                self.send_match(ltree, dtree, dist, usize::from(lc));
            }
        }
        self.send_code(ltree[END_BLOCK]);
    }

    fn send_match(&mut self, ltree: &[Code], dtree: &[Code], dist: usize, lc: usize) {
        let code = usize::from(LENGTH_CODE[lc]);
        self.send_code(ltree[code + LITERALS + 1]);
        let extra = EXTRA_LBITS[code];
        if extra != 0 {
            self.send_bits((lc - usize::from(BASE_LENGTH[code])) as u32, u32::from(extra));
        }

        let dist = dist - 1;
        let code = d_code(dist);
        self.send_code(dtree[code]);
        let extra = EXTRA_DBITS[code];
        if extra != 0 {
            self.send_bits((dist - usize::from(BASE_DIST[code])) as u32, u32::from(extra));
        }
    }

    /// True while the fixed-code fast path has a block open.
    pub(crate) const fn quick_block_open(&self) -> bool {
        self.quick_open
    }

    /// Starts a non-final fixed-code block for the fast path.
    pub(crate) fn open_quick_block(&mut self) {
        debug_assert!(!self.quick_open, "fixed block already open");
        self.send_bits(STATIC_TREES << 1, 3);
        self.quick_open = true;
    }

    #[inline]
    pub(crate) fn quick_literal(&mut self, byte: u8) {
        self.send_code(STATIC_LTREE[usize::from(byte)]);
    }

    #[inline]
    pub(crate) fn quick_match(&mut self, dist: usize, len: usize) {
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len), "bad match length");
        self.send_match(&STATIC_LTREE, &STATIC_DTREE, dist, len - MIN_MATCH);
    }

    /// Ends the fast-path block, if one is open.
    pub(crate) fn close_quick_block(&mut self) {
        if self.quick_open {
            self.send_code(STATIC_LTREE[END_BLOCK]);
            self.quick_open = false;
        }
    }

    /// Ends the fast-path block and terminates the stream with an empty final
    /// fixed block.
    pub(crate) fn finish_quick(&mut self) {
        self.close_quick_block();
        self.send_bits((STATIC_TREES << 1) + 1, 3);
        self.send_code(STATIC_LTREE[END_BLOCK]);
        self.windup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(level: u32) -> BlockWriter {
        BlockWriter::new(8, level, Strategy::Default).unwrap()
    }

    fn drain(writer: &mut BlockWriter) -> Vec<u8> {
        let mut buf = alloc::vec![0u8; writer.pending_len()];
        let mut out = OutputCursor::new(&mut buf);
        writer.flush_pending(&mut out);
        buf
    }

    #[test]
    fn length_and_distance_tables() {
        assert_eq!(LENGTH_CODE[0], 0);
        assert_eq!(LENGTH_CODE[8], 8);
        assert_eq!(LENGTH_CODE[254], 27);
        assert_eq!(LENGTH_CODE[255], 28);
        assert_eq!(BASE_LENGTH[27], 224);
        assert_eq!(d_code(0), 0);
        assert_eq!(d_code(4), 4);
        assert_eq!(d_code(255), 15);
        assert_eq!(d_code(256), 16);
        assert_eq!(d_code(32767), 29);
        assert_eq!(BASE_DIST[29], 24576);
    }

    #[test]
    fn fixed_code_matches_rfc() {
        // 'A' (65) -> 0x30 + 65 = 0b01110001, sent MSB first.
        assert_eq!(STATIC_LTREE[65].len, 8);
        assert_eq!(STATIC_LTREE[65].bits, reverse_bits(0x71, 8));
        assert_eq!(STATIC_LTREE[200].len, 9);
        assert_eq!(STATIC_LTREE[END_BLOCK], Code { bits: 0, len: 7 });
        assert_eq!(STATIC_LTREE[287].len, 8);
    }

    #[test]
    fn canonical_codes_follow_rfc_example() {
        // RFC 1951 section 3.2.2: lengths (3, 3, 3, 3, 3, 2, 4, 4).
        let lengths = [3, 3, 3, 3, 3, 2, 4, 4];
        let mut codes = [Code::default(); 8];
        assign_codes(&lengths, &mut codes);
        let expected = [0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111];
        for (code, (&want, &len)) in codes.iter().zip(expected.iter().zip(&lengths)) {
            assert_eq!(code.bits, reverse_bits(want, len));
        }
    }

    #[test]
    fn lengths_are_limited_and_complete() {
        // Fibonacci weights produce a maximally skewed tree.
        let mut freq = [0u32; 30];
        let (mut a, mut b) = (1u32, 1u32);
        for slot in &mut freq {
            *slot = a;
            (a, b) = (b, a + b);
        }
        let mut lengths = [0u8; 30];
        build_lengths(&freq, MAX_BITS, &mut lengths);
        assert!(lengths.iter().all(|&len| (1..=MAX_BITS).contains(&len)));
        let kraft: u32 = lengths.iter().map(|&len| 1u32 << (MAX_BITS - len)).sum();
        assert_eq!(kraft, 1 << MAX_BITS);
        // More frequent symbols never get longer codes.
        assert!(lengths.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn lone_symbol_still_gets_a_complete_tree() {
        let mut freq = [0u32; D_CODES];
        freq[7] = 42;
        let mut lengths = [0u8; D_CODES];
        build_lengths(&freq, MAX_BITS, &mut lengths);
        assert_eq!(lengths[7], 1);
        assert_eq!(lengths[0], 1);
        assert_eq!(lengths.iter().filter(|&&len| len != 0).count(), 2);
    }

    #[test]
    fn code_length_runs() {
        let mut lengths = alloc::vec![8u8; 7];
        lengths.extend([0u8; 20]);
        lengths.extend([5u8, 0, 0]);
        let runs = encode_code_lengths(&lengths);
        assert_eq!(
            runs,
            alloc::vec![(8, 0), (REP_3_6, 3), (REPZ_11_138, 9), (5, 0), (0, 0), (0, 0)]
        );
    }

    #[test]
    fn empty_final_block_is_fixed() {
        let mut w = writer(6);
        w.flush_block(Some(&[]), 0, true);
        assert_eq!(drain(&mut w), [0x03, 0x00]);
    }

    #[test]
    fn level_zero_writes_stored_blocks() {
        let mut w = writer(0);
        for &byte in b"abc" {
            w.tally_lit(byte);
        }
        w.flush_block(Some(b"abc"), 3, true);
        assert_eq!(drain(&mut w), [0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c']);
    }

    #[test]
    fn incompressible_block_falls_back_to_stored() {
        let mut w = writer(6);
        let data: Vec<u8> = (0..=255u8).collect();
        for &byte in &data {
            w.tally_lit(byte);
        }
        w.flush_block(Some(&data), data.len(), false);
        let out = drain(&mut w);
        assert_eq!(out.len(), 5 + data.len());
        assert_eq!(out[0], 0x00);
        assert_eq!(&out[5..], &data[..]);
    }

    #[test]
    fn fixed_strategy_never_builds_dynamic_trees() {
        let mut w = BlockWriter::new(8, 6, Strategy::Fixed).unwrap();
        for _ in 0..100 {
            w.tally_lit(b'x');
        }
        w.flush_block(None, 100, true);
        let out = drain(&mut w);
        // BFINAL=1, BTYPE=01.
        assert_eq!(out[0] & 0b111, 0b011);
    }

    #[test]
    fn symbol_buffer_reports_full() {
        let mut w = BlockWriter::new(1, 6, Strategy::Default).unwrap();
        let capacity = (1 << 7) - 1;
        for _ in 0..capacity - 1 {
            assert!(!w.tally_lit(0));
        }
        assert!(w.tally_dist(1, 3));
    }

    #[test]
    fn prime_rejects_wide_values() {
        let mut w = writer(6);
        assert_eq!(w.prime(17, 0), Err(DeflateError::InvalidPrimeBits(17)));
        w.prime(3, 0b101).unwrap();
        assert_eq!(w.pending_bits(), 3);
    }

    #[test]
    fn align_emits_ten_bits() {
        let mut w = writer(6);
        w.align();
        assert_eq!(w.pending_len(), 1);
        assert_eq!(w.pending_bits(), 2);
    }
}
