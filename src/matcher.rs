//! Longest-match search along a hash chain.

use crate::hash_chain::HashChains;
use crate::window::{HASH_PREFIX, MAX_MATCH};

/// Search bounds for one lookup.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchQuery {
    /// Position of the string to match.
    pub strstart: usize,
    /// Valid bytes from `strstart` on.
    pub lookahead: usize,
    /// Length to beat; shorter or equal candidates are ignored.
    pub prev_length: usize,
    /// Farthest allowed distance.
    pub max_dist: usize,
    pub max_chain: usize,
    pub good_length: usize,
    pub nice_length: usize,
}

/// Result of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Found {
    /// Best length, clamped to the lookahead. Equals `prev_length` (or the
    /// lookahead) when nothing better was found.
    pub len: usize,
    /// Source position of the best match, if one beat `prev_length`.
    pub start: Option<usize>,
}

#[inline]
fn load_u32(window: &[u8], pos: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&window[pos..pos + 4]);
    u32::from_le_bytes(buf)
}

#[inline]
fn load_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Length of the common prefix of `a` and `b`, comparing 8 bytes at a time.
#[inline]
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let limit = a.len().min(b.len());
    let mut len = 0;
    while len + 8 <= limit {
        let diff = load_u64(&a[len..]) ^ load_u64(&b[len..]);
        if diff != 0 {
            return len + (diff.trailing_zeros() / 8) as usize;
        }
        len += 8;
    }
    while len < limit && a[len] == b[len] {
        len += 1;
    }
    len
}

/// Walks the chain starting at `cur_match` and returns the longest match for
/// the string at `query.strstart`.
///
/// Candidates are first checked on the 4 bytes ending at the current best
/// length and on the 4-byte prefix; only survivors get a full compare.
/// Equal-length candidates never replace an earlier one. The walk stops at
/// `nice_length` (clamped to the lookahead), at the chain cap, or at a
/// position at or beyond `max_dist`.
///
/// The window must hold `MAX_MATCH` readable bytes past `strstart`; bytes past
/// the lookahead may be compared but never extend the reported length.
pub(crate) fn longest_match(
    window: &[u8],
    chains: &HashChains,
    query: &MatchQuery,
    cur_match: usize,
) -> Found {
    let scan = query.strstart;
    let mut best_len = query.prev_length.max(HASH_PREFIX - 1);
    let mut best_start = None;
    let mut chain_length = query.max_chain.max(1);
    if query.prev_length >= query.good_length {
        chain_length = (chain_length >> 1).max(1);
    }
    // Matches may not be reported past the end of the input.
    let nice_match = query.nice_length.min(query.lookahead);
    let limit = scan.saturating_sub(query.max_dist);
    let strend = scan + MAX_MATCH;

    debug_assert!(scan + MAX_MATCH < window.len(), "need lookahead room");

    let scan_start = load_u32(window, scan);
    let mut scan_end = load_u32(window, scan + best_len - 3);
    let mut candidate = cur_match;

    loop {
        debug_assert!(candidate < scan, "no future");
        if candidate >= scan {
            break;
        }

        if load_u32(window, candidate + best_len - 3) == scan_end
            && load_u32(window, candidate) == scan_start
        {
            let len = HASH_PREFIX
                + common_prefix_len(
                    &window[scan + HASH_PREFIX..strend],
                    &window[candidate + HASH_PREFIX..candidate + MAX_MATCH],
                );
            if len > best_len {
                best_start = Some(candidate);
                best_len = len;
                if len >= nice_match {
                    break;
                }
                scan_end = load_u32(window, scan + best_len - 3);
            }
        }

        candidate = usize::from(chains.prev(candidate));
        chain_length -= 1;
        if candidate <= limit || chain_length == 0 {
            break;
        }
    }

    Found {
        len: best_len.min(query.lookahead),
        start: best_start,
    }
}
