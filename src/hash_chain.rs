//! Hash chains over window positions.
//!
//! `head` maps a hash of the 4-byte prefix at a position to the most recent
//! position with that hash; `prev` links each position to the previous one
//! with the same hash. Position 0 doubles as the end-of-chain marker, so a
//! string at window index 0 can never be a match source.

use alloc::vec::Vec;

use crate::error::{DeflateError, try_alloc};
use crate::window::HASH_PREFIX;

/// End of chain.
pub(crate) const NIL: u16 = 0;

/// Multiplier for the prefix hash (golden ratio, 32-bit).
const HASH_MULTIPLIER: u32 = 0x9E37_79B1;

#[derive(Debug, Clone)]
pub(crate) struct HashChains {
    head: Vec<u16>,
    prev: Vec<u16>,
    hash_shift: u32,
    w_mask: usize,
}

impl HashChains {
    /// `hash_bits` is `mem_level + 7`; `w_size` is the history size.
    pub(crate) fn new(hash_bits: u32, w_size: usize) -> Result<Self, DeflateError> {
        Ok(Self {
            head: try_alloc(1usize << hash_bits, NIL)?,
            prev: try_alloc(w_size, NIL)?,
            hash_shift: 32 - hash_bits,
            w_mask: w_size - 1,
        })
    }

    /// Hash of the `HASH_PREFIX` bytes starting at `pos`.
    #[inline]
    pub(crate) fn hash(&self, window: &[u8], pos: usize) -> usize {
        let prefix: [u8; HASH_PREFIX] = [
            window[pos],
            window[pos + 1],
            window[pos + 2],
            window[pos + 3],
        ];
        (u32::from_le_bytes(prefix).wrapping_mul(HASH_MULTIPLIER) >> self.hash_shift) as usize
    }

    /// Links `pos` in front of its chain and returns the previous head.
    #[inline]
    pub(crate) fn insert(&mut self, window: &[u8], pos: usize) -> u16 {
        let h = self.hash(window, pos);
        let head = self.head[h];
        self.prev[pos & self.w_mask] = head;
        self.head[h] = pos as u16;
        head
    }

    /// Inserts `count` consecutive positions starting at `start`.
    pub(crate) fn bulk_insert(&mut self, window: &[u8], start: usize, count: usize) {
        for pos in start..start + count {
            self.insert(window, pos);
        }
    }

    /// Replaces the head for `pos` without linking `prev`. Used by the
    /// fixed-code fast path, which never walks chains.
    #[inline]
    pub(crate) fn replace_head(&mut self, window: &[u8], pos: usize) -> u16 {
        let h = self.hash(window, pos);
        core::mem::replace(&mut self.head[h], pos as u16)
    }

    /// Next-older position on the chain through `pos`.
    #[inline]
    pub(crate) fn prev(&self, pos: usize) -> u16 {
        self.prev[pos & self.w_mask]
    }

    /// Forgets every chain. `prev` is left as is; it is only reached via `head`.
    pub(crate) fn clear(&mut self) {
        self.head.fill(NIL);
    }

    /// Rebases all entries after the window slid down by `w_size`.
    /// Entries that fall out of the window become `NIL`.
    pub(crate) fn slide(&mut self, w_size: usize) {
        let rebase = |entry: &mut u16| {
            let pos = usize::from(*entry);
            *entry = if pos >= w_size { (pos - w_size) as u16 } else { NIL };
        };
        self.head.iter_mut().for_each(rebase);
        self.prev.iter_mut().for_each(rebase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(text: &[u8]) -> Vec<u8> {
        let mut window = text.to_vec();
        window.resize(text.len() + HASH_PREFIX, 0);
        window
    }

    #[test]
    fn chains_are_most_recent_first() {
        let window = window_of(b"xabcdabcdabcd");
        let mut chains = HashChains::new(15, 1 << 15).unwrap();
        assert_eq!(chains.insert(&window, 1), NIL);
        assert_eq!(chains.insert(&window, 5), 1);
        assert_eq!(chains.insert(&window, 9), 5);
        assert_eq!(chains.prev(9), 5);
        assert_eq!(chains.prev(5), 1);
        assert_eq!(chains.prev(1), NIL);
    }

    #[test]
    fn clear_forgets_heads() {
        let window = window_of(b"xabcdabcd");
        let mut chains = HashChains::new(15, 1 << 15).unwrap();
        chains.insert(&window, 1);
        chains.clear();
        assert_eq!(chains.insert(&window, 5), NIL);
    }

    #[test]
    fn slide_rebases_and_drops_old_entries() {
        let w_size = 512;
        let mut window = alloc::vec![0u8; 2 * w_size + HASH_PREFIX];
        window[100..104].copy_from_slice(b"abcd");
        window[600..604].copy_from_slice(b"abcd");
        window[700..704].copy_from_slice(b"abcd");
        let mut chains = HashChains::new(9, w_size).unwrap();
        chains.insert(&window, 100);
        chains.insert(&window, 600);
        chains.insert(&window, 700);

        chains.slide(w_size);
        let h = chains.hash(&window, 700);
        assert_eq!(chains.head[h], 700 - 512);
        assert_eq!(chains.prev(700 - 512), 600 - 512);
        assert_eq!(chains.prev(600 - 512), NIL);
    }

    #[test]
    fn replace_head_leaves_prev_untouched() {
        let window = window_of(b"xabcdabcd");
        let mut chains = HashChains::new(15, 1 << 15).unwrap();
        chains.insert(&window, 1);
        assert_eq!(chains.replace_head(&window, 5), 1);
        assert_eq!(chains.prev(5), NIL);
    }
}
