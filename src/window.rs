//! Sliding history buffer.
//!
//! The buffer is twice the window size. New input is appended after the
//! current lookahead; once the cursor nears the end, the upper half is copied
//! over the lower half and every stored position is rebased by one window.

use alloc::vec::Vec;

use crate::cursor::InputCursor;
use crate::error::{DeflateError, try_alloc};

/// Minimum match length encodable by the format.
pub(crate) const MIN_MATCH: usize = 3;

/// Minimum match length the engine looks for; also the hashed prefix size.
pub(crate) const HASH_PREFIX: usize = 4;

/// Maximum match length encodable by the format.
pub(crate) const MAX_MATCH: usize = 258;

/// Lookahead needed to find a maximal match and hash the string after it.
pub(crate) const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;

/// Bytes past the written data kept zeroed for speculative reads.
const WIN_INIT: usize = MAX_MATCH;

#[derive(Debug, Clone)]
pub(crate) struct Window {
    buf: Vec<u8>,
    w_size: usize,
    /// One past the highest byte ever written or zeroed.
    high_water: usize,
}

impl Window {
    pub(crate) fn new(window_bits: u8) -> Result<Self, DeflateError> {
        let w_size = 1usize << window_bits;
        Ok(Self {
            buf: try_alloc(2 * w_size, 0u8)?,
            w_size,
            high_water: 0,
        })
    }

    /// History size (`1 << window_bits`).
    pub(crate) const fn w_size(&self) -> usize {
        self.w_size
    }

    /// Total buffer length, two windows.
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// Farthest a match source may lie behind the cursor.
    pub(crate) const fn max_dist(&self) -> usize {
        self.w_size - MIN_LOOKAHEAD
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn reset(&mut self) {
        self.high_water = 0;
    }

    /// Moves the upper half over the lower half. Callers rebase positions.
    pub(crate) fn slide(&mut self) {
        let w_size = self.w_size;
        self.buf.copy_within(w_size..2 * w_size, 0);
    }

    /// Reads input into `[at, at + max)` and returns the number of bytes read.
    pub(crate) fn read(&mut self, input: &mut InputCursor<'_>, at: usize, max: usize) -> usize {
        let end = (at + max).min(self.buf.len());
        input.read_into(&mut self.buf[at..end])
    }

    /// Zeroes up to `WIN_INIT` bytes past `curr` that have never been written,
    /// so match comparisons running past the lookahead see defined data.
    pub(crate) fn zero_past(&mut self, curr: usize) {
        let window_size = self.buf.len();
        if self.high_water >= window_size {
            return;
        }
        if self.high_water < curr {
            let init = (window_size - curr).min(WIN_INIT);
            self.buf[curr..curr + init].fill(0);
            self.high_water = curr + init;
        } else if self.high_water < curr + WIN_INIT {
            let init = (curr + WIN_INIT - self.high_water).min(window_size - self.high_water);
            self.buf[self.high_water..self.high_water + init].fill(0);
            self.high_water += init;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_copies_upper_half_down() {
        let mut window = Window::new(9).unwrap();
        let w_size = window.w_size();
        let data: Vec<u8> = (0..2 * w_size).map(|i| (i % 253) as u8).collect();
        let mut input = InputCursor::new(&data);
        assert_eq!(window.read(&mut input, 0, 2 * w_size), 2 * w_size);

        window.slide();
        assert_eq!(&window.bytes()[..w_size], &data[w_size..]);
    }

    #[test]
    fn zero_past_clears_stale_bytes_once() {
        let mut window = Window::new(9).unwrap();
        let data = [0xAAu8; 600];
        let mut input = InputCursor::new(&data);
        window.read(&mut input, 0, 600);
        window.high_water = 100;

        window.zero_past(100);
        assert!(window.bytes()[100..100 + WIN_INIT].iter().all(|&b| b == 0));
        assert_eq!(window.bytes()[100 + WIN_INIT], 0xAA);
        assert_eq!(window.high_water, 100 + WIN_INIT);
    }

    #[test]
    fn zero_past_is_bounded_by_buffer_end() {
        let mut window = Window::new(9).unwrap();
        let end = window.len();
        window.zero_past(end - 10);
        assert_eq!(window.high_water, end);
    }
}
