//! Per-session LZ77 state: the window, the hash chains and the cursor fields
//! shared by every block producer.

use tracing::trace;

use crate::config::LevelParams;
use crate::cursor::InputCursor;
use crate::error::DeflateError;
use crate::hash_chain::{HashChains, NIL};
use crate::matcher::{Found, MatchQuery, longest_match};
use crate::window::{HASH_PREFIX, MIN_LOOKAHEAD, Window};

/// The four match-search thresholds. Loaded from the level table and
/// adjustable with [`Deflater::tune`](crate::Deflater::tune).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tuning {
    pub good_length: usize,
    pub max_lazy: usize,
    pub nice_length: usize,
    pub max_chain: usize,
}

impl From<&LevelParams> for Tuning {
    fn from(params: &LevelParams) -> Self {
        Self {
            good_length: usize::from(params.good_length),
            max_lazy: usize::from(params.max_lazy),
            nice_length: usize::from(params.nice_length),
            max_chain: usize::from(params.max_chain),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Engine {
    pub window: Window,
    pub chains: HashChains,
    /// Next position to be processed.
    pub strstart: usize,
    /// Valid bytes at and after `strstart`.
    pub lookahead: usize,
    /// Window position where the current block began. Goes negative once the
    /// start has been slid out of the window.
    pub block_start: isize,
    pub match_start: usize,
    pub match_length: usize,
    /// Lazy matcher: best match at the previous position.
    pub prev_length: usize,
    pub prev_match: usize,
    /// Lazy matcher: a literal at `strstart - 1` is still owed.
    pub match_available: bool,
    /// Positions before `strstart` not yet hashed.
    pub insert: usize,
    pub tuning: Tuning,
}

impl Engine {
    pub(crate) fn new(
        window_bits: u8,
        mem_level: u8,
        params: &LevelParams,
    ) -> Result<Self, DeflateError> {
        let window = Window::new(window_bits)?;
        let chains = HashChains::new(u32::from(mem_level) + 7, window.w_size())?;
        let mut engine = Self {
            window,
            chains,
            strstart: 0,
            lookahead: 0,
            block_start: 0,
            match_start: 0,
            match_length: 0,
            prev_length: 0,
            prev_match: 0,
            match_available: false,
            insert: 0,
            tuning: Tuning::from(params),
        };
        engine.reset(params);
        Ok(engine)
    }

    /// Back to an empty history with the level's default thresholds.
    pub(crate) fn reset(&mut self, params: &LevelParams) {
        self.window.reset();
        self.chains.clear();
        self.tuning = Tuning::from(params);
        self.strstart = 0;
        self.block_start = 0;
        self.lookahead = 0;
        self.insert = 0;
        self.forget_match();
    }

    /// Drops any deferred lazy-match state.
    pub(crate) fn forget_match(&mut self) {
        self.match_length = HASH_PREFIX - 1;
        self.prev_length = HASH_PREFIX - 1;
        self.match_available = false;
    }

    pub(crate) const fn max_dist(&self) -> usize {
        self.window.max_dist()
    }

    /// Hashes the string at `pos` into its chain and returns the previous head.
    #[inline]
    pub(crate) fn insert_string(&mut self, pos: usize) -> usize {
        usize::from(self.chains.insert(self.window.bytes(), pos))
    }

    pub(crate) fn bulk_insert(&mut self, start: usize, count: usize) {
        self.chains.bulk_insert(self.window.bytes(), start, count);
    }

    /// True when `head` is a usable match source for the string at `strstart`.
    #[inline]
    pub(crate) fn in_range(&self, head: usize) -> bool {
        head != usize::from(NIL) && self.strstart - head <= self.max_dist()
    }

    /// Searches the chain from `head` for a match longer than `prev_length`.
    pub(crate) fn longest_match(&self, head: usize, prev_length: usize) -> Found {
        let query = MatchQuery {
            strstart: self.strstart,
            lookahead: self.lookahead,
            prev_length,
            max_dist: self.max_dist(),
            max_chain: self.tuning.max_chain,
            good_length: self.tuning.good_length,
            nice_length: self.tuning.nice_length,
        };
        longest_match(self.window.bytes(), &self.chains, &query, head)
    }

    /// The bytes of the current block, unless its start was slid away.
    pub(crate) fn block_bytes(&self) -> Option<&[u8]> {
        let start = usize::try_from(self.block_start).ok()?;
        Some(&self.window.bytes()[start..self.strstart])
    }

    /// Bytes covered by the current block.
    pub(crate) fn block_len(&self) -> usize {
        (self.strstart as isize - self.block_start) as usize
    }

    /// Full-flush boundary: no later match may reach back before this point.
    pub(crate) fn forget_history(&mut self) {
        self.chains.clear();
        if self.lookahead == 0 {
            self.strstart = 0;
            self.block_start = 0;
            self.insert = 0;
        }
    }

    /// Reads input until at least `MIN_LOOKAHEAD` bytes are available or the
    /// input runs dry, sliding the window when the cursor gets too close to
    /// its end.
    pub(crate) fn fill_window(&mut self, input: &mut InputCursor<'_>) {
        debug_assert!(self.lookahead < MIN_LOOKAHEAD, "already enough lookahead");
        let w_size = self.window.w_size();

        loop {
            let mut more = self.window.len() - self.lookahead - self.strstart;

            if self.strstart >= w_size + self.max_dist() {
                self.slide();
                more += w_size;
            }
            if input.is_empty() {
                break;
            }

            let read = self
                .window
                .read(input, self.strstart + self.lookahead, more);
            self.lookahead += read;

            // Hash the positions left over from the previous call now that the
            // bytes after them are known.
            if self.lookahead + self.insert >= HASH_PREFIX {
                let mut pos = self.strstart - self.insert;
                while self.insert > 0 {
                    self.chains.insert(self.window.bytes(), pos);
                    pos += 1;
                    self.insert -= 1;
                    if self.lookahead + self.insert < HASH_PREFIX {
                        break;
                    }
                }
            }

            if self.lookahead >= MIN_LOOKAHEAD || input.is_empty() {
                break;
            }
        }

        self.window.zero_past(self.strstart + self.lookahead);
        debug_assert!(
            self.strstart <= self.window.len() - MIN_LOOKAHEAD || self.lookahead < MIN_LOOKAHEAD,
            "not enough room for search"
        );
    }

    fn slide(&mut self) {
        let w_size = self.window.w_size();
        self.window.slide();
        // A deferred lazy match may begin just below the slid half, so the
        // offset wraps. Distances are taken with `wrapping_sub`.
        self.match_start = self.match_start.wrapping_sub(w_size);
        self.strstart -= w_size;
        self.block_start -= w_size as isize;
        self.chains.slide(w_size);
        trace!(strstart = self.strstart, block_start = self.block_start, "Slid window");
    }

    /// Loads `dict` as history without producing output. Dictionaries at
    /// least one window long replace the history with their tail.
    pub(crate) fn prime_dictionary(&mut self, dict: &[u8]) {
        let w_size = self.window.w_size();
        let mut dict = dict;
        if dict.len() >= w_size {
            self.chains.clear();
            self.strstart = 0;
            self.block_start = 0;
            self.insert = 0;
            dict = &dict[dict.len() - w_size..];
        }

        let mut input = InputCursor::new(dict);
        self.fill_window(&mut input);
        while self.lookahead >= HASH_PREFIX {
            let count = self.lookahead - (HASH_PREFIX - 1);
            self.bulk_insert(self.strstart, count);
            self.strstart += count;
            self.lookahead = HASH_PREFIX - 1;
            self.fill_window(&mut input);
        }

        self.strstart += self.lookahead;
        self.block_start = self.strstart as isize;
        self.insert = self.lookahead;
        self.lookahead = 0;
        self.forget_match();
    }
}
