//! The compression session.
//!
//! A [`Deflater`] owns every buffer of one stream. Each [`Deflater::deflate`]
//! call consumes a prefix of the caller's input, writes a prefix of the
//! caller's output and returns at the first natural stopping point: input
//! drained, output full, or the requested flush completed.

use tracing::debug;

use crate::checksum::{ADLER32_INIT, CRC32_INIT, Checksum, adler32, crc32};
use crate::config::{Compression, DeflateConfig, Flush, LEVEL_TABLE, Strategy, Wrapper};
use crate::cursor::{InputCursor, Io, OutputCursor};
use crate::engine::{Engine, Tuning};
use crate::error::DeflateError;
use crate::gzip::GzHeader;
use crate::strategy::{self, BlockState, Producer};
use crate::trees::BlockWriter;

/// Compression method 8 (deflate) in both wrappers.
const DEFLATED: u8 = 8;

/// zlib FDICT bit.
const PRESET_DICT: u16 = 0x20;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// OS byte written when no gzip header was supplied.
const OS_UNIX: u8 = 3;

/// Outcome of a successful [`Deflater::deflate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Progress was made; call again to continue.
    Ok,
    /// The trailer has been fully written. Further `Flush::Finish` calls
    /// keep returning this.
    StreamEnd,
}

/// Bytes moved by one [`Deflater::deflate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub consumed: usize,
    pub written: usize,
    pub status: Status,
}

/// Session phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Wrapper header not yet written.
    Init,
    GzExtra,
    GzName,
    GzComment,
    GzHcrc,
    /// Compressing.
    Busy,
    /// Final block written; only the trailer remains.
    Finishing,
    /// Trailer queued. Done once pending output drains.
    Finished,
}

/// Copies `field[*index..]` into pending output in chunks bounded by the
/// pending capacity. Returns false if the output filled first; `*index`
/// then records where to resume.
fn put_chunked(
    coder: &mut BlockWriter,
    header_crc: &mut u32,
    field: &[u8],
    index: &mut usize,
    output: &mut OutputCursor<'_>,
) -> bool {
    while *index < field.len() {
        let room = coder.pending_cap().saturating_sub(coder.pending_len());
        if room == 0 {
            coder.flush_pending(output);
            if coder.has_pending() {
                return false;
            }
            continue;
        }
        let chunk = &field[*index..field.len().min(*index + room)];
        *header_crc = crc32(*header_crc, chunk);
        coder.put_bytes(chunk);
        *index += chunk.len();
    }
    *index = 0;
    true
}

/// A streaming DEFLATE compressor.
///
/// Cloning copies the whole session, including window, hash chains and
/// pending output, so the copy continues the same stream independently.
#[derive(Debug, Clone)]
pub struct Deflater {
    config: DeflateConfig,
    producer: Producer,
    engine: Engine,
    coder: BlockWriter,
    state: State,
    /// Flush of the previous call. Starts as `Flush::None`, so an empty first
    /// call without a flush is rejected; `None` after a call that ran out of
    /// output.
    last_flush: Option<Flush>,
    checksum: Checksum,
    gzip: Option<GzHeader>,
    /// Resume offset inside the gzip field being written.
    gz_index: usize,
    header_crc: u32,
    total_in: u64,
    total_out: u64,
}

impl Deflater {
    /// Validates `config` and allocates the session buffers.
    ///
    /// # Errors
    /// Out of range parameters, or [`DeflateError::AllocationFailed`].
    pub fn new(config: DeflateConfig) -> Result<Self, DeflateError> {
        let config = config.validated()?;
        let level = config.level.level();
        let params = &LEVEL_TABLE[level as usize];

        let mut deflater = Self {
            config,
            producer: Producer::select(level, config.strategy),
            engine: Engine::new(config.window_bits, config.mem_level, params)?,
            coder: BlockWriter::new(config.mem_level, level, config.strategy)?,
            state: State::Init,
            last_flush: Some(Flush::None),
            checksum: Checksum::None,
            gzip: None,
            gz_index: 0,
            header_crc: CRC32_INIT,
            total_in: 0,
            total_out: 0,
        };
        deflater.reset_counters();

        debug!(
            level,
            strategy = ?config.strategy,
            window_bits = config.window_bits,
            mem_level = config.mem_level,
            wrapper = ?config.wrapper,
            "Created deflate session"
        );
        Ok(deflater)
    }

    fn reset_counters(&mut self) {
        let (state, checksum) = match self.config.wrapper {
            Wrapper::Raw => (State::Busy, Checksum::None),
            Wrapper::Zlib => (State::Init, Checksum::Adler(ADLER32_INIT)),
            Wrapper::Gzip => (State::Init, Checksum::Crc(CRC32_INIT)),
        };
        self.state = state;
        self.checksum = checksum;
        self.last_flush = Some(Flush::None);
        self.gz_index = 0;
        self.header_crc = CRC32_INIT;
        self.total_in = 0;
        self.total_out = 0;
    }

    /// Starts a new stream with the current parameters. The gzip header, if
    /// any, is kept.
    pub fn reset(&mut self) {
        self.reset_counters();
        self.engine
            .reset(&LEVEL_TABLE[self.config.level.level() as usize]);
        self.coder.reset();
        debug!("Reset deflate session");
    }

    /// Compresses as much of `input` into `output` as possible.
    ///
    /// `Status::Ok` with a full output means "call again with more space".
    /// With [`Flush::Finish`], keep calling until `Status::StreamEnd`.
    ///
    /// # Errors
    /// - [`DeflateError::NoOutputSpace`] if `output` is empty.
    /// - [`DeflateError::StreamFinished`] for anything but `Flush::Finish`
    ///   once finishing has begun.
    /// - [`DeflateError::InputAfterFinish`] for new input after that point.
    /// - [`DeflateError::NoProgress`] for a call without input whose flush is
    ///   no stronger than the previous one.
    ///
    /// Errors are reported before any byte is consumed or written.
    pub fn deflate(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Progress, DeflateError> {
        if output.is_empty() {
            return Err(DeflateError::NoOutputSpace);
        }
        let finishing = matches!(self.state, State::Finishing | State::Finished);
        if finishing && flush != Flush::Finish {
            return Err(DeflateError::StreamFinished);
        }
        if finishing && !input.is_empty() {
            return Err(DeflateError::InputAfterFinish);
        }

        let mut io = Io {
            input: InputCursor::new(input),
            output: OutputCursor::new(output),
        };
        let status = self.step(&mut io, flush)?;
        let written = io.output.written();
        self.total_out += written as u64;
        Ok(Progress {
            consumed: io.input.consumed(),
            written,
            status,
        })
    }

    fn step(&mut self, io: &mut Io<'_, '_>, flush: Flush) -> Result<Status, DeflateError> {
        let old_flush = self.last_flush.replace(flush);

        if self.coder.has_pending() {
            self.coder.flush_pending(&mut io.output);
            if io.output.is_full() {
                self.last_flush = None;
                return Ok(Status::Ok);
            }
        } else if io.input.is_empty()
            && flush != Flush::Finish
            && old_flush.is_some_and(|old| flush.rank() <= old.rank())
        {
            return Err(DeflateError::NoProgress);
        }

        if matches!(
            self.state,
            State::Init | State::GzExtra | State::GzName | State::GzComment | State::GzHcrc
        ) && !self.write_header(&mut io.output)
        {
            self.last_flush = None;
            return Ok(Status::Ok);
        }

        if !io.input.is_empty()
            || self.engine.lookahead != 0
            || (flush != Flush::None && self.state == State::Busy)
        {
            let bstate = strategy::run(self.producer, &mut self.engine, &mut self.coder, io, flush);
            let consumed = io.input.consumed_data();
            self.checksum.update(consumed);
            self.total_in += consumed.len() as u64;

            match bstate {
                BlockState::NeedMore | BlockState::FinishStarted => {
                    if bstate == BlockState::FinishStarted {
                        self.state = State::Finishing;
                    }
                    if io.output.is_full() {
                        self.last_flush = None;
                    }
                    return Ok(Status::Ok);
                }
                BlockState::BlockDone => {
                    match flush {
                        Flush::Partial => self.coder.align(),
                        Flush::Sync | Flush::Full => {
                            self.coder.stored_block(&[], false);
                            if flush == Flush::Full {
                                self.engine.forget_history();
                                debug!(total_in = self.total_in, "Full flush, history cleared");
                            }
                        }
                        Flush::None | Flush::Block | Flush::Finish => {}
                    }
                    self.coder.flush_pending(&mut io.output);
                    if io.output.is_full() {
                        self.last_flush = None;
                        return Ok(Status::Ok);
                    }
                }
                BlockState::FinishDone => self.state = State::Finishing,
            }
        }

        if flush != Flush::Finish {
            if io.output.is_full() {
                self.last_flush = None;
            }
            return Ok(Status::Ok);
        }

        if self.state != State::Finished {
            self.write_trailer();
            self.state = State::Finished;
            debug!(total_in = self.total_in, "Finished stream");
        }
        self.coder.flush_pending(&mut io.output);
        Ok(if self.coder.has_pending() {
            Status::Ok
        } else {
            Status::StreamEnd
        })
    }

    /// Queues the wrapper header, resuming inside a gzip field if needed.
    /// Returns false while header bytes are still waiting for output space.
    fn write_header(&mut self, output: &mut OutputCursor<'_>) -> bool {
        if self.state == State::Init {
            self.state = match self.config.wrapper {
                Wrapper::Zlib => {
                    self.zlib_header();
                    State::Busy
                }
                Wrapper::Gzip => {
                    self.gzip_fixed_header();
                    if self.gzip.is_some() { State::GzExtra } else { State::Busy }
                }
                Wrapper::Raw => State::Busy,
            };
        }

        if let Some(header) = &self.gzip {
            if self.state == State::GzExtra {
                if let Some(extra) = &header.extra {
                    if !put_chunked(&mut self.coder, &mut self.header_crc, extra, &mut self.gz_index, output) {
                        return false;
                    }
                }
                self.state = State::GzName;
            }
            if self.state == State::GzName {
                if let Some(name) = &header.name {
                    if !put_chunked(&mut self.coder, &mut self.header_crc, name, &mut self.gz_index, output) {
                        return false;
                    }
                }
                self.state = State::GzComment;
            }
            if self.state == State::GzComment {
                if let Some(comment) = &header.comment {
                    if !put_chunked(&mut self.coder, &mut self.header_crc, comment, &mut self.gz_index, output)
                    {
                        return false;
                    }
                }
                self.state = State::GzHcrc;
            }
            if self.state == State::GzHcrc {
                if header.hcrc {
                    if self.coder.pending_len() + 2 > self.coder.pending_cap() {
                        self.coder.flush_pending(output);
                        if self.coder.has_pending() {
                            return false;
                        }
                    }
                    let crc16 = (self.header_crc & 0xffff) as u16;
                    self.coder.put_bytes(&crc16.to_le_bytes());
                }
                self.state = State::Busy;
            }
        }

        // Compression starts with an empty pending buffer.
        self.coder.flush_pending(output);
        !self.coder.has_pending()
    }

    /// True when the header should advertise the fastest settings.
    fn fastest(&self) -> bool {
        self.config.strategy >= Strategy::HuffmanOnly || self.config.level.level() < 2
    }

    fn zlib_header(&mut self) {
        let level = self.config.level.level();
        let level_flags: u16 = if self.fastest() {
            0
        } else if level < 6 {
            1
        } else if level == 6 {
            2
        } else {
            3
        };

        let mut header = (u16::from(DEFLATED) + (u16::from(self.config.window_bits - 8) << 4)) << 8;
        header |= level_flags << 6;
        let has_dictionary = self.engine.strstart != 0;
        if has_dictionary {
            header |= PRESET_DICT;
        }
        header += 31 - header % 31;
        self.coder.put_bytes(&header.to_be_bytes());

        if has_dictionary {
            if let Some(dict_adler) = self.checksum.value() {
                self.coder.put_bytes(&dict_adler.to_be_bytes());
            }
        }
        self.checksum = Checksum::Adler(ADLER32_INIT);
    }

    fn gzip_fixed_header(&mut self) {
        let xfl = if self.config.level.level() == 9 {
            2
        } else if self.fastest() {
            4
        } else {
            0
        };
        let (flags, mtime, os, extra_len) = match &self.gzip {
            None => (0, 0, OS_UNIX, None),
            Some(header) => (
                header.flags(),
                header.mtime,
                header.os,
                header.extra.as_ref().map(|extra| extra.len() as u16),
            ),
        };

        let mut bytes = [0u8; 10];
        bytes[..2].copy_from_slice(&GZIP_MAGIC);
        bytes[2] = DEFLATED;
        bytes[3] = flags;
        bytes[4..8].copy_from_slice(&mtime.to_le_bytes());
        bytes[8] = xfl;
        bytes[9] = os;
        self.header_crc = crc32(CRC32_INIT, &bytes);
        self.coder.put_bytes(&bytes);

        if let Some(len) = extra_len {
            let len = len.to_le_bytes();
            self.header_crc = crc32(self.header_crc, &len);
            self.coder.put_bytes(&len);
        }
        self.gz_index = 0;
    }

    fn write_trailer(&mut self) {
        match (self.config.wrapper, self.checksum) {
            (Wrapper::Zlib, Checksum::Adler(adler)) => self.coder.put_bytes(&adler.to_be_bytes()),
            (Wrapper::Gzip, Checksum::Crc(crc)) => {
                self.coder.put_bytes(&crc.to_le_bytes());
                // ISIZE is the input length modulo 2^32.
                self.coder.put_bytes(&(self.total_in as u32).to_le_bytes());
            }
            _ => {}
        }
    }

    /// Primes the history with `dictionary` without producing output.
    ///
    /// zlib streams accept a dictionary only before the first `deflate` call
    /// and announce it in the header. Raw streams accept one at any block
    /// boundary. Only the last window's worth of a long dictionary is used.
    ///
    /// # Errors
    /// [`DeflateError::DictionaryNotAllowed`] for gzip streams, after the
    /// zlib header was written, or while input is buffered.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<(), DeflateError> {
        let allowed = match self.config.wrapper {
            Wrapper::Gzip => false,
            Wrapper::Zlib => self.state == State::Init,
            Wrapper::Raw => self.state == State::Busy,
        };
        if !allowed
            || self.engine.lookahead != 0
            || self.coder.has_symbols()
            || self.coder.quick_block_open()
        {
            return Err(DeflateError::DictionaryNotAllowed);
        }

        if let Checksum::Adler(adler) = &mut self.checksum {
            *adler = adler32(*adler, dictionary);
        }
        self.engine.prime_dictionary(dictionary);
        debug!(len = dictionary.len(), "Primed dictionary");
        Ok(())
    }

    /// Attaches gzip header fields. Must be called before the first `deflate`.
    ///
    /// # Errors
    /// [`DeflateError::HeaderNotAllowed`] for non-gzip streams or once the
    /// header has been written.
    pub fn set_header(&mut self, header: GzHeader) -> Result<(), DeflateError> {
        if self.config.wrapper != Wrapper::Gzip || self.state != State::Init {
            return Err(DeflateError::HeaderNotAllowed);
        }
        self.gzip = Some(header);
        Ok(())
    }

    /// Changes level and strategy mid-stream and returns the bytes written
    /// to `output`.
    ///
    /// When the block producer changes after input was consumed, the current
    /// block is first closed with [`Flush::Block`].
    ///
    /// # Errors
    /// - [`DeflateError::InvalidLevel`] for levels above 9.
    /// - [`DeflateError::ParamsPending`] when `output` filled before the
    ///   block was closed. The parameters are unchanged; call again with
    ///   more space.
    /// - Any error of the `Flush::Block` call except `NoProgress`.
    pub fn set_params(
        &mut self,
        level: Compression,
        strategy: Strategy,
        output: &mut [u8],
    ) -> Result<usize, DeflateError> {
        let level_value = level.level();
        if level_value > 9 {
            return Err(DeflateError::InvalidLevel(level_value));
        }
        let producer = Producer::select(level_value, strategy);
        let switching = producer != self.producer || strategy != self.config.strategy;

        let mut written = 0;
        if switching && self.total_in != 0 {
            match self.deflate(&[], output, Flush::Block) {
                Ok(progress) => written = progress.written,
                Err(DeflateError::NoProgress) => {}
                Err(err) => return Err(err),
            }
            if self.engine.strstart as isize != self.engine.block_start || self.engine.lookahead != 0 {
                return Err(DeflateError::ParamsPending { written });
            }
        }

        if level_value != self.config.level.level() {
            self.engine.tuning = Tuning::from(&LEVEL_TABLE[level_value as usize]);
        }
        if switching {
            self.engine.forget_match();
        }
        self.config.level = level;
        self.config.strategy = strategy;
        self.producer = producer;
        self.coder.set_mode(level_value, strategy);

        debug!(level = level_value, strategy = ?strategy, written, "Changed parameters");
        Ok(written)
    }

    /// Overrides the match-search thresholds of the current level.
    pub fn tune(&mut self, good_length: usize, max_lazy: usize, nice_length: usize, max_chain: usize) {
        self.engine.tuning = Tuning {
            good_length,
            max_lazy,
            nice_length,
            max_chain,
        };
        debug!(good_length, max_lazy, nice_length, max_chain, "Tuned match search");
    }

    /// Upper bound on the compressed size of `source_len` bytes sent through
    /// this session in a single `Flush::Finish` call.
    #[must_use]
    pub fn bound(&self, source_len: usize) -> usize {
        let wraplen = match self.config.wrapper {
            Wrapper::Raw => 0,
            Wrapper::Zlib => 6 + if self.engine.strstart != 0 { 4 } else { 0 },
            Wrapper::Gzip => 18 + self.gzip.as_ref().map_or(0, GzHeader::optional_len),
        };

        // Fixed codes can expand bytes to 9 bits; small windows and symbol
        // buffers end blocks more often.
        if !self.config.has_default_sizes() || self.producer == Producer::Quick {
            let n = source_len;
            return n + ((n + 7) >> 3) + ((n + 63) >> 6) + 5 + wraplen;
        }
        tight_bound(source_len) + wraplen
    }

    /// Bytes and bits produced but not yet handed out.
    #[must_use]
    pub fn pending(&self) -> (usize, u32) {
        (self.coder.pending_len(), self.coder.pending_bits())
    }

    /// Inserts the low `bits` bits of `value` into the output stream.
    ///
    /// # Errors
    /// [`DeflateError::InvalidPrimeBits`] for more than 16 bits.
    pub fn prime(&mut self, bits: u8, value: u16) -> Result<(), DeflateError> {
        self.coder.prime(bits, value)
    }

    /// Running Adler-32 (zlib) or CRC-32 (gzip) of the input so far.
    /// `None` for raw streams.
    #[must_use]
    pub const fn checksum(&self) -> Option<u32> {
        self.checksum.value()
    }

    #[must_use]
    pub const fn total_in(&self) -> u64 {
        self.total_in
    }

    #[must_use]
    pub const fn total_out(&self) -> u64 {
        self.total_out
    }
}

/// Bound for the default window and memory level, without wrapper bytes.
pub(crate) const fn tight_bound(n: usize) -> usize {
    n + (n >> 12) + (n >> 14) + (n >> 25) + 7
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Runs `input` through a fresh session with `Flush::Finish`.
    fn finish(config: DeflateConfig, input: &[u8]) -> Vec<u8> {
        let mut d = Deflater::new(config).unwrap();
        let mut out = alloc::vec![0u8; d.bound(input.len())];
        let progress = d.deflate(input, &mut out, Flush::Finish).unwrap();
        assert_eq!(progress.status, Status::StreamEnd);
        out.truncate(progress.written);
        out
    }

    #[test]
    fn empty_zlib_stream() {
        let out = finish(DeflateConfig::new(), b"");
        assert_eq!(out, [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn empty_gzip_stream() {
        let out = finish(DeflateConfig::new().wrapper(Wrapper::Gzip), b"");
        assert_eq!(
            out,
            [
                0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, OS_UNIX, 0x03, 0x00, 0, 0, 0, 0, 0, 0, 0, 0
            ]
        );
    }

    #[test]
    fn zlib_level_hints() {
        let header = |level| finish(DeflateConfig::new().level(Compression::new(level)), b"")[..2].to_vec();
        assert_eq!(header(1), [0x78, 0x01]);
        assert_eq!(header(5), [0x78, 0x5E]);
        assert_eq!(header(9), [0x78, 0xDA]);
    }

    #[test]
    fn gzip_extra_flags_byte() {
        let xfl = |level| {
            finish(
                DeflateConfig::new().wrapper(Wrapper::Gzip).level(Compression::new(level)),
                b"",
            )[8]
        };
        assert_eq!(xfl(9), 2);
        assert_eq!(xfl(1), 4);
        assert_eq!(xfl(6), 0);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        let mut out = [0u8; 64];
        let first = d.deflate(b"abc", &mut out, Flush::Finish).unwrap();
        assert_eq!(first.status, Status::StreamEnd);
        let again = d.deflate(b"", &mut out, Flush::Finish).unwrap();
        assert_eq!(again.status, Status::StreamEnd);
        assert_eq!(again.written, 0);
        assert_eq!(d.deflate(b"", &mut out, Flush::None), Err(DeflateError::StreamFinished));
        assert_eq!(d.deflate(b"x", &mut out, Flush::Finish), Err(DeflateError::InputAfterFinish));
    }

    #[test]
    fn repeated_weak_flush_is_rejected() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        let mut out = [0u8; 256];
        d.deflate(b"data", &mut out, Flush::Sync).unwrap();
        assert_eq!(d.deflate(b"", &mut out, Flush::Sync), Err(DeflateError::NoProgress));
        assert_eq!(d.deflate(b"", &mut out, Flush::None), Err(DeflateError::NoProgress));
        assert!(d.deflate(b"", &mut out, Flush::Full).is_ok());
    }

    #[test]
    fn empty_first_call_is_rejected() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        let mut out = [0u8; 64];
        assert_eq!(d.deflate(b"", &mut out, Flush::None), Err(DeflateError::NoProgress));
        assert_eq!(d.total_out(), 0);
        // Any real flush still goes through, header first.
        let progress = d.deflate(b"", &mut out, Flush::Sync).unwrap();
        assert_eq!(&out[..2], &[0x78, 0x9C]);
        assert!(progress.written > 2);

        d.reset();
        assert_eq!(d.deflate(b"", &mut out, Flush::None), Err(DeflateError::NoProgress));
    }

    #[test]
    fn empty_output_is_rejected() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        assert_eq!(d.deflate(b"abc", &mut [], Flush::None), Err(DeflateError::NoOutputSpace));
    }

    #[test]
    fn dictionary_rules_follow_wrapper() {
        let mut gz = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Gzip)).unwrap();
        assert_eq!(gz.set_dictionary(b"dict"), Err(DeflateError::DictionaryNotAllowed));

        let mut zlib = Deflater::new(DeflateConfig::new()).unwrap();
        zlib.set_dictionary(b"dictionary").unwrap();
        let mut out = [0u8; 64];
        zlib.deflate(b"x", &mut out, Flush::None).unwrap();
        assert_eq!(zlib.set_dictionary(b"late"), Err(DeflateError::DictionaryNotAllowed));

        let mut raw = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Raw)).unwrap();
        raw.deflate(b"block", &mut out, Flush::Sync).unwrap();
        assert!(raw.set_dictionary(b"more history").is_ok());
    }

    #[test]
    fn dictionary_sets_zlib_flag_and_id() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        d.set_dictionary(b"hello").unwrap();
        let mut out = [0u8; 64];
        let progress = d.deflate(b"hello", &mut out, Flush::Finish).unwrap();
        assert!(progress.written > 6);
        let header = u16::from_be_bytes([out[0], out[1]]);
        assert_eq!(header % 31, 0);
        assert_ne!(header & PRESET_DICT, 0);
        assert_eq!(&out[2..6], &adler32(ADLER32_INIT, b"hello").to_be_bytes());
    }

    #[test]
    fn header_only_for_gzip_before_start() {
        let mut zlib = Deflater::new(DeflateConfig::new()).unwrap();
        assert_eq!(zlib.set_header(GzHeader::new()), Err(DeflateError::HeaderNotAllowed));

        let mut gz = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Gzip)).unwrap();
        gz.set_header(GzHeader::new().name(b"a.txt")).unwrap();
        let mut out = [0u8; 64];
        gz.deflate(b"", &mut out, Flush::Finish).unwrap();
        assert_eq!(gz.set_header(GzHeader::new()), Err(DeflateError::HeaderNotAllowed));
        assert_eq!(out[3], crate::gzip::FNAME);
        assert_eq!(&out[10..16], b"a.txt\0");
    }

    #[test]
    fn gzip_header_survives_one_byte_outputs() {
        let header = GzHeader::new()
            .extra(&[9u8; 1000])
            .name(b"name")
            .comment(b"comment")
            .hcrc(true);
        let config = DeflateConfig::new().wrapper(Wrapper::Gzip).mem_level(1);

        let mut whole = Deflater::new(config).unwrap();
        whole.set_header(header.clone()).unwrap();
        let mut expected = alloc::vec![0u8; 4096];
        let progress = whole.deflate(b"payload", &mut expected, Flush::Finish).unwrap();
        expected.truncate(progress.written);

        let mut d = Deflater::new(config).unwrap();
        d.set_header(header).unwrap();
        let mut got = Vec::new();
        let mut input: &[u8] = b"payload";
        loop {
            let mut byte = [0u8; 1];
            let progress = d.deflate(input, &mut byte, Flush::Finish).unwrap();
            input = &input[progress.consumed..];
            got.extend_from_slice(&byte[..progress.written]);
            if progress.status == Status::StreamEnd {
                break;
            }
        }
        assert_eq!(got, expected);
        assert_eq!(d.total_out(), expected.len() as u64);
    }

    #[test]
    fn params_switch_closes_the_block() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        let mut out = [0u8; 512];
        d.deflate(b"some input to buffer", &mut out, Flush::None).unwrap();
        let written = d.set_params(Compression::new(1), Strategy::Default, &mut out).unwrap();
        assert!(written > 0);
        assert_eq!(d.engine.block_start, d.engine.strstart as isize);
        assert_eq!(d.producer, Producer::Fast);
        assert_eq!(
            d.set_params(Compression::new(10), Strategy::Default, &mut out),
            Err(DeflateError::InvalidLevel(10))
        );
    }

    #[test]
    fn bound_picks_formula() {
        let d = Deflater::new(DeflateConfig::new()).unwrap();
        assert_eq!(d.bound(0), 13);
        assert_eq!(d.bound(1 << 16), (1 << 16) + 16 + 4 + 7 + 6);

        let small = Deflater::new(DeflateConfig::new().window_bits(9).wrapper(Wrapper::Raw)).unwrap();
        assert_eq!(small.bound(64), 64 + 8 + 1 + 5);

        let gz = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Gzip)).unwrap();
        assert_eq!(gz.bound(0), 7 + 18);
    }

    #[test]
    fn checksum_tracks_consumed_input() {
        let mut raw = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Raw)).unwrap();
        assert_eq!(raw.checksum(), None);

        let mut gz = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Gzip)).unwrap();
        let mut out = [0u8; 128];
        gz.deflate(b"123456789", &mut out, Flush::None).unwrap();
        assert_eq!(gz.checksum(), Some(0xCBF4_3926));
        assert_eq!(gz.total_in(), 9);

        let mut out = [0u8; 16];
        raw.deflate(b"x", &mut out, Flush::None).unwrap();
        assert_eq!(raw.checksum(), None);
    }

    #[test]
    fn reset_starts_an_identical_stream() {
        let mut d = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Gzip)).unwrap();
        d.set_header(GzHeader::new().name(b"x")).unwrap();
        let mut first = [0u8; 128];
        let a = d.deflate(b"repeat me", &mut first, Flush::Finish).unwrap();
        d.reset();
        assert_eq!(d.total_in(), 0);
        let mut second = [0u8; 128];
        let b = d.deflate(b"repeat me", &mut second, Flush::Finish).unwrap();
        assert_eq!(first[..a.written], second[..b.written]);
    }

    #[test]
    fn clone_forks_the_stream() {
        let mut d = Deflater::new(DeflateConfig::new()).unwrap();
        let mut out = [0u8; 256];
        let head = d.deflate(b"shared prefix ", &mut out, Flush::None).unwrap().written;
        let mut fork = d.clone();

        let mut a = [0u8; 256];
        let mut b = [0u8; 256];
        let pa = d.deflate(b"tail", &mut a, Flush::Finish).unwrap();
        let pb = fork.deflate(b"tail", &mut b, Flush::Finish).unwrap();
        assert_eq!(head, 2);
        assert_eq!(a[..pa.written], b[..pb.written]);
    }

    #[test]
    fn pending_and_prime() {
        let mut d = Deflater::new(DeflateConfig::new().wrapper(Wrapper::Raw)).unwrap();
        assert_eq!(d.pending(), (0, 0));
        d.prime(5, 0b1_0101).unwrap();
        assert_eq!(d.pending(), (0, 5));
        assert_eq!(d.prime(20, 0), Err(DeflateError::InvalidPrimeBits(20)));
    }
}
