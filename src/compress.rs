use alloc::vec::Vec;

use crate::config::{DeflateConfig, Flush};
use crate::error::DeflateError;
use crate::stream::{Deflater, Status, tight_bound};

/// Extra room added if a stream ever outgrows its bound.
const GROW_STEP: usize = 1024;

/// Worst-case size of a zlib stream for `source_len` bytes at default
/// window and memory settings.
#[must_use]
pub const fn compress_bound(source_len: usize) -> usize {
    tight_bound(source_len) + 6
}

/// Compresses the entire input and appends the finished stream to `output`.
///
/// The output vector is sized from [`Deflater::bound`] up front, so a single
/// `deflate` call normally completes the stream.
///
/// # Parameters
/// * `input`: The source data to compress.
/// * `output`: The destination vector (appended to).
/// * `config`: Level, strategy, window, memory level and wrapper.
///
/// # Errors
/// Invalid configuration values or failed buffer allocation.
pub fn compress(input: &[u8], output: &mut Vec<u8>, config: DeflateConfig) -> Result<(), DeflateError> {
    let mut deflater = Deflater::new(config)?;
    let start = output.len();
    output.resize(start + deflater.bound(input.len()), 0);

    let mut consumed = 0;
    let mut written = 0;
    loop {
        if start + written == output.len() {
            output.resize(output.len() + GROW_STEP, 0);
        }
        let progress = deflater.deflate(&input[consumed..], &mut output[start + written..], Flush::Finish)?;
        consumed += progress.consumed;
        written += progress.written;
        if progress.status == Status::StreamEnd {
            break;
        }
    }

    output.truncate(start + written);
    Ok(())
}
