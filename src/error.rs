use thiserror::Error;

/// Errors reported by a [`Deflater`](crate::Deflater) session.
///
/// Running out of output space is not an error: `deflate` returns
/// [`Status::Ok`](crate::Status::Ok) and expects to be called again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeflateError {
    #[error("Compression level {0} is outside 0..=9")]
    InvalidLevel(u32),

    #[error("Window bits {0} is outside 8..=15")]
    InvalidWindowBits(u8),

    #[error("Memory level {0} is outside 1..=9")]
    InvalidMemLevel(u8),

    #[error("Unknown flush value {0}")]
    InvalidFlush(u8),

    #[error("Unknown strategy value {0}")]
    InvalidStrategy(u8),

    #[error("Cannot prime more than 16 bits at once (got {0})")]
    InvalidPrimeBits(u8),

    #[error("A preset dictionary is not allowed in the current state")]
    DictionaryNotAllowed,

    #[error("A gzip header can only be set on a gzip stream")]
    HeaderNotAllowed,

    #[error("Output buffer has no space")]
    NoOutputSpace,

    #[error("No input and no stronger flush than the previous call")]
    NoProgress,

    #[error("Input supplied after the stream was finished")]
    InputAfterFinish,

    #[error("Stream is finishing; only Flush::Finish is accepted")]
    StreamFinished,

    #[error("Output filled before the current block was closed ({written} bytes written)")]
    ParamsPending { written: usize },

    #[error("Failed to allocate compression buffers")]
    AllocationFailed,
}

/// Allocates a `len`-element vector filled with `value`, reporting failure
/// instead of aborting.
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T) -> Result<alloc::vec::Vec<T>, DeflateError> {
    let mut buf = alloc::vec::Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| DeflateError::AllocationFailed)?;
    buf.resize(len, value);
    Ok(buf)
}
