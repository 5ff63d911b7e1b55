//! Pointer-free cursors over the caller's buffers.

/// The unread tail of a caller's input slice.
#[derive(Debug)]
pub(crate) struct InputCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> InputCursor<'a> {
    pub(crate) const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) const fn avail(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.avail() == 0
    }

    /// Bytes consumed so far.
    pub(crate) const fn consumed(&self) -> usize {
        self.pos
    }

    /// The prefix consumed so far.
    pub(crate) fn consumed_data(&self) -> &'a [u8] {
        &self.data[..self.pos]
    }

    /// Copies as much as fits into `dst` and returns the count.
    pub(crate) fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let len = self.avail().min(dst.len());
        dst[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        len
    }
}

/// The unwritten tail of a caller's output slice.
#[derive(Debug)]
pub(crate) struct OutputCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> OutputCursor<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn avail(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_full(&self) -> bool {
        self.avail() == 0
    }

    pub(crate) const fn written(&self) -> usize {
        self.pos
    }

    /// Copies a prefix of `src` and returns how many bytes were taken.
    pub(crate) fn write(&mut self, src: &[u8]) -> usize {
        let len = self.avail().min(src.len());
        self.buf[self.pos..self.pos + len].copy_from_slice(&src[..len]);
        self.pos += len;
        len
    }
}

/// Both cursors of one `deflate` call.
#[derive(Debug)]
pub(crate) struct Io<'i, 'o> {
    pub input: InputCursor<'i>,
    pub output: OutputCursor<'o>,
}
