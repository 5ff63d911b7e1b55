use alloc::vec::Vec;

/// OS byte for "unknown".
const OS_UNKNOWN: u8 = 255;

pub(crate) const FTEXT: u8 = 0x01;
pub(crate) const FHCRC: u8 = 0x02;
pub(crate) const FEXTRA: u8 = 0x04;
pub(crate) const FNAME: u8 = 0x08;
pub(crate) const FCOMMENT: u8 = 0x10;

/// Optional gzip header fields, attached with
/// [`Deflater::set_header`](crate::Deflater::set_header).
///
/// Without one, a gzip stream gets a bare 10-byte header with no flags, zero
/// mtime and the Unix OS code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzHeader {
    pub(crate) text: bool,
    pub(crate) mtime: u32,
    pub(crate) os: u8,
    pub(crate) extra: Option<Vec<u8>>,
    /// Stored with its terminating NUL.
    pub(crate) name: Option<Vec<u8>>,
    /// Stored with its terminating NUL.
    pub(crate) comment: Option<Vec<u8>>,
    pub(crate) hcrc: bool,
}

impl Default for GzHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `value` up to its first NUL and appends the terminator.
fn zero_terminated(value: &[u8]) -> Vec<u8> {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    let mut field = Vec::with_capacity(end + 1);
    field.extend_from_slice(&value[..end]);
    field.push(0);
    field
}

impl GzHeader {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: false,
            mtime: 0,
            os: OS_UNKNOWN,
            extra: None,
            name: None,
            comment: None,
            hcrc: false,
        }
    }

    /// Marks the payload as probably text.
    #[must_use]
    pub const fn text(mut self, text: bool) -> Self {
        self.text = text;
        self
    }

    /// Modification time, seconds since the Unix epoch.
    #[must_use]
    pub const fn mtime(mut self, mtime: u32) -> Self {
        self.mtime = mtime;
        self
    }

    #[must_use]
    pub const fn os(mut self, os: u8) -> Self {
        self.os = os;
        self
    }

    /// Extra field payload. Anything past 65535 bytes is dropped.
    #[must_use]
    pub fn extra(mut self, extra: &[u8]) -> Self {
        let len = extra.len().min(usize::from(u16::MAX));
        self.extra = Some(extra[..len].to_vec());
        self
    }

    /// Original file name. Truncated at the first NUL.
    #[must_use]
    pub fn name(mut self, name: &[u8]) -> Self {
        self.name = Some(zero_terminated(name));
        self
    }

    /// File comment. Truncated at the first NUL.
    #[must_use]
    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = Some(zero_terminated(comment));
        self
    }

    /// Appends a CRC-16 of the header.
    #[must_use]
    pub const fn hcrc(mut self, hcrc: bool) -> Self {
        self.hcrc = hcrc;
        self
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.text {
            flags |= FTEXT;
        }
        if self.hcrc {
            flags |= FHCRC;
        }
        if self.extra.is_some() {
            flags |= FEXTRA;
        }
        if self.name.is_some() {
            flags |= FNAME;
        }
        if self.comment.is_some() {
            flags |= FCOMMENT;
        }
        flags
    }

    /// Header bytes beyond the fixed 10.
    pub(crate) fn optional_len(&self) -> usize {
        self.extra.as_ref().map_or(0, |extra| 2 + extra.len())
            + self.name.as_ref().map_or(0, Vec::len)
            + self.comment.as_ref().map_or(0, Vec::len)
            + if self.hcrc { 2 } else { 0 }
    }
}
