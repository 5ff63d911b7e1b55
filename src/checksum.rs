//! Running integrity codes for the zlib and gzip wrappers.

/// Initial Adler-32 value.
pub const ADLER32_INIT: u32 = 1;

/// Initial CRC-32 value.
pub const CRC32_INIT: u32 = 0;

const ADLER_MOD: u32 = 65521;

/// Largest n such that 255n(n+1)/2 + (n+1)(BASE-1) fits in 32 bits.
const ADLER_NMAX: usize = 5552;

/// Continues an Adler-32 checksum over `data`.
#[must_use]
pub fn adler32(adler: u32, data: &[u8]) -> u32 {
    let mut s1 = adler & 0xFFFF;
    let mut s2 = adler >> 16;

    for block in data.chunks(ADLER_NMAX) {
        for &byte in block {
            s1 += u32::from(byte);
            s2 += s1;
        }
        s1 %= ADLER_MOD;
        s2 %= ADLER_MOD;
    }

    (s2 << 16) | s1
}

/// Continues a CRC-32 (IEEE) checksum over `data`.
#[must_use]
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}

/// The checksum a wrapper carries in its trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checksum {
    None,
    Adler(u32),
    Crc(u32),
}

impl Checksum {
    pub(crate) fn update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        match self {
            Self::None => {}
            Self::Adler(value) => *value = adler32(*value, data),
            Self::Crc(value) => *value = crc32(*value, data),
        }
    }

    pub(crate) const fn value(self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Adler(value) | Self::Crc(value) => Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler32_known_value() {
        assert_eq!(adler32(ADLER32_INIT, b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(ADLER32_INIT, &[]), ADLER32_INIT);
    }

    #[test]
    fn adler32_is_chunking_independent() {
        let data: alloc::vec::Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let whole = adler32(ADLER32_INIT, &data);
        let (a, b) = data.split_at(7_001);
        assert_eq!(adler32(adler32(ADLER32_INIT, a), b), whole);
    }

    #[test]
    fn crc32_known_value_and_continuation() {
        assert_eq!(crc32(CRC32_INIT, b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(crc32(CRC32_INIT, b"1234"), b"56789"), 0xCBF4_3926);
    }

    #[test]
    fn running_checksum_dispatch() {
        let mut sum = Checksum::Adler(ADLER32_INIT);
        sum.update(b"Wikipedia");
        assert_eq!(sum.value(), Some(0x11E6_0398));

        let mut none = Checksum::None;
        none.update(b"ignored");
        assert_eq!(none.value(), None);
    }
}
