#![no_main]

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use hashflate::{Compression, DeflateConfig, Deflater, Flush, Status, Strategy, Wrapper};
use libfuzzer_sys::fuzz_target;

/// Session parameters and chunking taken from the first bytes of the input.
struct Plan {
    config: DeflateConfig,
    wrapper: Wrapper,
    in_chunk: usize,
    out_chunk: usize,
    flush: Flush,
}

impl Plan {
    /// Splits `data` into a plan and the payload to compress.
    fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        let (head, payload) = data.split_at_checked(6)?;
        let wrapper = match head[2] % 3 {
            0 => Wrapper::Raw,
            1 => Wrapper::Zlib,
            _ => Wrapper::Gzip,
        };
        let config = DeflateConfig::new()
            .level(Compression::new(u32::from(head[0] % 10)))
            .strategy(Strategy::try_from(head[1] % 5).ok()?)
            .wrapper(wrapper)
            .window_bits(9 + head[3] % 7)
            .mem_level(1 + head[3] / 7 % 9);
        let flush = match head[5] % 5 {
            0 | 1 => Flush::None,
            2 => Flush::Sync,
            3 => Flush::Partial,
            _ => Flush::Full,
        };
        let plan = Self {
            config,
            wrapper,
            in_chunk: 1 + usize::from(head[4]) * 37,
            out_chunk: 1 + usize::from(head[4] ^ head[5]),
            flush,
        };
        Some((plan, payload))
    }
}

/// Compresses `payload` in the plan's chunk sizes, flushing after every chunk.
///
/// # Panics
/// On any error from the session; every call here is valid by construction.
fn compress_streaming(plan: &Plan, payload: &[u8]) -> Vec<u8> {
    let mut d = Deflater::new(plan.config).expect("config is in range");
    let mut out = Vec::new();
    let mut buf = vec![0u8; plan.out_chunk];

    for piece in payload.chunks(plan.in_chunk) {
        let mut piece = piece;
        loop {
            let p = d.deflate(piece, &mut buf, plan.flush).expect("deflate failed");
            piece = &piece[p.consumed..];
            out.extend_from_slice(&buf[..p.written]);
            if piece.is_empty() && p.written < buf.len() {
                break;
            }
        }
    }
    loop {
        let p = d.deflate(&[], &mut buf, Flush::Finish).expect("finish failed");
        out.extend_from_slice(&buf[..p.written]);
        if p.status == Status::StreamEnd {
            break;
        }
    }
    out
}

/// Verifies the lossless round trip against an independent decoder.
///
/// # Invariant
/// `inflate(deflate(data)) == data` for every level, strategy, wrapper,
/// window, memory level, chunking and flush pattern.
fn verify_round_trip(plan: &Plan, payload: &[u8]) {
    let compressed = compress_streaming(plan, payload);

    let mut decompressed = Vec::new();
    let result = match plan.wrapper {
        Wrapper::Raw => DeflateDecoder::new(&compressed[..]).read_to_end(&mut decompressed),
        Wrapper::Zlib => ZlibDecoder::new(&compressed[..]).read_to_end(&mut decompressed),
        Wrapper::Gzip => GzDecoder::new(&compressed[..]).read_to_end(&mut decompressed),
    };
    if let Err(e) = result {
        panic!(
            "Round-trip failed! Decoder rejected the stream.\nError: {e}\nInput len: {}",
            payload.len()
        );
    }
    if decompressed != payload {
        panic!(
            "Round-trip mismatch!\nInput len: {}\nCompressed len: {}\nDecompressed len: {}",
            payload.len(),
            compressed.len(),
            decompressed.len()
        );
    }
}

fuzz_target!(|data: &[u8]| {
    if let Some((plan, payload)) = Plan::parse(data) {
        verify_round_trip(&plan, payload);
    }
});
