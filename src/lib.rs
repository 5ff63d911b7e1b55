//! # Streaming DEFLATE Compression
//!
//! `hashflate` is a safe, `no_std` implementation of a DEFLATE (RFC 1951)
//! compressor with hash-chain string matching, lazy evaluation and the raw,
//! zlib (RFC 1950) and gzip (RFC 1952) wrappers.
//!
//! The [`Deflater`] session is incremental: hand it input and output slices
//! in any sizes and call again until the requested flush completes.
//! [`compress`] wraps that loop for in-memory data.
//!
//! ## Example
//!
//! ```rust
//! use hashflate::{Compression, DeflateConfig, Deflater, Flush, Status};
//! use std::io::Read;
//!
//! let input = b"Hello world repeated Hello world repeated Hello world repeated";
//!
//! let config = DeflateConfig::new().level(Compression::best());
//! let mut deflater = Deflater::new(config).expect("valid config");
//! let mut output = vec![0u8; deflater.bound(input.len())];
//! let progress = deflater
//!     .deflate(input, &mut output, Flush::Finish)
//!     .expect("compression failed");
//! assert_eq!(progress.status, Status::StreamEnd);
//! output.truncate(progress.written);
//!
//! let mut decoded = Vec::new();
//! flate2::read::ZlibDecoder::new(&output[..])
//!     .read_to_end(&mut decoded)
//!     .unwrap();
//! assert_eq!(decoded, input);
//! ```

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod checksum;
pub mod compress;
pub mod config;
mod cursor;
mod engine;
pub mod error;
pub mod gzip;
mod hash_chain;
mod matcher;
mod strategy;
pub mod stream;
mod trees;
mod window;

pub use checksum::{adler32, crc32};
pub use compress::{compress, compress_bound};
pub use config::{Compression, DeflateConfig, Flush, Strategy, Wrapper};
pub use error::DeflateError;
pub use gzip::GzHeader;
pub use stream::{Deflater, Progress, Status};
